//! CLI command implementations

pub mod check;
pub mod clean;
pub mod completions;
pub mod config;
pub mod image;
pub mod list;
pub mod release;
pub mod run;
pub mod tools;

pub use check::execute as check;
pub use clean::execute as clean;
pub use completions::execute as completions;
pub use config::execute as config;
pub use image::execute as image;
pub use list::execute as list;
pub use release::execute as release;
pub use run::execute as run;
pub use tools::execute as tools;
