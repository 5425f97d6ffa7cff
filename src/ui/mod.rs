//! Terminal output
//!
//! Uses `cliclack` for prompts and spinners when attached to a terminal, and
//! plain prefixed lines (`[OK]`, `[FAIL]`, ...) in CI and pipes so logs stay
//! greppable.
//!
//! ```rust,ignore
//! use rigger::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "Tools");
//! ui::step_ok_detail(&ctx, "controller-gen", "installed");
//! ui::outro_success(&ctx, "All tools present");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, section, step_error,
    step_info, step_ok, step_ok_detail, step_warn, step_warn_hint, task_finished, task_started,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, RiggerTheme};
