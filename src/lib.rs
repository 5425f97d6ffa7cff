//! Rigger - declarative build, test and release orchestration
//!
//! Named tasks with dependencies, pinned tools provisioned on demand,
//! coverage runs against a local control plane, multi-arch image builds
//! with a registry cache, and a tag-gated release flow.

pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod exec;
pub mod image;
pub mod pipeline;
pub mod release;
pub mod tasks;
pub mod tools;
pub mod ui;

pub use error::{RiggerError, RiggerResult};
