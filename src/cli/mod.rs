//! CLI-specific functionality for the quiz flow
//!
//! This module contains all CLI-related code including argument parsing,
//! terminal rendering, and configuration discovery.

pub mod args;
pub mod config;
pub mod display;

pub use args::{Args, Commands, ExecutionMode, FlowAction, RunOptions};
pub use config::ConfigDiscovery;
