//! Run configuration summary types for logging and verbose output.
//!
//! Used by the `cli` binary (or any other host) to aggregate LLM and tool config
//! into a single summary that can be printed, e.g. to stderr when `--verbose`.

pub mod summary;

pub use summary::{
    build_config_summary, ConfigSection, LlmConfigSummary, RunConfigSummary,
    RunConfigSummarySource, ToolConfigSummary,
};
