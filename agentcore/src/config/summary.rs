//! Config section trait and run config summary aggregate.
//!
//! [`ConfigSection`] is implemented by [`LlmConfigSummary`] and [`ToolConfigSummary`];
//! [`RunConfigSummary`] holds sections in order and prints them to stderr, e.g. when
//! the `cli` binary runs with `--verbose`.

use std::io::Write;

/// One block of run config (LLM, tools) for display and printing.
pub trait ConfigSection: Send + Sync {
    /// Section label, e.g. `"LLM config"`, `"Tools"`.
    fn section_name(&self) -> &str;
    /// Key-value pairs (no secrets). Keys are `&'static str` for use in display and tests.
    fn entries(&self) -> Vec<(&'static str, String)>;
    /// Prints one line to stderr in the form `[section_name] k1=v1 k2=v2 ...`. Best-effort.
    fn print_to_stderr(&self) {
        let entries: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let _ = writeln!(
            std::io::stderr(),
            "[{}] {}",
            self.section_name(),
            entries.join(" ")
        );
        let _ = std::io::stderr().flush();
    }
}

/// LLM configuration summary: provider, model, context limit, temperature.
///
/// Built from [`crate::provider::LlmConfig`]. Implements [`ConfigSection`].
pub struct LlmConfigSummary {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub context_limit: u32,
    pub temperature: Option<f32>,
}

impl ConfigSection for LlmConfigSummary {
    fn section_name(&self) -> &str {
        "LLM config"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        let temperature = self
            .temperature
            .map(|t| t.to_string())
            .unwrap_or_else(|| "(default)".to_string());
        vec![
            ("provider", self.provider.clone()),
            ("model", self.model.clone()),
            (
                "base_url",
                self.base_url.clone().unwrap_or_else(|| "(default)".to_string()),
            ),
            ("context_limit", self.context_limit.to_string()),
            ("temperature", temperature),
        ]
    }
}

/// Tool sources summary: builtin tool count and any connected MCP server ids.
pub struct ToolConfigSummary {
    pub builtin_tool_count: usize,
    pub mcp_server_ids: Vec<String>,
}

impl ConfigSection for ToolConfigSummary {
    fn section_name(&self) -> &str {
        "Tools"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("builtin_tools", self.builtin_tool_count.to_string()),
            ("mcp_servers", self.mcp_server_ids.join(",")),
        ]
    }
}

/// Aggregated run config summary (LLM, tools sections).
#[derive(Default)]
pub struct RunConfigSummary {
    sections: Vec<Box<dyn ConfigSection>>,
}

impl RunConfigSummary {
    pub fn new() -> Self {
        Self { sections: vec![] }
    }

    pub fn with_section(mut self, s: Box<dyn ConfigSection>) -> Self {
        self.sections.push(s);
        self
    }

    pub fn sections(&self) -> &[Box<dyn ConfigSection>] {
        self.sections.as_slice()
    }

    /// Prints each section to stderr, one line per section. Best-effort.
    pub fn print_to_stderr(&self) {
        for s in &self.sections {
            s.print_to_stderr();
        }
    }
}

/// Source of the config sections used to build a [`RunConfigSummary`].
///
/// Implement this for a host's run-config type so [`build_config_summary`] can
/// produce a summary, e.g. for `--verbose` logging in the `cli` binary.
pub trait RunConfigSummarySource: Send + Sync {
    fn llm_section(&self) -> LlmConfigSummary;
    fn tools_section(&self) -> ToolConfigSummary;
}

/// Builds a run config summary from any source that implements [`RunConfigSummarySource`].
pub fn build_config_summary(source: &impl RunConfigSummarySource) -> RunConfigSummary {
    RunConfigSummary::new()
        .with_section(Box::new(source.llm_section()))
        .with_section(Box::new(source.tools_section()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub;
    impl RunConfigSummarySource for Stub {
        fn llm_section(&self) -> LlmConfigSummary {
            LlmConfigSummary {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                base_url: None,
                context_limit: 128_000,
                temperature: Some(0.2),
            }
        }

        fn tools_section(&self) -> ToolConfigSummary {
            ToolConfigSummary {
                builtin_tool_count: 20,
                mcp_server_ids: vec!["exa".to_string()],
            }
        }
    }

    #[test]
    fn build_config_summary_includes_both_sections() {
        let summary = build_config_summary(&Stub);
        assert_eq!(summary.sections().len(), 2);
        assert_eq!(summary.sections()[0].section_name(), "LLM config");
        assert_eq!(summary.sections()[1].section_name(), "Tools");
    }

    #[test]
    fn llm_section_entries_report_default_temperature_as_literal() {
        let section = LlmConfigSummary {
            provider: "anthropic".to_string(),
            model: "claude".to_string(),
            base_url: None,
            context_limit: 200_000,
            temperature: None,
        };
        let entries = section.entries();
        assert!(entries.contains(&("temperature", "(default)".to_string())));
    }
}
