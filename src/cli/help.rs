//! Topic help: configuration, environment, examples and result interpretation

use crate::config::{env::EnvManager, file::DEFAULT_CONFIG_FILE};
use colored::*;

/// Topics accepted by `--help-topic`
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("config", "Configuration file layout and parameter limits"),
    ("env", "Environment variables and .env files"),
    ("examples", "Common invocations"),
    ("results", "How to read the summary table and report files"),
];

/// Help text generator for `--help-topic`
pub struct HelpSystem;

struct ExampleHelp {
    title: &'static str,
    command: &'static str,
    description: &'static str,
}

impl ExampleHelp {
    fn format(&self, use_colors: bool) -> String {
        if use_colors {
            format!(
                "  {}\n    {}\n    {}\n",
                self.title.bright_cyan().bold(),
                self.command.bright_white(),
                self.description.dimmed()
            )
        } else {
            format!("  {}\n    {}\n    {}\n", self.title, self.command, self.description)
        }
    }
}

impl HelpSystem {
    pub fn new() -> Self {
        Self
    }

    /// Help for `topic`, or `None` when the topic is unknown
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.to_lowercase().as_str() {
            "config" | "configuration" => Some(self.format_configuration_help(use_colors)),
            "env" | "environment" => Some(self.format_environment_help(use_colors)),
            "examples" => Some(self.format_examples(use_colors)),
            "results" | "output" | "dropouts" => Some(self.format_results_help(use_colors)),
            _ => None,
        }
    }

    /// List of topics, shown for unknown ones
    pub fn display_topic_list(&self, use_colors: bool) -> String {
        let mut output = self.section_header("HELP TOPICS:", use_colors);
        for (topic, description) in HELP_TOPICS {
            let topic = if use_colors {
                topic.bright_yellow().to_string()
            } else {
                topic.to_string()
            };
            output.push_str(&format!("  {:<10} {}\n", topic, description));
        }
        output
    }

    fn section_header(&self, title: &str, use_colors: bool) -> String {
        if use_colors {
            format!("{}\n", title.bright_green().bold())
        } else {
            format!("{}\n", title)
        }
    }

    fn format_configuration_help(&self, use_colors: bool) -> String {
        let mut help = self.section_header("CONFIGURATION REFERENCE:", use_colors);
        help.push('\n');

        help.push_str("CONFIGURATION PRIORITY (highest to lowest):\n");
        help.push_str("1. Command-line arguments\n");
        help.push_str("2. Environment variables (including .env)\n");
        help.push_str(&format!("3. Configuration file (--config, or ./{} when present)\n", DEFAULT_CONFIG_FILE));
        help.push_str("4. Default values\n\n");

        help.push_str("FILE LAYOUT:\n");
        help.push_str(
            "  modbus:\n    host: 192.168.1.100\n    port: 502\n    unit_id: 1\n    timeout: 3.0\n\
             \x20 registers:\n    start_address: 30001\n    type: input\n\
             \x20 test:\n    frequencies: [1, 5, 10]\n    register_counts: [1, 10]\n    duration_minutes: 1.0\n\
             \x20   dropout_threshold: 2\n    on_connection_loss: abort\n\
             \x20 output:\n    output_directory: results\n    save_summary_stats: true\n    save_detailed_logs: true\n\n",
        );

        help.push_str("PARAMETER LIMITS:\n");
        help.push_str("- Rates: greater than 0, at most 1000 Hz\n");
        help.push_str("- Register counts: 1-125 per read\n");
        help.push_str("- Timeout: greater than 0, at most 300 seconds\n");
        help.push_str("- Start address: 3xxxx (input) and 4xxxx (holding) numbering is translated,\n");
        help.push_str("  lower values are sent unchanged\n");
        help.push_str("- Dropout threshold: at least 1 consecutive failure\n");

        help
    }

    fn format_environment_help(&self, use_colors: bool) -> String {
        let mut help = self.section_header("ENVIRONMENT VARIABLES:", use_colors);
        help.push('\n');

        for (name, description, example) in EnvManager::get_supported_env_vars() {
            if use_colors {
                help.push_str(&format!("  {:<24} {}\n", name.bright_yellow().bold(), description));
            } else {
                help.push_str(&format!("  {:<24} {}\n", name, description));
            }
            help.push_str(&format!("  {:<24} Example: {}\n", "", example));
        }

        help.push_str("\nVariables in ./.env are loaded unless already set in the environment.\n");
        help
    }

    fn format_examples(&self, use_colors: bool) -> String {
        let examples = [
            ExampleHelp {
                title: "Connection check",
                command: "mlt --host 192.168.1.100 --check",
                description: "Connect, read 1/5/10/20 registers and print the first values",
            },
            ExampleHelp {
                title: "Quick test",
                command: "mlt --host 192.168.1.100 --quick",
                description: "Run the configured matrix with 15-second runs",
            },
            ExampleHelp {
                title: "Custom matrix",
                command: "mlt --rates 1,10,50 --sizes 1,50,125 --duration 5",
                description: "Nine 5-minute runs, every rate with every size",
            },
            ExampleHelp {
                title: "Holding registers",
                command: "mlt --register-type holding --start-address 40001",
                description: "Read holding registers from protocol address 0",
            },
            ExampleHelp {
                title: "Keep going after disconnects",
                command: "mlt --on-connection-loss skip --log-file mlt.log",
                description: "Reconnect between runs and keep a structured log",
            },
        ];

        let mut help = self.section_header("EXAMPLES:", use_colors);
        for example in &examples {
            help.push_str(&example.format(use_colors));
            help.push('\n');
        }
        help
    }

    fn format_results_help(&self, use_colors: bool) -> String {
        let mut help = self.section_header("READING RESULTS:", use_colors);
        help.push('\n');

        help.push_str("Success %       share of probes that returned data\n");
        help.push_str("Avg/Med/Max Lat latency of successful probes only\n");
        help.push_str("Dropouts        failure bursts that reached the dropout threshold\n");
        help.push_str("                (default 2 consecutive failures), counted once per burst\n");
        help.push_str("Max Fails       longest run of back-to-back failures\n\n");

        help.push_str("Probes never overlap. When a probe takes longer than the interval the\n");
        help.push_str("next one starts one interval later instead of bursting to catch up, so\n");
        help.push_str("a slow server lowers the achieved rate.\n\n");

        help.push_str("REPORT FILES (in the output directory):\n");
        help.push_str("  test_stats_<timestamp>.csv / .json   one row per run\n");
        help.push_str("  detailed_results_<timestamp>.csv     one row per probe\n");

        help
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}
