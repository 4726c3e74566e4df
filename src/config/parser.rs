//! Configuration assembly: defaults, then file, then environment, then CLI

use crate::{
    cli::Cli,
    config::{env::EnvManager, file::FileConfig},
    error::Result,
    models::Config,
};

/// Configuration parser that layers every configuration source
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete, validated configuration
    pub fn parse(&self) -> Result<Config> {
        let file = FileConfig::discover(self.cli.config.as_deref())?;
        EnvManager::load_env_file(self.cli.debug)?;

        self.build(file.as_ref(), |key| std::env::var(key).ok())
    }

    /// Layer the sources over the defaults and validate.
    ///
    /// `lookup` serves environment variables.
    pub fn build<F>(&self, file: Option<&FileConfig>, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(file) = file {
            file.apply(&mut config);
        }
        EnvManager::apply_vars(&mut config, lookup)?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        if config.debug {
            eprintln!("Final configuration:\n{}", display_config_summary(&config));
        }

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(host) = &cli.host {
            config.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(unit_id) = cli.unit_id {
            config.unit_id = unit_id;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(start_address) = cli.start_address {
            config.start_address = start_address;
        }
        if let Some(register_type) = cli.register_type {
            config.register_type = register_type;
        }
        if let Some(rates) = &cli.rates {
            config.rates_hz = rates.clone();
        }
        if let Some(sizes) = &cli.sizes {
            config.register_counts = sizes.clone();
        }
        if let Some(duration) = cli.duration {
            config.duration_minutes = duration;
        }
        if cli.quick {
            config.duration_minutes = crate::defaults::DEFAULT_QUICK_DURATION_MINUTES;
        }
        if let Some(threshold) = cli.dropout_threshold {
            config.dropout_threshold = threshold;
        }
        if let Some(policy) = cli.on_connection_loss {
            config.on_connection_loss = policy;
        }
        if let Some(dir) = &cli.output_dir {
            config.output_directory = dir.clone();
        }
        if cli.no_summary {
            config.save_summary_stats = false;
        }
        if cli.no_detailed {
            config.save_detailed_logs = false;
        }
        if let Some(log_file) = &cli.log_file {
            config.log_file = Some(log_file.clone());
        }
        if cli.no_color {
            config.enable_color = false;
        }

        // CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Endpoint: {} (unit {})", config.endpoint(), config.unit_id));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    summary.push(format!(
        "Registers: {} from {}",
        config.register_type.display_name(),
        config.start_address
    ));
    summary.push(format!("Rates (Hz): {:?}", config.rates_hz));
    summary.push(format!("Register counts: {:?}", config.register_counts));
    summary.push(format!("Duration: {} min per run", config.duration_minutes));
    summary.push(format!("Dropout threshold: {}", config.dropout_threshold));
    summary.push(format!("On connection loss: {}", config.on_connection_loss));
    summary.push(format!("Output directory: {}", config.output_directory.display()));
    summary.push(format!(
        "Save summary/detailed: {}/{}",
        config.save_summary_stats, config.save_detailed_logs
    ));
    if let Some(log_file) = &config.log_file {
        summary.push(format!("Log file: {}", log_file.display()));
    }
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
