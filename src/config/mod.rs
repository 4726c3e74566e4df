//! Configuration management module

pub mod env;
pub mod file;
pub mod parser;
pub mod validation;

// Re-export main functionality
pub use env::EnvManager;
pub use file::{FileConfig, DEFAULT_CONFIG_FILE};
pub use parser::{display_config_summary, load_config, ConfigParser};
pub use validation::{validate_config, ConfigValidator, ValidationLevel, ValidationWarning};

// Re-export from models for convenience
pub use crate::models::Config;
