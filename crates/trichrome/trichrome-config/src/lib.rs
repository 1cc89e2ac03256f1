mod config;

pub use config::{ConfigError, TrichromeConfig};
