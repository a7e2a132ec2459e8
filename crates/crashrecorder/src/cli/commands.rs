//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::Config;

/// Run command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Override the snapshot file path
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Override the number of retained samples
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Override the sampling period in milliseconds
    #[arg(long)]
    pub period_ms: Option<u64>,
}

impl RunCommand {
    /// Apply the command-line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.output.path.clone_from(output);
        }
        if let Some(capacity) = self.capacity {
            config.sampler.capacity = capacity;
        }
        if let Some(period_ms) = self.period_ms {
            config.sampler.period_ms = period_ms;
        }
    }
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file (uses default if not specified)
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_apply_overrides() {
        let run = RunCommand {
            output: Some(PathBuf::from("/data/dump.csv")),
            capacity: Some(10),
            period_ms: None,
        };
        let mut config = Config::default();
        run.apply(&mut config);

        assert_eq!(config.output.path, PathBuf::from("/data/dump.csv"));
        assert_eq!(config.sampler.capacity, 10);
        assert_eq!(config.sampler.period_ms, 100);
    }

    #[test]
    fn test_run_apply_nothing() {
        let run = RunCommand {
            output: None,
            capacity: None,
            period_ms: None,
        };
        let mut config = Config::default();
        run.apply(&mut config);
        assert_eq!(config, Config::default());
    }
}
