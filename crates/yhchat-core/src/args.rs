use crate::config::Config;
use crate::logging::{LogConfig, LogFormat};
use clap::Args;
use std::path::PathBuf;

// Global flags shared across every subcommand.
//
//   -c / --config      Path to a config.toml file
//   --settings-dir     Root state directory override
//   --user-id/--token  Credentials for the realtime login frame
//   --ws-url           Realtime endpoint override
//   -v / --log-format  Logging overrides
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to a config.toml file
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "YHCHAT_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Settings directory (default: ~/.yhchat)
    #[arg(long, value_name = "DIR", env = "YHCHAT_SETTINGS_DIR", global = true)]
    pub settings_dir: Option<PathBuf>,

    /// Account id used in the login frame
    #[arg(long, value_name = "ID", env = "YHCHAT_USER_ID", global = true)]
    pub user_id: Option<String>,

    /// Bearer token used in the login frame
    #[arg(
        long,
        value_name = "TOKEN",
        env = "YHCHAT_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub token: Option<String>,

    /// Realtime WebSocket URL (wss://…)
    #[arg(long = "ws-url", value_name = "WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// Debug logging for the pipeline
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, value_name = "FORMAT", global = true)]
    pub log_format: Option<LogFormat>,
}

impl CommonArgs {
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            return Some(config.clone());
        }

        self.settings_dir
            .as_ref()
            .map(|settings_dir| settings_dir.join("config.toml"))
    }

    /// Environment logging settings with the command-line flags applied.
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::from_env();
        if self.verbose {
            config = config.verbose();
        }
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        config
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(settings_dir) = &self.settings_dir {
            config.settings_dir = settings_dir.clone();
        }

        if let Some(user_id) = &self.user_id {
            config.user_id = Some(user_id.clone());
        }

        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }

        if let Some(ws_url) = &self.ws_url {
            config.realtime.ws_url = ws_url.clone();
        }
    }
}
