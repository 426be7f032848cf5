//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use snapnotify_sync::http::DEFAULT_BASE_URL;
use snapnotify_sync::{ClientConfig, FeedConfig};

#[derive(Debug, Parser)]
#[command(
    name = "snapnotify",
    version,
    about = "SafetySnap notifications with locally reconciled read state"
)]
pub struct Cli {
    /// API root of the SafetySnap backend.
    #[arg(long, env = "SNAPNOTIFY_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// API token, sent as `Authorization: Token <token>`.
    #[arg(long, env = "SNAPNOTIFY_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Directory holding the persisted read set.
    #[arg(long, env = "SNAPNOTIFY_STATE_DIR", default_value = ".snapnotify", global = true)]
    pub state_dir: PathBuf,

    /// Poll interval for `watch`, in seconds.
    #[arg(
        long,
        env = "SNAPNOTIFY_POLL_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub poll_secs: u64,

    /// HTTP request timeout, in seconds.
    #[arg(
        long,
        env = "SNAPNOTIFY_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub timeout_secs: u64,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List notifications with their read state.
    List {
        /// Only show unread notifications.
        #[arg(long)]
        unread: bool,
    },
    /// Print the unread count.
    Unread,
    /// Poll continuously and print new notifications until interrupted.
    Watch,
    /// Mark one notification read.
    Read { id: String },
    /// Mark every notification in the current feed read.
    ReadAll,
    /// Delete a notification on the server.
    Delete { id: String },
    /// Clear the locally persisted read set.
    Forget,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Only `watch` runs the poll timer; every other command is one-shot.
    pub fn feed_config(&self) -> FeedConfig {
        let poll_interval = match self.command {
            Command::Watch => Some(Duration::from_secs(self.poll_secs)),
            _ => None,
        };
        FeedConfig { poll_interval }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["snapnotify", "list"]).unwrap();
        assert_eq!(cli.poll_secs, 10);
        assert_eq!(cli.timeout_secs, 30);
        assert!(matches!(cli.command, Command::List { unread: false }));
        assert!(cli.feed_config().poll_interval.is_none());
    }

    #[test]
    fn watch_enables_polling() {
        let cli =
            Cli::try_parse_from(["snapnotify", "--poll-secs", "3", "watch"]).unwrap();
        assert_eq!(
            cli.feed_config().poll_interval,
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn zero_poll_interval_rejected() {
        assert!(Cli::try_parse_from(["snapnotify", "--poll-secs", "0", "watch"]).is_err());
    }

    #[test]
    fn client_config_from_flags() {
        let cli = Cli::try_parse_from([
            "snapnotify",
            "read",
            "violation_3",
            "--base-url",
            "https://safetysnap.example/api",
            "--token",
            "abc",
        ])
        .unwrap();
        let config = cli.client_config();
        assert_eq!(config.base_url, "https://safetysnap.example/api");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert!(matches!(cli.command, Command::Read { ref id } if id == "violation_3"));
    }

    #[test]
    fn empty_token_is_ignored() {
        let cli = Cli::try_parse_from(["snapnotify", "unread", "--token", ""]).unwrap();
        assert!(cli.client_config().token.is_none());
    }
}
