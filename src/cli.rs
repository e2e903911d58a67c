use clap::{Parser, Subcommand};

use crate::settings::SETTINGS_FILE;

#[derive(Parser)]
#[command(name = "reaction-award")]
#[command(about = "Rank a Slack workspace's messages by the reactions they received")]
pub struct Cli {
    /// Settings file path
    #[arg(short, long, global = true, default_value = SETTINGS_FILE)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest a whole year of history and post the awards
    Award {
        /// Year to rank, defaults to the configured year or the current one
        #[arg(short, long)]
        year: Option<i32>,

        /// Channel id to post results to, overrides the settings file
        #[arg(short, long)]
        post_channel: Option<String>,

        /// Print the results instead of posting them
        #[arg(long)]
        dry_run: bool,

        /// Print the full ranking as JSON instead of posting it
        #[arg(long, conflicts_with = "dry_run")]
        json: bool,
    },

    /// List the channels that would be harvested
    Channels,

    /// Print the Unix timestamps bounding a year
    Window {
        /// Year to compute, defaults to the configured year or the current one
        #[arg(short, long)]
        year: Option<i32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_award_defaults() {
        let cli = Cli::try_parse_from(["reaction-award", "award"]).unwrap();
        assert_eq!(cli.config, "settings.toml");
        match cli.command {
            Commands::Award {
                year,
                post_channel,
                dry_run,
                json,
            } => {
                assert!(year.is_none());
                assert!(post_channel.is_none());
                assert!(!dry_run);
                assert!(!json);
            }
            _ => panic!("expected award command"),
        }
    }

    #[test]
    fn test_parse_award_with_options() {
        let cli = Cli::try_parse_from([
            "reaction-award",
            "award",
            "--year",
            "2019",
            "--post-channel",
            "C0AWARD",
            "--dry-run",
            "--config",
            "other.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, "other.toml");
        match cli.command {
            Commands::Award {
                year,
                post_channel,
                dry_run,
                ..
            } => {
                assert_eq!(year, Some(2019));
                assert_eq!(post_channel.as_deref(), Some("C0AWARD"));
                assert!(dry_run);
            }
            _ => panic!("expected award command"),
        }
    }

    #[test]
    fn test_dry_run_conflicts_with_json() {
        let result = Cli::try_parse_from(["reaction-award", "award", "--dry-run", "--json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_window() {
        let cli = Cli::try_parse_from(["reaction-award", "window", "-y", "2020"]).unwrap();
        assert!(matches!(cli.command, Commands::Window { year: Some(2020) }));
    }
}
