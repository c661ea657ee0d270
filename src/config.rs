use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::github::COMMITS_PER_PAGE;
use crate::output::OutputFormat;
use crate::window::{CivilDate, next_month, previous_month};

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[command(name = "changelog-digest")]
#[command(about = "Render a categorized daily or monthly changelog for a GitHub repository")]
#[command(version)]
pub struct Config {
    /// Repository slug, owner/name
    #[arg(long)]
    #[serde(default)]
    pub repo: Option<String>,

    /// Day to cover, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long)]
    #[serde(skip)]
    pub date: Option<String>,

    /// Cover the whole month of the chosen date
    #[arg(long, default_value_t = false)]
    #[serde(skip)]
    pub monthly: bool,

    /// Year for month mode (with --month)
    #[arg(long)]
    #[serde(skip)]
    pub year: Option<i32>,

    /// Month for month mode, 1-12 (with --year)
    #[arg(long)]
    #[serde(skip)]
    pub month: Option<u32>,

    /// Step one window back (a day, or a month in monthly mode)
    #[arg(long, default_value_t = false)]
    #[serde(skip)]
    pub back: bool,

    /// Step one window forward (a day, or a month in monthly mode)
    #[arg(long, default_value_t = false)]
    #[serde(skip)]
    pub forward: bool,

    /// GitHub access token (falls back to GITHUB_TOKEN, then the config file)
    #[arg(long)]
    #[serde(default)]
    pub token: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, value_parser = OutputFormat::from_str)]
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Commits requested per page
    #[arg(long)]
    #[serde(default)]
    pub per_page: Option<usize>,
}

/// What the date controls resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Day(CivilDate),
    Month { year: i32, month: u32 },
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;

        let config: Config =
            toml::from_str(&content).context("Failed to parse TOML configuration file")?;

        Ok(config)
    }

    /// Fills the token from the environment when the CLI did not set one,
    /// so the precedence is CLI, then environment, then config file.
    pub fn with_env_token(mut self) -> Self {
        self.token = self.token.or_else(|| env::var("GITHUB_TOKEN").ok());
        self
    }

    pub fn merge(mut self, file_config: Config) -> Self {
        // CLI has precedence, if None, take from file_config
        self.repo = self.repo.or(file_config.repo);
        self.token = self.token.or(file_config.token);
        self.format = self.format.or(file_config.format);
        self.per_page = self.per_page.or(file_config.per_page);
        self
    }

    pub fn with_defaults(mut self) -> Self {
        self.repo = self.repo.or(Some("SerenityOS/serenity".to_string()));
        self.format = self.format.or(Some(OutputFormat::Default));
        self.per_page = self.per_page.or(Some(COMMITS_PER_PAGE));
        self
    }

    // Convenience getters that unwrap (safe after with_defaults)
    pub fn get_format(&self) -> &OutputFormat {
        self.format.as_ref().expect("Format should be set")
    }

    pub fn get_per_page(&self) -> usize {
        self.per_page.expect("per_page should be set")
    }

    /// Splits the repository slug into owner and name.
    pub fn repo_parts(&self) -> Result<(&str, &str)> {
        let slug = self.repo.as_deref().expect("Repo should be set");
        slug.split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .with_context(|| format!("Repository must be given as owner/name, got '{slug}'"))
    }

    /// Resolves the date controls. An unparseable or missing date falls
    /// back to today; explicit year+month selects month mode directly;
    /// --back/--forward step the resolved window.
    pub fn query_mode(&self) -> QueryMode {
        if let (Some(year), Some(month)) = (self.year, self.month) {
            if (1..=12).contains(&month) {
                let (year, month) = self.step_month(year, month);
                return QueryMode::Month { year, month };
            }
        }

        let mut date = self
            .date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
            .map(|d| {
                use chrono::Datelike;
                CivilDate::new(d.year(), d.month(), d.day())
            })
            .unwrap_or_else(CivilDate::today);

        if self.monthly {
            let (year, month) = self.step_month(date.year, date.month);
            QueryMode::Month { year, month }
        } else {
            if self.back {
                date = date.previous_day();
            }
            if self.forward {
                date = date.next_day();
            }
            QueryMode::Day(date)
        }
    }

    fn step_month(&self, year: i32, month: u32) -> (i32, u32) {
        if self.back {
            previous_month(year, month)
        } else if self.forward {
            next_month(year, month)
        } else {
            (year, month)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with_date(date: Option<&str>, monthly: bool) -> Config {
        Config {
            date: date.map(str::to_owned),
            monthly,
            ..Default::default()
        }
    }

    #[test]
    fn valid_date_selects_that_day() {
        let mode = config_with_date(Some("2024-02-29"), false).query_mode();
        assert_eq!(mode, QueryMode::Day(CivilDate::new(2024, 2, 29)));
    }

    #[test]
    fn monthly_flag_widens_to_the_month() {
        let mode = config_with_date(Some("2024-02-29"), true).query_mode();
        assert_eq!(
            mode,
            QueryMode::Month {
                year: 2024,
                month: 2
            }
        );
    }

    #[test]
    fn invalid_date_falls_back_to_today() {
        let mode = config_with_date(Some("2024-13-45"), false).query_mode();
        assert_eq!(mode, QueryMode::Day(CivilDate::today()));
    }

    #[test]
    fn explicit_year_and_month_win() {
        let config = Config {
            year: Some(2023),
            month: Some(7),
            date: Some("2024-02-29".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.query_mode(),
            QueryMode::Month {
                year: 2023,
                month: 7
            }
        );
    }

    #[test]
    fn out_of_range_month_falls_back_to_date() {
        let config = Config {
            year: Some(2023),
            month: Some(13),
            date: Some("2024-02-29".to_string()),
            ..Default::default()
        };
        assert_eq!(config.query_mode(), QueryMode::Day(CivilDate::new(2024, 2, 29)));
    }

    #[test]
    fn stepping_rolls_across_calendar_boundaries() {
        let mut config = config_with_date(Some("2024-03-01"), false);
        config.back = true;
        assert_eq!(config.query_mode(), QueryMode::Day(CivilDate::new(2024, 2, 29)));

        let mut config = config_with_date(Some("2024-12-31"), false);
        config.forward = true;
        assert_eq!(config.query_mode(), QueryMode::Day(CivilDate::new(2025, 1, 1)));

        let mut config = config_with_date(Some("2024-01-15"), true);
        config.back = true;
        assert_eq!(
            config.query_mode(),
            QueryMode::Month {
                year: 2023,
                month: 12
            }
        );
    }

    #[test]
    fn repo_slug_validation() {
        let mut config = Config::default().with_defaults();
        assert_eq!(config.repo_parts().unwrap(), ("SerenityOS", "serenity"));

        config.repo = Some("not-a-slug".to_string());
        assert!(config.repo_parts().is_err());

        config.repo = Some("/half".to_string());
        assert!(config.repo_parts().is_err());
    }

    #[test]
    fn cli_wins_over_file_wins_over_defaults() {
        let cli = Config {
            per_page: Some(42),
            ..Default::default()
        };
        let file = Config {
            repo: Some("example/repo".to_string()),
            per_page: Some(7),
            ..Default::default()
        };
        let merged = cli.merge(file).with_defaults();
        assert_eq!(merged.get_per_page(), 42);
        assert_eq!(merged.repo.as_deref(), Some("example/repo"));
        assert!(matches!(merged.get_format(), OutputFormat::Default));
    }

    #[test]
    fn config_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "repo = \"example/repo\"\nformat = \"json\"\nper_page = 50"
        )
        .unwrap();

        let config = Config::from_toml(file.path()).unwrap();
        assert_eq!(config.repo.as_deref(), Some("example/repo"));
        assert!(matches!(config.format, Some(OutputFormat::Json)));
        assert_eq!(config.per_page, Some(50));
    }
}
