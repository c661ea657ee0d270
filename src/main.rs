use anyhow::Result;
use clap::Parser;
use tracing::info;

mod categorize;
mod config;
mod github;
mod output;
mod tree;
mod triage;
mod types;
mod window;

use crate::categorize::categorize;
use crate::config::{Config, QueryMode};
use crate::github::{FetchOutcome, QuerySession};
use crate::output::{OutputFormat, print_events};
use crate::tree::{CategoryTree, CommitEntry};
use crate::triage::{Rejection, Triage, triage};
use crate::types::CommitRecord;
use crate::window::{day_window, month_window};

fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let mut config = Config::parse().with_env_token();
    if let Some(path) = config.config_file.clone() {
        let file_config = Config::from_toml(&path)?;
        config = config.merge(file_config);
    }
    let config = config.with_defaults();

    let (owner, repo) = config.repo_parts()?;

    let (window, heading) = match config.query_mode() {
        QueryMode::Day(date) => (day_window(date), date.iso_date()),
        QueryMode::Month { year, month } => {
            (month_window(year, month), format!("{year:04}-{month:02}"))
        }
    };

    let mut session = QuerySession::new(config.token.as_deref())?;
    let outcome = session
        .fetch_window(owner, repo, &window, config.get_per_page())
        .await?;

    let raw = match outcome {
        // Superseded by a newer query; nothing to show, nothing to report.
        FetchOutcome::Cancelled => return Ok(()),
        FetchOutcome::Complete(raw) => raw,
    };
    info!("Fetched {} raw records", raw.len());

    if matches!(config.get_format(), OutputFormat::Default) {
        println!("Changelog for {owner}/{repo}, {heading}");
        println!();
    }

    match triage(raw)? {
        Triage::NoCommits => match config.get_format() {
            OutputFormat::Default => println!("No commits in this window."),
            OutputFormat::Json => print_events(config.get_format(), &[])?,
        },
        Triage::Commits(commits) => render(&config, commits)?,
        Triage::Rejected {
            rejection,
            recovered,
        } => {
            if recovered.is_empty() {
                match rejection {
                    Rejection::BadCredentials => anyhow::bail!(
                        "GitHub rejected the access token; check your token and try again"
                    ),
                    Rejection::RateLimited => anyhow::bail!(
                        "GitHub rate limit exceeded; retry later or supply an access token"
                    ),
                }
            }
            render(&config, recovered)?;
            let note = match rejection {
                Rejection::BadCredentials => {
                    "warning: GitHub rejected the access token part-way through; showing what was fetched before that"
                }
                Rejection::RateLimited => {
                    "warning: rate limited part-way through; showing what was fetched before that"
                }
            };
            eprintln!("{note}");
        }
    }

    Ok(())
}

/// Categorizes every commit, aggregates the tree and hands the traversal
/// to the renderer. Never fails on commit content.
fn render(config: &Config, commits: Vec<CommitRecord>) -> Result<()> {
    let mut tree = CategoryTree::new();
    for record in commits {
        let parsed = categorize(&record.commit.message);
        let entry = CommitEntry {
            record,
            title: parsed.title,
            is_revert: parsed.is_revert,
        };
        tree.insert(entry, &parsed.paths);
    }
    print_events(config.get_format(), &tree.events())
}
