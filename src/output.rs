use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::tree::TreeEvent;
use crate::types::CommitRecord;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Default,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Default => write!(f, "default"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(OutputFormat::Default),
            "json" => Ok(OutputFormat::Json),
            _ => anyhow::bail!("Invalid format '{}'. Use 'default' or 'json'", s),
        }
    }
}

pub fn print_events(format: &OutputFormat, events: &[TreeEvent<'_>]) -> Result<()> {
    match format {
        OutputFormat::Default => print_text_output(events),
        OutputFormat::Json => print_json_output(events)?,
    }
    Ok(())
}

fn print_text_output(events: &[TreeEvent<'_>]) {
    for event in events {
        match event {
            TreeEvent::Marker { category, depth } => {
                let pad = "  ".repeat(*depth);
                if category.commits().is_empty() {
                    println!("{pad}{}:", category.name());
                } else {
                    println!("{pad}{}: ({})", category.name(), category.commits().len());
                }
            }
            TreeEvent::Commit { depth, entry, .. } => {
                let pad = "  ".repeat(depth + 1);
                let short_sha = entry.record.sha.get(..7).unwrap_or(&entry.record.sha);
                let revert_tag = if entry.is_revert { " [revert]" } else { "" };
                println!("{pad}- {}{revert_tag} ({short_sha})", entry.title);
                if let Some(line) = attribution(&entry.record) {
                    println!("{pad}    {line}");
                }
                for body_line in entry.record.body_lines() {
                    println!("{pad}    | {body_line}");
                }
            }
        }
    }
}

/// Who to credit, following the dual-attribution rules: the account author
/// when it differs from the committer (or the raw name when the API could
/// not attribute an account), and the committer unless the commit came
/// through the web-flow bot.
fn attribution(record: &CommitRecord) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    match &record.author {
        Some(account) => {
            let committer_login = record.committer.as_ref().map(|c| c.login.as_str());
            if Some(account.login.as_str()) != committer_login {
                parts.push(format!("{} authored", account.login));
            }
        }
        None => parts.push(format!("{} authored", record.commit.author.name)),
    }

    if !record.is_web_flow_commit() {
        let committer = record
            .committer
            .as_ref()
            .map(|c| c.login.clone())
            .unwrap_or_else(|| record.commit.committer.name.clone());
        parts.push(format!("{committer} committed"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" and "))
    }
}

/// The machine-facing shape of one traversal event.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum EventRecord<'a> {
    Marker {
        category: &'a str,
        selector: &'a str,
        depth: usize,
    },
    Commit {
        category: &'a str,
        selector: &'a str,
        depth: usize,
        index: usize,
        sha: &'a str,
        title: &'a str,
        revert: bool,
        url: &'a str,
        date: Option<chrono::DateTime<chrono::Utc>>,
        author: Option<&'a str>,
        author_avatar: Option<&'a str>,
        committer: Option<&'a str>,
        committer_avatar: Option<&'a str>,
    },
}

fn print_json_output(events: &[TreeEvent<'_>]) -> Result<()> {
    let json = serde_json::to_string_pretty(&event_records(events))?;
    println!("{json}");
    Ok(())
}

fn event_records<'a>(events: &'a [TreeEvent<'a>]) -> Vec<EventRecord<'a>> {
    events
        .iter()
        .map(|event| match event {
            TreeEvent::Marker { category, depth } => EventRecord::Marker {
                category: category.path(),
                selector: category.selector_id(),
                depth: *depth,
            },
            TreeEvent::Commit {
                category,
                depth,
                index,
                entry,
            } => EventRecord::Commit {
                category: category.path(),
                selector: category.selector_id(),
                depth: *depth,
                index: *index,
                sha: &entry.record.sha,
                title: &entry.title,
                revert: entry.is_revert,
                url: &entry.record.html_url,
                date: entry.record.commit.author.date,
                author: login_of(&entry.record.author),
                author_avatar: avatar_of(&entry.record.author),
                committer: login_of(&entry.record.committer),
                committer_avatar: avatar_of(&entry.record.committer),
            },
        })
        .collect()
}

fn login_of(account: &Option<crate::types::AccountRef>) -> Option<&str> {
    account.as_ref().map(|a| a.login.as_str())
}

fn avatar_of(account: &Option<crate::types::AccountRef>) -> Option<&str> {
    account.as_ref().map(|a| a.avatar_url.as_str())
}
