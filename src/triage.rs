use anyhow::{Context, Result};
use serde_json::Value;

use crate::types::CommitRecord;

/// Why the API refused (part of) the query, read off the sentinel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BadCredentials,
    RateLimited,
}

/// Outcome of inspecting a flattened page sequence.
#[derive(Debug)]
pub enum Triage {
    /// Zero commits in the window. A valid state, not an error.
    NoCommits,
    Commits(Vec<CommitRecord>),
    /// The API appended a rejection sentinel. `recovered` holds whatever
    /// valid commits preceded it (possibly none) and must still render.
    Rejected {
        rejection: Rejection,
        recovered: Vec<CommitRecord>,
    },
}

/// Detects a trailing rejection sentinel and deserializes the surviving
/// records. The sentinel is an error payload that landed in the page
/// stream: an object with a `message` but no `sha`.
pub fn triage(mut raw: Vec<Value>) -> Result<Triage> {
    let rejection = match raw.last().and_then(sentinel_reason) {
        Some(rejection) => {
            raw.pop();
            Some(rejection)
        }
        None => None,
    };

    let recovered = raw
        .into_iter()
        .map(|value| {
            serde_json::from_value::<CommitRecord>(value)
                .context("Failed to deserialize commit record")
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(match rejection {
        Some(rejection) => Triage::Rejected {
            rejection,
            recovered,
        },
        None if recovered.is_empty() => Triage::NoCommits,
        None => Triage::Commits(recovered),
    })
}

fn sentinel_reason(value: &Value) -> Option<Rejection> {
    let obj = value.as_object()?;
    if obj.contains_key("sha") {
        return None;
    }
    let message = obj.get("message")?.as_str()?;
    if message == "Bad credentials" {
        Some(Rejection::BadCredentials)
    } else {
        Some(Rejection::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit_value(sha: &str) -> Value {
        json!({
            "sha": sha,
            "commit": {
                "author": {"name": "Jane Hacker", "email": "jane@example.com", "date": "2024-02-29T10:00:00Z"},
                "committer": {"name": "Jane Hacker", "email": "jane@example.com", "date": "2024-02-29T10:00:00Z"},
                "message": "Kernel: Fix scheduler race"
            },
            "author": {"login": "janehacker", "avatar_url": "https://avatars.example/1"},
            "committer": {"login": "janehacker", "avatar_url": "https://avatars.example/1"},
            "html_url": format!("https://github.com/example/repo/commit/{sha}")
        })
    }

    fn bad_credentials() -> Value {
        json!({
            "message": "Bad credentials",
            "documentation_url": "https://docs.github.com/rest"
        })
    }

    fn rate_limited() -> Value {
        json!({
            "message": "API rate limit exceeded for 198.51.100.7.",
            "documentation_url": "https://docs.github.com/rest/overview/rate-limits"
        })
    }

    #[test]
    fn empty_sequence_is_no_commits() {
        assert!(matches!(triage(vec![]).unwrap(), Triage::NoCommits));
    }

    #[test]
    fn plain_commits_pass_through() {
        let out = triage(vec![commit_value("a"), commit_value("b")]).unwrap();
        match out {
            Triage::Commits(commits) => assert_eq!(commits.len(), 2),
            other => panic!("unexpected triage: {other:?}"),
        }
    }

    #[test]
    fn trailing_sentinel_is_popped_and_data_recovered() {
        let out = triage(vec![commit_value("a"), bad_credentials()]).unwrap();
        match out {
            Triage::Rejected {
                rejection,
                recovered,
            } => {
                assert_eq!(rejection, Rejection::BadCredentials);
                assert_eq!(recovered.len(), 1);
                assert_eq!(recovered[0].sha, "a");
            }
            other => panic!("unexpected triage: {other:?}"),
        }
    }

    #[test]
    fn lone_sentinel_is_total_failure() {
        let out = triage(vec![rate_limited()]).unwrap();
        match out {
            Triage::Rejected {
                rejection,
                recovered,
            } => {
                assert_eq!(rejection, Rejection::RateLimited);
                assert!(recovered.is_empty());
            }
            other => panic!("unexpected triage: {other:?}"),
        }
    }

    #[test]
    fn unknown_rejection_reason_counts_as_rate_limiting() {
        let sentinel = json!({"message": "Server Error", "documentation_url": "x"});
        match triage(vec![sentinel]).unwrap() {
            Triage::Rejected { rejection, .. } => assert_eq!(rejection, Rejection::RateLimited),
            other => panic!("unexpected triage: {other:?}"),
        }
    }

    #[test]
    fn malformed_record_is_an_error() {
        assert!(triage(vec![json!({"sha": "a"})]).is_err());
    }
}
