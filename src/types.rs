use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One element of a `GET /repos/{owner}/{repo}/commits` page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommitRecord {
    pub sha: String,
    pub commit: CommitMeta,
    /// GitHub account of the author, if the API could attribute one.
    pub author: Option<AccountRef>,
    /// GitHub account of the committer, if the API could attribute one.
    pub committer: Option<AccountRef>,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommitMeta {
    pub author: GitSignature,
    pub committer: GitSignature,
    pub message: String,
}

/// Raw name/date signature from the commit metadata. Always present, even
/// when the account-level `author`/`committer` are null.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitSignature {
    pub name: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountRef {
    pub login: String,
    pub avatar_url: String,
}

impl CommitRecord {
    /// Message body past the title and its separator line.
    pub fn body_lines(&self) -> impl Iterator<Item = &str> {
        self.commit.message.lines().skip(2)
    }

    /// Merge commits created through the web UI carry this committer name;
    /// for those the committer attribution is suppressed.
    pub fn is_web_flow_commit(&self) -> bool {
        self.commit.committer.name == "GitHub"
    }
}
