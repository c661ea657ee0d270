use once_cell::sync::Lazy;
use regex::Regex;

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Category prefix: a non-whitespace-starting run up to the first colon.
/// Colons and quotes never appear inside a prefix; what follows the colon
/// is validated separately.
static CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\S[^:"]*?):(.*)$"#).unwrap());

/// Standard git revert wrapper around the original title.
static REVERT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^Revert "(.+)"\s*$"#).unwrap());

/// What the categorizer read out of one commit message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorized {
    /// Category path strings, in message order. Never empty.
    pub paths: Vec<String>,
    /// Display title: the text after the category prefix, or the whole
    /// first line when uncategorized.
    pub title: String,
    pub is_revert: bool,
}

/// Derives category paths from a commit message. Reverts unwrap to the
/// original title so they inherit its categories; `+` in the prefix files
/// the commit under several sibling categories at once.
pub fn categorize(message: &str) -> Categorized {
    let trimmed = message.trim();
    let mut first_line = trimmed.lines().next().unwrap_or("");

    let mut is_revert = false;
    if let Some(caps) = REVERT_RE.captures(first_line) {
        is_revert = true;
        first_line = caps.get(1).map_or("", |m| m.as_str());
    }

    if let Some(caps) = CATEGORY_RE.captures(first_line) {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps.get(2).map_or("", |m| m.as_str());
        if category_separator_is_real(rest) {
            let paths: Vec<String> = prefix
                .split('+')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect();
            if !paths.is_empty() {
                return Categorized {
                    paths,
                    title: rest.trim_start().to_owned(),
                    is_revert,
                };
            }
        }
    }

    Categorized {
        paths: vec![UNCATEGORIZED.to_owned()],
        title: first_line.to_owned(),
        is_revert,
    }
}

/// Guards against colons that are not category separators: conventional
/// `::` scopes, emoticons like `:)` and `:^)`, and prefixes with nothing
/// meaningful after them.
fn category_separator_is_real(rest: &str) -> bool {
    !rest.starts_with(':')
        && !rest.starts_with(')')
        && !rest.starts_with("^)")
        && !rest.trim().is_empty()
}
