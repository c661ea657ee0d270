use std::collections::BTreeMap;

use crate::types::CommitRecord;

/// A commit as filed into the tree, paired with its parsed presentation.
#[derive(Debug, Clone)]
pub struct CommitEntry {
    pub record: CommitRecord,
    pub title: String,
    pub is_revert: bool,
}

/// One node of the category tree. Children are keyed by the lowercase
/// segment name, so lookups are case-insensitive while the display name
/// keeps the casing of the first commit that created the node.
#[derive(Debug)]
pub struct Category {
    name: String,
    path: String,
    selector_id: String,
    children: BTreeMap<String, Category>,
    commits: Vec<CommitEntry>,
}

impl Category {
    fn root() -> Self {
        Category {
            name: String::new(),
            path: String::new(),
            selector_id: String::new(),
            children: BTreeMap::new(),
            commits: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full display path, segments joined with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Renderer-facing identifier, unique per node.
    pub fn selector_id(&self) -> &str {
        &self.selector_id
    }

    pub fn commits(&self) -> &[CommitEntry] {
        &self.commits
    }

    fn child_or_create(&mut self, segment: &str) -> &mut Category {
        let key = segment.to_lowercase();
        let path = if self.path.is_empty() {
            segment.to_owned()
        } else {
            format!("{}/{}", self.path, segment)
        };
        let selector_id = join_selector(&self.selector_id, segment);
        self.children.entry(key).or_insert_with(|| Category {
            name: segment.to_owned(),
            path,
            selector_id,
            children: BTreeMap::new(),
            commits: Vec::new(),
        })
    }

    fn descend(&mut self, path: &str) -> &mut Category {
        let mut node = self;
        for segment in split_segments(path) {
            if segment.is_empty() {
                continue;
            }
            node = node.child_or_create(segment);
        }
        node
    }
}

/// Traversal output: the sole data contract with the renderer.
#[derive(Debug)]
pub enum TreeEvent<'a> {
    /// "This category exists", emitted before any of its commits so empty
    /// parent headers still render.
    Marker { category: &'a Category, depth: usize },
    Commit {
        category: &'a Category,
        depth: usize,
        /// 0-based position in insertion order at this node.
        index: usize,
        entry: &'a CommitEntry,
    },
}

/// Rebuilt from scratch on every query; nodes are created on first
/// insertion along a path and never removed within a cycle.
#[derive(Debug)]
pub struct CategoryTree {
    root: Category,
}

impl Default for CategoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryTree {
    pub fn new() -> Self {
        CategoryTree {
            root: Category::root(),
        }
    }

    /// Files the entry at the final node of every path. A commit given
    /// several `+`-joined categories lands in each subtree independently;
    /// intermediate nodes always materialize.
    pub fn insert(&mut self, entry: CommitEntry, paths: &[String]) {
        for path in paths {
            self.root.descend(path).commits.push(entry.clone());
        }
    }

    /// Depth-first pre-order: per node one marker, then its commits in
    /// insertion order, then children ordered by lowercase key. The root
    /// itself emits no marker.
    pub fn events(&self) -> Vec<TreeEvent<'_>> {
        let mut out = Vec::new();
        for child in self.root.children.values() {
            collect(child, 0, &mut out);
        }
        out
    }
}

fn collect<'a>(node: &'a Category, depth: usize, out: &mut Vec<TreeEvent<'a>>) {
    out.push(TreeEvent::Marker {
        category: node,
        depth,
    });
    for (index, entry) in node.commits.iter().enumerate() {
        out.push(TreeEvent::Commit {
            category: node,
            depth,
            index,
            entry,
        });
    }
    for child in node.children.values() {
        collect(child, depth + 1, out);
    }
}

/// Splits a category path into descent segments. A leading `/` is literal
/// and stays part of the first segment, never an empty path element.
fn split_segments(path: &str) -> Vec<&str> {
    match path.strip_prefix('/') {
        Some(rest) => {
            let mut iter = rest.split('/');
            let first_len = iter.next().map_or(0, str::len);
            let mut segments = vec![&path[..first_len + 1]];
            segments.extend(iter);
            segments
        }
        None => path.split('/').collect(),
    }
}

fn sanitize_selector(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '>' | '+' | '/' | '.'))
        .collect();
    if stripped.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("i{stripped}")
    } else {
        stripped
    }
}

fn join_selector(parent: &str, name: &str) -> String {
    let own = sanitize_selector(name);
    if parent.is_empty() {
        own
    } else {
        format!("{parent}-{own}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommitMeta, GitSignature};

    fn entry(sha: &str, title: &str) -> CommitEntry {
        CommitEntry {
            record: CommitRecord {
                sha: sha.to_string(),
                commit: CommitMeta {
                    author: GitSignature {
                        name: "Jane Hacker".to_string(),
                        date: None,
                    },
                    committer: GitSignature {
                        name: "Jane Hacker".to_string(),
                        date: None,
                    },
                    message: title.to_string(),
                },
                author: None,
                committer: None,
                html_url: format!("https://github.com/example/repo/commit/{sha}"),
            },
            title: title.to_string(),
            is_revert: false,
        }
    }

    fn markers(events: &[TreeEvent<'_>]) -> Vec<(String, usize)> {
        events
            .iter()
            .filter_map(|e| match e {
                TreeEvent::Marker { category, depth } => Some((category.path().to_string(), *depth)),
                _ => None,
            })
            .collect()
    }

    fn commit_count(events: &[TreeEvent<'_>]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, TreeEvent::Commit { .. }))
            .count()
    }

    #[test]
    fn intermediate_nodes_materialize_and_emit_markers() {
        let mut tree = CategoryTree::new();
        tree.insert(entry("a", "fix rect"), &["LibGfx/Painter".to_string()]);

        let events = tree.events();
        assert_eq!(
            markers(&events),
            vec![("LibGfx".to_string(), 0), ("LibGfx/Painter".to_string(), 1)]
        );
        // The parent header exists even though it holds no direct commits.
        match &events[0] {
            TreeEvent::Marker { category, .. } => assert!(category.commits().is_empty()),
            other => panic!("expected marker first, got {other:?}"),
        }
        assert_eq!(commit_count(&events), 1);
    }

    #[test]
    fn commit_events_round_trip_insertions() {
        let mut tree = CategoryTree::new();
        tree.insert(entry("a", "one"), &["Kernel".to_string()]);
        tree.insert(entry("b", "two"), &["Kernel".to_string(), "LibC".to_string()]);
        tree.insert(entry("c", "three"), &["Uncategorized".to_string()]);

        // One commit event per (commit, path) pair.
        assert_eq!(commit_count(&tree.events()), 4);
    }

    #[test]
    fn indices_follow_insertion_order() {
        let mut tree = CategoryTree::new();
        for (sha, title) in [("a", "first"), ("b", "second"), ("c", "third")] {
            tree.insert(entry(sha, title), &["Kernel".to_string()]);
        }
        let indices: Vec<(usize, String)> = tree
            .events()
            .iter()
            .filter_map(|e| match e {
                TreeEvent::Commit { index, entry, .. } => Some((*index, entry.record.sha.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            indices,
            vec![(0, "a".to_string()), (1, "b".to_string()), (2, "c".to_string())]
        );
    }

    #[test]
    fn siblings_merge_case_insensitively_keeping_first_seen_casing() {
        let mut tree = CategoryTree::new();
        tree.insert(entry("a", "one"), &["LibGFX/Painter".to_string()]);
        tree.insert(entry("b", "two"), &["LibGfx/Painter".to_string()]);

        let events = tree.events();
        assert_eq!(
            markers(&events),
            vec![("LibGFX".to_string(), 0), ("LibGFX/Painter".to_string(), 1)]
        );
        assert_eq!(commit_count(&events), 2);
    }

    #[test]
    fn children_sort_by_lowercase_key() {
        let mut tree = CategoryTree::new();
        tree.insert(entry("a", "x"), &["zeta".to_string()]);
        tree.insert(entry("b", "y"), &["Alpha".to_string()]);
        tree.insert(entry("c", "z"), &["beta".to_string()]);

        let names: Vec<String> = markers(&tree.events()).into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn leading_slash_is_part_of_the_first_segment() {
        let mut tree = CategoryTree::new();
        tree.insert(entry("a", "x"), &["/bin/ls".to_string()]);

        let names: Vec<String> = markers(&tree.events()).into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, vec!["/bin", "/bin/ls"]);
    }

    #[test]
    fn selector_ids_strip_and_prefix() {
        let mut tree = CategoryTree::new();
        tree.insert(entry("a", "x"), &["LibGfx/Painter".to_string()]);
        tree.insert(entry("b", "y"), &["3DFileViewer".to_string()]);

        let ids: Vec<String> = tree
            .events()
            .iter()
            .filter_map(|e| match e {
                TreeEvent::Marker { category, .. } => Some(category.selector_id().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["i3DFileViewer", "LibGfx", "LibGfx-Painter"]);
    }
}
