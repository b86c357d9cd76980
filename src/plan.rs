//! Rename plans and the collision check every strategy ends with.

use crate::error::{AppError, Result};
use crate::types::FileEntry;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// One old-name → new-name pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
}

impl RenameEntry {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl fmt::Display for RenameEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A target name claimed more than once, or already taken by an entry the
/// plan leaves alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub target: String,
    pub sources: Vec<String>,
    /// True when `target` is the name of an untouched sibling.
    pub existing: bool,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.existing {
            write!(
                f,
                "'{}' already exists (wanted by {})",
                self.target,
                self.sources.join(", ")
            )
        } else {
            write!(f, "'{}' wanted by {}", self.target, self.sources.join(", "))
        }
    }
}

/// A validated, ordered rename mapping for one directory.
///
/// The only way to build one is [`RenamePlan::validate`], so every plan in
/// circulation has unique, non-empty targets that do not overwrite untouched
/// entries.
///
/// [`entries`](RenamePlan::entries) is the mapping as computed.
/// [`steps`](RenamePlan::steps) is the order the renames must be applied in:
/// a file is moved out of the way before another one takes its name, and
/// cycles such as a swap go through a temporary name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenamePlan {
    entries: Vec<RenameEntry>,
    steps: Vec<RenameEntry>,
}

impl RenamePlan {
    /// Check `entries` against each other and against the directory listing.
    ///
    /// `siblings` is the full listing of the directory (files and
    /// subdirectories). Entries not renamed by the plan keep their names, so
    /// no target may equal one of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use episode_renamer::plan::{RenameEntry, RenamePlan};
    /// use episode_renamer::types::FileEntry;
    ///
    /// let listing = vec![FileEntry::file("a.mkv"), FileEntry::file("b.mkv")];
    /// let ok = RenamePlan::validate(vec![RenameEntry::new("a.mkv", "c.mkv")], &listing);
    /// assert!(ok.is_ok());
    ///
    /// let clash = RenamePlan::validate(vec![RenameEntry::new("a.mkv", "b.mkv")], &listing);
    /// assert!(clash.is_err());
    /// ```
    pub fn validate(entries: Vec<RenameEntry>, siblings: &[FileEntry]) -> Result<Self> {
        if let Some(empty) = entries.iter().find(|e| e.to.trim().is_empty()) {
            return Err(AppError::InvalidInput(format!(
                "empty new name for '{}'",
                empty.from
            )));
        }

        let renamed: HashSet<&str> = entries.iter().map(|e| e.from.as_str()).collect();
        let untouched: HashSet<&str> = siblings
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !renamed.contains(name))
            .collect();

        // Group sources by target, keeping first-seen order for stable reports.
        let mut order: Vec<&str> = Vec::new();
        let mut by_target: HashMap<&str, Vec<String>> = HashMap::new();
        for entry in &entries {
            let sources = by_target.entry(entry.to.as_str()).or_insert_with(|| {
                order.push(entry.to.as_str());
                Vec::new()
            });
            sources.push(entry.from.clone());
        }

        let collisions: Vec<Collision> = order
            .into_iter()
            .filter_map(|target| {
                let sources = &by_target[target];
                let existing = untouched.contains(target);
                if sources.len() > 1 || existing {
                    Some(Collision {
                        target: target.to_string(),
                        sources: sources.clone(),
                        existing,
                    })
                } else {
                    None
                }
            })
            .collect();

        if !collisions.is_empty() {
            return Err(AppError::Collision(collisions));
        }

        let mut taken: HashSet<String> = siblings.iter().map(|s| s.name.clone()).collect();
        taken.extend(entries.iter().flat_map(|e| [e.from.clone(), e.to.clone()]));
        let steps = execution_order(&entries, &mut taken);

        Ok(Self { entries, steps })
    }

    pub fn entries(&self) -> &[RenameEntry] {
        &self.entries
    }

    /// The renames in the order they are safe to apply one after another.
    pub fn steps(&self) -> &[RenameEntry] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The new name planned for `from`, if any.
    pub fn target_of(&self, from: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.from == from)
            .map(|e| e.to.as_str())
    }
}

/// Order `entries` so that no rename lands on a name that another entry has
/// not moved away yet.
///
/// Targets are unique, so the "must wait for" relation forms simple chains
/// and cycles. Chains run from their far end; each cycle starts by parking one
/// file under a temporary name and ends by moving it to its target.
fn execution_order(entries: &[RenameEntry], taken: &mut HashSet<String>) -> Vec<RenameEntry> {
    let by_from: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.from.as_str(), i))
        .collect();
    // The entry currently holding the target of entry `i`.
    let blocker = |i: usize| {
        by_from
            .get(entries[i].to.as_str())
            .copied()
            .filter(|&j| j != i)
    };
    let waited_on: HashSet<usize> = (0..entries.len()).filter_map(blocker).collect();

    let mut done = vec![false; entries.len()];
    let mut steps = Vec::with_capacity(entries.len());

    for start in (0..entries.len()).filter(|i| !waited_on.contains(i)) {
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(i) = current {
            chain.push(i);
            done[i] = true;
            current = blocker(i);
        }
        steps.extend(chain.iter().rev().map(|&i| entries[i].clone()));
    }

    for start in 0..entries.len() {
        if done[start] {
            continue;
        }
        let mut cycle = Vec::new();
        let mut current = start;
        while !done[current] {
            done[current] = true;
            cycle.push(current);
            match blocker(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        let first = &entries[cycle[0]];
        let temp = temporary_name(&first.from, taken);
        debug!("Breaking rename cycle at {} via {}", first.from, temp);
        steps.push(RenameEntry::new(&first.from, &temp));
        steps.extend(cycle[1..].iter().rev().map(|&i| entries[i].clone()));
        steps.push(RenameEntry::new(&temp, &first.to));
    }

    steps
}

fn temporary_name(from: &str, taken: &mut HashSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = if n == 1 {
            format!("{}.renaming", from)
        } else {
            format!("{}.renaming-{}", from, n)
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
