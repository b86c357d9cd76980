//! Rename strategies.
//!
//! Each [`RenameStrategy`] variant turns the selected files of a directory
//! into a [`RenamePlan`]. All of them share the same tail: render failures are
//! collected per file and abort the whole computation, names that would not
//! change are dropped, and the rest goes through [`RenamePlan::validate`].

use crate::error::{AppError, Result};
use crate::parser::{is_video_file, parse_filename, split_extension};
use crate::pattern::{EpisodeFields, NamingPattern, RenderError, RenderFailure, sanitize_filename};
use crate::plan::{RenameEntry, RenamePlan};
use crate::types::FileEntry;
use log::debug;
use regex::Regex;

/// Where uniform mode takes the season number from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeasonSource {
    /// Parse it from each filename; 1 when absent.
    Parsed,
    /// Use the same season for every file.
    Fixed(u32),
}

/// A way of computing new names for the selected files.
#[derive(Clone, Debug)]
pub enum RenameStrategy {
    /// Parse each name and render it with `pattern`. Files without an episode
    /// number are reported as unparsed and skipped, or rendered with
    /// `fallback` when one is given.
    Smart {
        pattern: NamingPattern,
        fallback: Option<NamingPattern>,
    },
    /// One new name per selected file, in selection order. Empty names skip
    /// the file.
    Manual { names: Vec<String> },
    /// One pattern for all files, episodes numbered from `start_episode` in
    /// name order.
    Uniform {
        pattern: NamingPattern,
        title: Option<String>,
        start_episode: u32,
        season: SeasonSource,
    },
    /// Regex search and replace on the stem; extension untouched.
    Regex { search: Regex, replacement: String },
}

/// The result of running a strategy.
#[derive(Clone, Debug, Default)]
pub struct PlanOutcome {
    pub plan: RenamePlan,
    /// Files no episode number could be parsed from.
    pub unparsed: Vec<String>,
    /// Files whose computed name equals their current one.
    pub unchanged: Vec<String>,
}

impl RenameStrategy {
    /// Build a regex strategy. `replacement` may use `\1` style group
    /// references in addition to the `$1` / `${name}` syntax.
    pub fn regex(search: &str, replacement: &str) -> Result<Self> {
        if search.is_empty() {
            return Err(AppError::InvalidInput("search expression is empty".to_string()));
        }
        Ok(RenameStrategy::Regex {
            search: Regex::new(search)?,
            replacement: convert_backrefs(replacement),
        })
    }

    /// Short label for menus and logs.
    pub fn name(&self) -> &'static str {
        match self {
            RenameStrategy::Smart { .. } => "smart",
            RenameStrategy::Manual { .. } => "manual",
            RenameStrategy::Uniform { .. } => "uniform",
            RenameStrategy::Regex { .. } => "regex",
        }
    }

    /// Compute and validate the rename plan for `selected`.
    ///
    /// `siblings` is the full directory listing, used to detect targets that
    /// would overwrite entries outside the plan.
    pub fn compute_plan(&self, selected: &[FileEntry], siblings: &[FileEntry]) -> Result<PlanOutcome> {
        let mut unparsed = Vec::new();
        let candidates: Vec<(String, std::result::Result<String, RenderError>)> = match self {
            RenameStrategy::Smart { pattern, fallback } => selected
                .iter()
                .filter_map(|file| {
                    let parsed = parse_filename(&file.name);
                    if parsed.is_parsed() {
                        return Some((file.name.clone(), pattern.render(&parsed.fields(), &parsed.extension)));
                    }
                    unparsed.push(file.name.clone());
                    fallback.as_ref().map(|fb| {
                        let fields = EpisodeFields {
                            title: parsed.title.clone(),
                            season: None,
                            episode: None,
                        };
                        (file.name.clone(), fb.render(&fields, &parsed.extension))
                    })
                })
                .collect(),

            RenameStrategy::Manual { names } => {
                if names.len() != selected.len() {
                    return Err(AppError::InvalidInput(format!(
                        "{} names given for {} files",
                        names.len(),
                        selected.len()
                    )));
                }
                selected
                    .iter()
                    .zip(names)
                    .filter(|(_, name)| !name.trim().is_empty())
                    .map(|(file, name)| (file.name.clone(), manual_name(&file.name, name)))
                    .collect()
            }

            RenameStrategy::Uniform {
                pattern,
                title,
                start_episode,
                season,
            } => {
                let mut ordered: Vec<&FileEntry> = selected.iter().collect();
                ordered.sort_by(|a, b| a.name.cmp(&b.name));

                let mut out = Vec::with_capacity(ordered.len());
                for (offset, file) in ordered.into_iter().enumerate() {
                    let episode = u32::try_from(offset)
                        .ok()
                        .and_then(|o| start_episode.checked_add(o))
                        .ok_or_else(|| AppError::InvalidInput("episode number overflow".to_string()))?;
                    let parsed = parse_filename(&file.name);
                    let fields = EpisodeFields {
                        title: title.clone().or(parsed.title),
                        season: match season {
                            SeasonSource::Fixed(n) => Some(*n),
                            SeasonSource::Parsed => parsed.season,
                        },
                        episode: Some(episode),
                    };
                    out.push((file.name.clone(), pattern.render(&fields, &parsed.extension)));
                }
                out
            }

            RenameStrategy::Regex { search, replacement } => selected
                .iter()
                .filter_map(|file| {
                    let (stem, extension) = split_extension(&file.name);
                    if !search.is_match(stem) {
                        return None;
                    }
                    let new_stem = sanitize_filename(&search.replace_all(stem, replacement.as_str()));
                    let result = if new_stem.is_empty() {
                        Err(RenderError::Empty)
                    } else {
                        Ok(format!("{}{}", new_stem, extension))
                    };
                    Some((file.name.clone(), result))
                })
                .collect(),
        };

        let outcome = finish(candidates, unparsed, siblings)?;
        debug!(
            "{} strategy: {} renames, {} unchanged, {} unparsed",
            self.name(),
            outcome.plan.len(),
            outcome.unchanged.len(),
            outcome.unparsed.len()
        );
        Ok(outcome)
    }
}

/// Shared tail of every strategy.
fn finish(
    candidates: Vec<(String, std::result::Result<String, RenderError>)>,
    unparsed: Vec<String>,
    siblings: &[FileEntry],
) -> Result<PlanOutcome> {
    let mut failures = Vec::new();
    let mut entries = Vec::new();
    let mut unchanged = Vec::new();

    for (from, rendered) in candidates {
        match rendered {
            Ok(to) if to == from => unchanged.push(from),
            Ok(to) => entries.push(RenameEntry { from, to }),
            Err(reason) => failures.push(RenderFailure { file: from, reason }),
        }
    }

    if !failures.is_empty() {
        return Err(AppError::Render(failures));
    }

    Ok(PlanOutcome {
        plan: RenamePlan::validate(entries, siblings)?,
        unparsed,
        unchanged,
    })
}

/// Sanitize a typed name and add the original extension unless the user
/// typed a video extension themselves.
fn manual_name(original: &str, typed: &str) -> std::result::Result<String, RenderError> {
    let mut name = sanitize_filename(typed);
    if name.is_empty() {
        return Err(RenderError::Empty);
    }
    let (_, extension) = split_extension(original);
    if !extension.is_empty() && !is_video_file(&name) {
        name.push_str(extension);
    }
    Ok(name)
}

/// Rewrite `\1`-style group references into the `${1}` form the regex crate
/// expects. `\\` becomes a single backslash.
fn convert_backrefs(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(d);
                    chars.next();
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }

    out
}
