//! Terminal prompts and menus for the interactive renamer.
//!
//! Reading from stdin lives in the small `prompt*` helpers; everything that
//! interprets what the user typed is a pure function so it can be tested.

use crate::error::{AppError, Result};
use crate::pattern::PRESET_PATTERNS;
use crate::strategy::PlanOutcome;
use crate::types::FileEntry;
use std::io::{self, Write};

/// Actions available while browsing a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    /// Enter the directory at this index of the listing.
    Open(usize),
    /// Go to the parent directory.
    Parent,
    /// List the directory again.
    Refresh,
    /// Rename several files at once.
    BatchRename,
    /// Rename one file or directory.
    RenameOne,
    /// Exit the application.
    Quit,
}

/// How new names are computed in a batch rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameMode {
    /// Parse season and episode from each name.
    Smart,
    /// Type every new name.
    Manual,
    /// One pattern with auto-incrementing episode numbers.
    Uniform,
    /// Regex search and replace.
    Regex,
}

/// What to do with files smart mode could not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnparsedAction {
    Skip,
    Fallback,
}

/// Print `label` and read one trimmed line from stdin.
pub fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input)?;
    if read == 0 {
        return Err(AppError::InvalidInput("end of input".to_string()));
    }
    Ok(input.trim().to_string())
}

/// Like [`prompt`], but an empty answer yields `default`.
pub fn prompt_with_default(label: &str, default: &str) -> Result<String> {
    let input = prompt(&format!("{} [{}]: ", label, default))?;
    Ok(if input.is_empty() {
        default.to_string()
    } else {
        input
    })
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(question: &str) -> Result<bool> {
    let input = prompt(&format!("{} [y/N]: ", question))?;
    Ok(is_yes(&input))
}

/// Read a password line.
///
/// The line is read as typed; the terminal is not switched to no-echo mode.
pub fn prompt_password(username: &str) -> Result<String> {
    print!("Password for {}: ", username);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Interpret input at the directory prompt. Directory numbers are 1-based.
pub fn parse_nav_action(input: &str) -> Option<NavAction> {
    match input.trim().to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(NavAction::Quit),
        ".." | "p" | "u" => Some(NavAction::Parent),
        "l" | "r" | "" => Some(NavAction::Refresh),
        "b" => Some(NavAction::BatchRename),
        "n" => Some(NavAction::RenameOne),
        other => other
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .map(|n| NavAction::Open(n - 1)),
    }
}

pub fn parse_rename_mode(input: &str) -> Option<RenameMode> {
    match input.trim().to_lowercase().as_str() {
        "1" | "s" | "smart" => Some(RenameMode::Smart),
        "2" | "m" | "manual" => Some(RenameMode::Manual),
        "3" | "u" | "uniform" => Some(RenameMode::Uniform),
        "4" | "r" | "regex" => Some(RenameMode::Regex),
        _ => None,
    }
}

/// Skip is the default for an empty answer.
pub fn parse_unparsed_action(input: &str) -> Option<UnparsedAction> {
    match input.trim().to_lowercase().as_str() {
        "" | "s" | "skip" => Some(UnparsedAction::Skip),
        "f" | "fallback" => Some(UnparsedAction::Fallback),
        _ => None,
    }
}

/// Parse a file selection such as `all`, `3` or `1,3-5` into 0-based
/// indices, in the order given and without duplicates.
///
/// # Examples
///
/// ```
/// use episode_renamer::ui::parse_selection;
///
/// assert_eq!(parse_selection("1,3-4", 5).unwrap(), vec![0, 2, 3]);
/// assert_eq!(parse_selection("all", 3).unwrap(), vec![0, 1, 2]);
/// assert!(parse_selection("6", 5).is_err());
/// ```
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AppError::InvalidInput("nothing selected".to_string()));
    }
    if matches!(input.to_lowercase().as_str(), "a" | "all" | "*") {
        return Ok((0..count).collect());
    }

    let number = |s: &str| -> Result<usize> {
        let n: usize = s
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("'{}' is not a number", s.trim())))?;
        if n == 0 || n > count {
            return Err(AppError::InvalidInput(format!(
                "{} is out of range (1-{})",
                n, count
            )));
        }
        Ok(n - 1)
    };

    let mut selected = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (number(a)?, number(b)?),
            None => {
                let n = number(part)?;
                (n, n)
            }
        };
        if start > end {
            return Err(AppError::InvalidInput(format!(
                "range '{}' runs backwards",
                part
            )));
        }
        for i in start..=end {
            if !selected.contains(&i) {
                selected.push(i);
            }
        }
    }

    if selected.is_empty() {
        return Err(AppError::InvalidInput("nothing selected".to_string()));
    }
    Ok(selected)
}

/// Resolve a pattern menu answer: a preset number, or a pattern typed in.
/// Empty input picks the first preset.
pub fn resolve_pattern_choice(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return PRESET_PATTERNS[0].to_string();
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=PRESET_PATTERNS.len()).contains(&n) => PRESET_PATTERNS[n - 1].to_string(),
        _ => input.to_string(),
    }
}

/// Numbered listing lines, 1-based.
pub fn format_listing(entries: &[FileEntry]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{:>3}. {}", i + 1, entry.to_display()))
        .collect()
}

/// Preview lines for a computed plan.
pub fn format_outcome(outcome: &PlanOutcome) -> Vec<String> {
    let mut lines: Vec<String> = outcome
        .plan
        .entries()
        .iter()
        .map(|entry| format!("  {}", entry))
        .collect();

    if !outcome.unchanged.is_empty() {
        lines.push(format!("Already named ({}):", outcome.unchanged.len()));
        lines.extend(outcome.unchanged.iter().map(|n| format!("  {}", n)));
    }
    if !outcome.unparsed.is_empty() {
        lines.push(format!("No episode number found ({}):", outcome.unparsed.len()));
        lines.extend(outcome.unparsed.iter().map(|n| format!("  {}", n)));
    }
    lines
}

pub fn print_directory(path: &str, entries: &[FileEntry]) {
    println!();
    println!("== {} ==", path);
    if entries.is_empty() {
        println!("  (empty)");
    }
    for line in format_listing(entries) {
        println!("{}", line);
    }
    println!();
    println!("[number] open directory  [..] up  [b] batch rename  [n] rename one  [r] refresh  [q] quit");
}

pub fn print_rename_modes() {
    println!("Rename mode:");
    println!("  1. Smart (detect season and episode)");
    println!("  2. Manual (type each name)");
    println!("  3. Uniform pattern (numbered in name order)");
    println!("  4. Regex search and replace");
}

pub fn print_pattern_presets() {
    println!("Naming pattern (fields: {{title}} {{season}} {{episode}}, width e.g. {{episode:02d}}):");
    for (i, preset) in PRESET_PATTERNS.iter().enumerate() {
        println!("  {}. {}", i + 1, preset);
    }
    println!("  or type your own");
}

/// Print an error the way the main loop reports it, one line per item for
/// render and collision errors.
pub fn print_error(err: &AppError) {
    match err {
        AppError::Render(failures) => {
            eprintln!("Could not build names for {} file(s):", failures.len());
            for failure in failures {
                eprintln!("  {}", failure);
            }
        }
        AppError::Collision(collisions) => {
            eprintln!("Rename aborted, {} name collision(s):", collisions.len());
            for collision in collisions {
                eprintln!("  {}", collision);
            }
        }
        other => eprintln!("Error: {}", other),
    }
}
