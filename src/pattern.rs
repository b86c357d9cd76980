//! Naming patterns: parsing and rendering.
//!
//! A pattern such as `{title}.S{season}E{episode:02d}` is parsed once into a
//! sequence of [`Token`]s. Rendering substitutes the fields, sanitizes the
//! result for the filesystem and re-attaches the original extension.
//!
//! Grammar:
//!
//! - `{title}`, `{season}`, `{episode}` reference a field.
//! - `{season:0Nd}` / `{episode:0Nd}` zero-pad to at least `N` digits
//!   (`N` at most 255). Without a width both numbers are padded to 2.
//! - `{{` and `}}` are literal braces.
//! - Any other `{name}` is kept verbatim.

use crate::parser::is_video_file;
use std::fmt;

/// The pattern used when the user does not choose one.
pub const DEFAULT_PATTERN: &str = "{title}.S{season}E{episode:02d}";

/// Built-in patterns offered by the interactive menus.
pub const PRESET_PATTERNS: [&str; 2] = [DEFAULT_PATTERN, "Season_{season}_Episode_{episode:02d}_{title}"];

const DEFAULT_WIDTH: usize = 2;

/// Widest padding a placeholder may ask for.
const MAX_WIDTH: usize = 255;

/// A field a pattern can reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Title,
    Season,
    Episode,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Field::Title),
            "season" => Some(Field::Season),
            "episode" => Some(Field::Episode),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Season => "season",
            Field::Episode => "episode",
        }
    }
}

/// One piece of a parsed pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Field { field: Field, width: Option<usize> },
}

/// A malformed pattern, with the byte offset of the problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternError {
    Unclosed { offset: usize },
    StrayBrace { offset: usize },
    BadSpec { offset: usize, field: &'static str, spec: String },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Unclosed { offset } => write!(f, "unclosed '{{' at position {}", offset),
            PatternError::StrayBrace { offset } => {
                write!(f, "unmatched '}}' at position {} (use '}}}}' for a literal brace)", offset)
            }
            PatternError::BadSpec { offset, field, spec } => write!(
                f,
                "invalid format '{}' for {{{}}} at position {} (expected e.g. {{{}:02d}})",
                spec, field, offset, field
            ),
        }
    }
}

impl std::error::Error for PatternError {}

/// Values substituted into a pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EpisodeFields {
    pub title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Why a single file could not be rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// The pattern references a field the file has no value for.
    MissingField(&'static str),
    /// Nothing is left after substitution and sanitizing.
    Empty,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::MissingField(name) => write!(f, "no value for {{{}}}", name),
            RenderError::Empty => write!(f, "the new name would be empty"),
        }
    }
}

/// A render error tied to the file it happened on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderFailure {
    pub file: String,
    pub reason: RenderError,
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.reason)
    }
}

/// A parsed naming pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamingPattern {
    source: String,
    tokens: Vec<Token>,
}

impl NamingPattern {
    /// Parse pattern text into tokens.
    ///
    /// # Examples
    ///
    /// ```
    /// use episode_renamer::pattern::{NamingPattern, Token, Field};
    ///
    /// let p = NamingPattern::parse("E{episode:03d}").unwrap();
    /// assert_eq!(p.tokens(), &[
    ///     Token::Literal("E".to_string()),
    ///     Token::Field { field: Field::Episode, width: Some(3) },
    /// ]);
    /// assert!(NamingPattern::parse("{title").is_err());
    /// ```
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let rest = &source[offset + 1..];
                    let close = rest.find('}').ok_or(PatternError::Unclosed { offset })?;
                    let inner = &rest[..close];

                    // Skip the placeholder body and its closing brace.
                    while let Some((i, _)) = chars.peek() {
                        if *i > offset + close + 1 {
                            break;
                        }
                        chars.next();
                    }

                    let (name, spec) = match inner.split_once(':') {
                        Some((name, spec)) => (name, Some(spec)),
                        None => (inner, None),
                    };

                    match Field::from_name(name) {
                        Some(field) => {
                            let width = parse_spec(field, spec, offset)?;
                            if !literal.is_empty() {
                                tokens.push(Token::Literal(std::mem::take(&mut literal)));
                            }
                            tokens.push(Token::Field { field, width });
                        }
                        None => {
                            literal.push('{');
                            literal.push_str(inner);
                            literal.push('}');
                        }
                    }
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(PatternError::StrayBrace { offset });
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            tokens,
        })
    }

    /// The text the pattern was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Whether the pattern references `field` anywhere.
    pub fn references(&self, field: Field) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, Token::Field { field: f, .. } if *f == field))
    }

    /// Render a filename from `fields`, appending `extension` unless the
    /// rendered text already ends in a video extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use episode_renamer::pattern::{EpisodeFields, NamingPattern};
    ///
    /// let p = NamingPattern::parse("{title} - S{season}E{episode:03d}").unwrap();
    /// let fields = EpisodeFields {
    ///     title: Some("Show".to_string()),
    ///     season: None,
    ///     episode: Some(7),
    /// };
    /// assert_eq!(p.render(&fields, ".mkv").unwrap(), "Show - S01E007.mkv");
    /// ```
    pub fn render(&self, fields: &EpisodeFields, extension: &str) -> Result<String, RenderError> {
        let mut out = String::new();

        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Field { field: Field::Title, .. } => {
                    let title = fields
                        .title
                        .as_deref()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .ok_or(RenderError::MissingField(Field::Title.name()))?;
                    out.push_str(title);
                }
                Token::Field { field: Field::Season, width } => {
                    let season = fields.season.unwrap_or(1);
                    out.push_str(&pad(season, *width));
                }
                Token::Field { field: Field::Episode, width } => {
                    let episode = fields
                        .episode
                        .ok_or(RenderError::MissingField(Field::Episode.name()))?;
                    out.push_str(&pad(episode, *width));
                }
            }
        }

        let mut name = sanitize_filename(&out);
        if name.is_empty() {
            return Err(RenderError::Empty);
        }
        if !extension.is_empty() && !is_video_file(&name) {
            name.push_str(extension);
        }
        Ok(name)
    }
}

impl fmt::Display for NamingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Default for NamingPattern {
    fn default() -> Self {
        Self {
            source: DEFAULT_PATTERN.to_string(),
            tokens: vec![
                Token::Field { field: Field::Title, width: None },
                Token::Literal(".S".to_string()),
                Token::Field { field: Field::Season, width: None },
                Token::Literal("E".to_string()),
                Token::Field { field: Field::Episode, width: Some(2) },
            ],
        }
    }
}

/// Parse the part after `:` in a placeholder. Only numeric fields accept a
/// spec, and only the zero-padded form `0N` with an optional trailing `d`.
fn parse_spec(field: Field, spec: Option<&str>, offset: usize) -> Result<Option<usize>, PatternError> {
    let Some(spec) = spec else {
        return Ok(None);
    };

    let bad = || PatternError::BadSpec {
        offset,
        field: field.name(),
        spec: spec.to_string(),
    };

    if field == Field::Title {
        return Err(bad());
    }

    let digits = spec.strip_suffix('d').unwrap_or(spec);
    let width = digits.strip_prefix('0').ok_or_else(bad)?;
    if width.is_empty() {
        // "{episode:0d}" means no padding.
        return Ok(Some(0));
    }
    if !width.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    match width.parse::<usize>() {
        Ok(n) if n <= MAX_WIDTH => Ok(Some(n)),
        _ => Err(bad()),
    }
}

fn pad(value: u32, width: Option<usize>) -> String {
    format!("{:0width$}", value, width = width.unwrap_or(DEFAULT_WIDTH))
}

/// Replace characters that are reserved on common filesystems with `_` and
/// trim surrounding whitespace and trailing dots.
///
/// # Examples
///
/// ```
/// use episode_renamer::pattern::sanitize_filename;
///
/// assert_eq!(sanitize_filename("What? Now: Part 1/2 "), "What_ Now_ Part 1_2");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    replaced
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string()
}
