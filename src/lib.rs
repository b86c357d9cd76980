//! Batch renaming of TV episode files on an OpenList server.
//!
//! episode-renamer logs into an OpenList (AList-compatible) file-listing
//! service, lets you browse its directories and renames episode files in
//! bulk. New names come from one of four strategies: parsing season and
//! episode numbers out of the existing names, typing them by hand, a single
//! numbered pattern, or regex search and replace. Every plan is checked for
//! name collisions before one batch request is sent.
//!
//! # Features
//!
//! - Recognises `S01E02`, `1x02`, `Season 1 Episode 2`, `第1季第2集` and
//!   episode-only markers
//! - Naming patterns such as `{title}.S{season}E{episode:02d}`
//! - Cached login token, re-login on expiry
//!
//! # Usage
//!
//! ```bash
//! # Connect to a server and start in /tv
//! cargo run -- --server http://nas:5244 --username admin --path /tv
//!
//! # Keep the token cache in a fixed directory
//! EPISODE_PATH=~/.local/state/episode-renamer cargo run
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod parser;
pub mod pattern;
pub mod plan;
pub mod session;
pub mod strategy;
pub mod types;
pub mod ui;
