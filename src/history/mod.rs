pub mod extract;
pub mod language;
pub mod parse;

pub use extract::{HistoryExtractor, HistoryStream, RawBlocks, RawCommit};
pub use language::{language_for_path, UNKNOWN_LANGUAGE};
pub use parse::{directory_key, normalize_numstat_path, parse_commit, ROOT_DIRECTORY};

/// Marks the first line of every commit block in the `git log` stream.
pub const HEADER_MARKER: &str = "@@@";
/// Separates header fields; names and subjects may contain tabs but not this.
pub const FIELD_SEPARATOR: char = '\u{1f}';
/// sha, parents, author name, author email, author time (unix), subject.
pub const LOG_FORMAT: &str = "@@@%H%x1f%P%x1f%an%x1f%ae%x1f%at%x1f%s";
