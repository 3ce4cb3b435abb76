use thiserror::Error;

/// Errors surfaced by the index client, archive cache, and wheel metadata extraction.
#[derive(Debug, Error)]
pub enum Error {
    /// An HTTP request failed, or returned a non-success status.
    #[error("network error fetching `{0}`")]
    NetworkIo(String, #[source] reqwest::Error),
    /// The simple index page could not be parsed as HTML.
    #[error("failed to parse index page for `{0}`")]
    HtmlParse(String, #[source] tl::ParseError),
    /// An `<a href>` on the index page wasn't a valid URL.
    #[error("invalid archive URL `{0}` on index page for `{1}`")]
    InvalidUrl(String, String, #[source] url::ParseError),
    /// A path in the cache directory exists but is not a regular file.
    #[error("cache path `{0}` is occupied by something other than a regular file")]
    CachePathOccupied(std::path::PathBuf),
    /// Any other I/O failure while reading or writing the cache.
    #[error("I/O error at `{0}`")]
    Io(std::path::PathBuf, #[source] std::io::Error),
    /// The wheel's zip central directory couldn't be read.
    #[error("failed to open `{0}` as a zip archive")]
    Zip(std::path::PathBuf, #[source] zip::result::ZipError),
    /// The wheel didn't contain a `{name}-{version}.dist-info/METADATA` entry.
    #[error("`{0}` has no dist-info METADATA file")]
    MetadataMissing(std::path::PathBuf),
    /// The `METADATA` file wasn't valid UTF-8 or didn't parse as an email-style header block.
    #[error("`{0}` has malformed METADATA: {1}")]
    MetadataParse(std::path::PathBuf, String),
}
