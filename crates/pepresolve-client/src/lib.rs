//! The network and filesystem layer of the resolution engine: fetching simple-index pages,
//! caching downloaded wheel archives, and extracting `dist-info/METADATA` from them.

pub use archive::{Archive, WheelArchive};
pub use cache::ArchiveCache;
pub use error::Error;
pub use index::{ArchiveLink, IndexClient};
pub use metadata::WheelMetadata;

mod archive;
mod cache;
mod error;
mod index;
mod metadata;
