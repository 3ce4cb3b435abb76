use std::sync::OnceLock;

use distribution_filename::WheelFilename;
use pep440_rs::Version;
use pep508_rs::PackageName;
use platform_tags::Tag;

use crate::cache::ArchiveCache;
use crate::error::Error;
use crate::index::{ArchiveLink, IndexClient};
use crate::metadata::{read_wheel_metadata, WheelMetadata};

/// A lazy handle to a remote distribution archive. Only one variant exists today — room is left
/// for a future source-distribution arm, which this engine does not build.
#[derive(Debug)]
pub enum Archive {
    /// A wheel file, identified by its decoded filename.
    Wheel(WheelArchive),
}

impl Archive {
    /// Construct an archive from an index link, parsing its filename eagerly (cheap, no I/O).
    pub fn from_link(link: ArchiveLink) -> Result<Self, distribution_filename::WheelFilenameError> {
        let filename = link.filename.parse::<WheelFilename>()?;
        Ok(Self::Wheel(WheelArchive {
            link,
            filename,
            cached_path: OnceLock::new(),
            metadata: OnceLock::new(),
        }))
    }

    /// The distribution name.
    pub fn name(&self) -> &PackageName {
        match self {
            Self::Wheel(wheel) => &wheel.filename.name,
        }
    }

    /// The distribution version.
    pub fn version(&self) -> &Version {
        match self {
            Self::Wheel(wheel) => &wheel.filename.version,
        }
    }

    /// The PEP 425 compatibility tags this archive satisfies, parsed from its filename.
    pub fn tags(&self) -> Vec<Tag> {
        match self {
            Self::Wheel(wheel) => wheel.filename.compatible_tags(),
        }
    }

    /// Fetch (downloading on first access) and parse this archive's metadata. The result is
    /// memoized for the lifetime of the `Archive`.
    pub fn metadata(
        &self,
        client: &IndexClient,
        cache: &ArchiveCache,
    ) -> Result<&WheelMetadata, Error> {
        match self {
            Self::Wheel(wheel) => wheel.metadata(client, cache),
        }
    }
}

/// The wheel-specific archive handle, with its decoded filename available immediately and its
/// downloaded path / parsed metadata populated lazily on first access.
#[derive(Debug)]
pub struct WheelArchive {
    /// The link this archive was discovered at.
    pub link: ArchiveLink,
    /// The filename, decoded eagerly since it requires no I/O.
    pub filename: WheelFilename,
    cached_path: OnceLock<std::path::PathBuf>,
    metadata: OnceLock<WheelMetadata>,
}

impl WheelArchive {
    fn metadata(&self, client: &IndexClient, cache: &ArchiveCache) -> Result<&WheelMetadata, Error> {
        if let Some(metadata) = self.metadata.get() {
            return Ok(metadata);
        }
        let path = if let Some(path) = self.cached_path.get() {
            path.clone()
        } else {
            let path = cache.ensure_downloaded(client, &self.link)?;
            let _ = self.cached_path.set(path.clone());
            path
        };
        let metadata = read_wheel_metadata(
            &path,
            &self.filename.name.to_string(),
            &self.filename.version.to_string(),
        )?;
        Ok(self.metadata.get_or_init(|| metadata))
    }
}
