use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::instrument;

use crate::error::Error;
use crate::index::{ArchiveLink, IndexClient};

/// A flat-file cache of downloaded wheel archives, keyed by wheel filename (collision-free by
/// PEP 427 construction — no two distinct wheels share a filename).
///
/// An engine-owned cache (built with [`ArchiveCache::temporary`]) is removed when the last
/// handle to it is dropped; a caller-supplied one (built with [`ArchiveCache::persistent`]) is
/// left on disk for reuse across runs.
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    root: PathBuf,
    _temp_dir_drop: Option<Arc<TempDir>>,
}

impl ArchiveCache {
    /// A persistent cache directory at `root`, created if it doesn't already exist.
    pub fn persistent(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            _temp_dir_drop: None,
        })
    }

    /// A cache directory that is removed once every clone of this `ArchiveCache` is dropped.
    pub fn temporary() -> io::Result<Self> {
        let temp_dir = TempDir::new()?;
        Ok(Self {
            root: temp_dir.path().to_path_buf(),
            _temp_dir_drop: Some(Arc::new(temp_dir)),
        })
    }

    /// The cache's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the local path for `link`, downloading it first if it isn't already cached.
    ///
    /// Existing entries are trusted without re-validation: PEP 427 filenames are unique per
    /// distribution content, so a cache hit never needs revalidation against the index.
    #[instrument(skip(self, client))]
    pub fn ensure_downloaded(
        &self,
        client: &IndexClient,
        link: &ArchiveLink,
    ) -> Result<PathBuf, Error> {
        let dest = self.root.join(&link.filename);

        match std::fs::metadata(&dest) {
            Ok(metadata) if metadata.is_file() => return Ok(dest),
            Ok(_) => return Err(Error::CachePathOccupied(dest)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(Error::Io(dest, err)),
        }

        let response = client
            .download(&link.url)
            .map_err(|err| Error::NetworkIo(link.url.to_string(), err))?;

        // Stream into a temp file in the same directory, then atomically rename into place —
        // a concurrent reader of the cache never observes a half-written file.
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|err| Error::Io(self.root.clone(), err))?;
        {
            use std::io::Write;
            let bytes = response
                .bytes()
                .map_err(|err| Error::NetworkIo(link.url.to_string(), err))?;
            temp.write_all(&bytes)
                .map_err(|err| Error::Io(dest.clone(), err))?;
        }
        temp.persist(&dest)
            .map_err(|err| Error::Io(dest.clone(), err.error))?;

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexClient;
    use url::Url;

    #[test]
    fn occupied_path_is_an_error() {
        let cache = ArchiveCache::temporary().unwrap();
        let dest = cache.root().join("foo-1.0-py3-none-any.whl");
        std::fs::create_dir(&dest).unwrap();

        let client = IndexClient::new(Url::parse("https://example.org/simple/").unwrap());
        let link = ArchiveLink {
            url: Url::parse("https://example.org/files/foo-1.0-py3-none-any.whl").unwrap(),
            filename: "foo-1.0-py3-none-any.whl".to_string(),
            requires_python: None,
        };
        let err = cache.ensure_downloaded(&client, &link).unwrap_err();
        assert!(matches!(err, Error::CachePathOccupied(_)));
    }

    #[test]
    fn existing_file_is_reused_without_a_network_call() {
        let cache = ArchiveCache::temporary().unwrap();
        let dest = cache.root().join("foo-1.0-py3-none-any.whl");
        std::fs::write(&dest, b"not a real wheel").unwrap();

        let client = IndexClient::new(Url::parse("https://example.invalid/simple/").unwrap());
        let link = ArchiveLink {
            url: Url::parse("https://example.invalid/files/foo-1.0-py3-none-any.whl").unwrap(),
            filename: "foo-1.0-py3-none-any.whl".to_string(),
            requires_python: None,
        };
        let path = cache.ensure_downloaded(&client, &link).unwrap();
        assert_eq!(path, dest);
    }

    #[test]
    fn temporary_cache_is_removed_on_drop() {
        let cache = ArchiveCache::temporary().unwrap();
        let root = cache.root().to_path_buf();
        assert!(root.exists());
        drop(cache);
        assert!(!root.exists());
    }
}
