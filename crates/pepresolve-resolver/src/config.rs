use pep440_rs::Version;
use pep508_rs::{ExtraName, MarkerEnvironment, Requirement};
use platform_tags::Tag;
use url::Url;

use crate::ordering::Ordering;

const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple/";

/// The single entry point into the resolution engine: every input a resolution needs, gathered
/// in one place, mirroring the teacher's own `Manifest`/`Resolver::new` shape.
pub struct EngineConfig {
    /// The top-level requirements to resolve.
    pub requirements: Vec<Requirement>,
    /// Extras requested of the top-level requirements themselves (as opposed to extras named
    /// inside a requirement string, e.g. `foo[bar]`).
    pub extras: Vec<ExtraName>,
    /// Where downloaded wheel archives are cached. `None` uses a process-local temporary
    /// directory that is cleaned up when the resolution finishes.
    pub cache_directory: Option<std::path::PathBuf>,
    /// The interpreter version candidates are filtered against via `Requires-Python`.
    pub python_version: Version,
    /// The root URL of the PEP 503 simple index.
    pub package_index_url: Url,
    /// The PEP 425 tags the target interpreter/platform supports, most-preferred-first.
    pub supported_tags: Vec<Tag>,
    /// Which end of the version range to try first.
    pub ordering: Ordering,
    /// The marker environment requirements are evaluated against.
    pub marker_env: MarkerEnvironment,
}

impl EngineConfig {
    /// Resolve the effective cache directory: the configured path, an environment override via
    /// `PEPRESOLVE_CACHE_DIR`, or `None` for a temporary, engine-owned cache.
    pub fn effective_cache_directory(&self) -> Option<std::path::PathBuf> {
        if let Ok(from_env) = std::env::var("PEPRESOLVE_CACHE_DIR") {
            return Some(std::path::PathBuf::from(from_env));
        }
        self.cache_directory.clone()
    }

    /// Resolve the effective index URL: the configured URL, overridden by `PEPRESOLVE_INDEX_URL`
    /// if set.
    pub fn effective_index_url(&self) -> Url {
        if let Ok(from_env) = std::env::var("PEPRESOLVE_INDEX_URL") {
            if let Ok(url) = Url::parse(&from_env) {
                return url;
            }
        }
        self.package_index_url.clone()
    }

    /// A marker environment with every field defaulted from the current interpreter/platform,
    /// for callers that don't need to control it precisely (e.g. a quick CLI invocation with no
    /// `--python-version` override beyond what the host provides).
    pub fn host_marker_environment(python_version: &Version) -> MarkerEnvironment {
        MarkerEnvironment {
            python_version: format!(
                "{}.{}",
                python_version.release().first().copied().unwrap_or(3),
                python_version.release().get(1).copied().unwrap_or(0)
            ),
            python_full_version: python_version.to_string(),
            os_name: if cfg!(windows) { "nt" } else { "posix" }.to_string(),
            sys_platform: std::env::consts::OS.to_string(),
            platform_machine: std::env::consts::ARCH.to_string(),
            platform_python_implementation: "CPython".to_string(),
            platform_release: String::new(),
            platform_system: std::env::consts::OS.to_string(),
            platform_version: String::new(),
            implementation_name: "cpython".to_string(),
            implementation_version: python_version.to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let python_version = Version::new([3, 12]);
        Self {
            requirements: Vec::new(),
            extras: Vec::new(),
            cache_directory: None,
            marker_env: Self::host_marker_environment(&python_version),
            python_version,
            package_index_url: Url::parse(DEFAULT_INDEX_URL).expect("valid default index URL"),
            supported_tags: Vec::new(),
            ordering: Ordering::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_index_url_is_pypi() {
        let config = EngineConfig::default();
        assert_eq!(config.effective_index_url().as_str(), DEFAULT_INDEX_URL);
    }
}
