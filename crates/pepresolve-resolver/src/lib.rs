//! The backtracking resolution engine: pins one wheel candidate per `(name, extras)` identity,
//! satisfying every version specifier, environment marker, and platform-tag constraint reachable
//! from the top-level requirements.

pub use candidate::Candidate;
pub use config::EngineConfig;
pub use graph::{build_graph, Node};
pub use key::DependencyKey;
pub use ordering::Ordering;
pub use provider::{IndexProvider, Preference, Provider, RequirementInformation};
pub use resolver::{ResolveError, Resolution, Resolver};

mod candidate;
mod config;
mod graph;
mod key;
mod ordering;
mod provider;
mod resolver;

use pepresolve_client::{ArchiveCache, Error as ClientError, IndexClient};

/// Run a resolution end-to-end from an [`EngineConfig`]: construct the provider, run the
/// resolver, and return the pinned result.
pub fn resolve(config: EngineConfig) -> Result<Resolution, ResolveError> {
    let client = IndexClient::new(config.effective_index_url());
    let cache = match config.effective_cache_directory() {
        Some(dir) => ArchiveCache::persistent(dir).map_err(|err| {
            ResolveError::Client(ClientError::Io(std::path::PathBuf::from("cache"), err))
        })?,
        None => ArchiveCache::temporary().map_err(|err| {
            ResolveError::Client(ClientError::Io(std::path::PathBuf::from("cache"), err))
        })?,
    };

    let provider = IndexProvider::new(
        client,
        cache,
        config.python_version.clone(),
        config.supported_tags.clone(),
        config.marker_env.clone(),
        config.ordering,
    );

    let mut requirements = config.requirements;
    if !config.extras.is_empty() {
        for requirement in &mut requirements {
            requirement.extras.extend(config.extras.iter().cloned());
        }
    }

    // A root requirement whose marker doesn't hold in this environment is never sent into the
    // search at all — not pinned, not reported as a conflict.
    let requirements: Vec<_> = requirements
        .into_iter()
        .filter(|requirement| match &requirement.marker {
            None => true,
            Some(marker) => marker.evaluate(&config.marker_env, ""),
        })
        .collect();

    Resolver::new(provider).resolve(requirements)
}
