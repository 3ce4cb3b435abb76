use pep440_rs::VersionSpecifiers;
use pep508_rs::{MarkerEnvironment, PackageName, Requirement};
use pepresolve_client::{ArchiveCache, Error as ClientError, IndexClient};
use platform_tags::Tag;
use tracing::instrument;

use crate::candidate::Candidate;
use crate::key::DependencyKey;
use crate::ordering::Ordering;

/// One requirement as it arrived at a given identity, together with the candidate (if any) whose
/// dependency derivation produced it. `parent` is `None` for a top-level, user-supplied
/// requirement.
#[derive(Debug, Clone)]
pub struct RequirementInformation {
    /// The requirement itself.
    pub requirement: Requirement,
    /// The identity of the candidate that introduced this requirement, if not top-level.
    pub parent: Option<DependencyKey>,
}

/// How eager the resolver should be to pin a given identity next. Lower sorts first.
pub type Preference = usize;

/// The resolver's view of the outside world: everything it needs to enumerate candidates and
/// judge satisfaction, without knowing anything about backtracking itself.
///
/// Mirrors `resolvelib`'s `AbstractProvider` contract, carried over verbatim by the distilled
/// specification's own component design.
pub trait Provider {
    /// The identity a requirement or candidate is pinned under.
    fn identify_requirement(&self, requirement: &Requirement) -> DependencyKey;

    /// Whether `candidate` satisfies `requirement`'s version and extras constraints.
    fn is_satisfied_by(&self, requirement: &Requirement, candidate: &Candidate) -> bool;

    /// This candidate's own transitive requirements.
    fn get_dependencies(&self, candidate: &Candidate) -> Result<Vec<Requirement>, ClientError>;

    /// Every candidate that could satisfy `identifier`, in the order the resolver should try
    /// them, already filtered against `requirements` and excluding anything in
    /// `incompatibilities`. Implementations may fetch lazily; the resolver only pulls as many
    /// entries as it needs.
    fn find_matches(
        &self,
        identifier: &DependencyKey,
        requirements: &[RequirementInformation],
        incompatibilities: &[Candidate],
    ) -> Result<Vec<Candidate>, ClientError>;

    /// How eager the resolver should be to resolve `identifier` next, relative to the other
    /// pending identities. Lower values are tried first. `candidate_count` is the number of
    /// matches the resolver has already narrowed this identity down to via [`Self::find_matches`].
    fn get_preference(
        &self,
        identifier: &DependencyKey,
        requirements: &[RequirementInformation],
        candidate_count: usize,
    ) -> Preference;

    /// A last check run only on the one candidate the resolver is actually about to try pinning —
    /// never on the rest of a criterion's remaining candidates. Lets a provider defer an
    /// expensive, candidate-specific check (e.g. a metadata fetch) until the resolver has
    /// committed to trying that exact candidate.
    fn is_viable(&self, _candidate: &Candidate) -> Result<bool, ClientError> {
        Ok(true)
    }
}

/// The concrete [`Provider`] backing real resolutions: a simple-index client plus an archive
/// cache, filtered by interpreter version and platform tags.
pub struct IndexProvider {
    client: IndexClient,
    cache: ArchiveCache,
    python_version: pep440_rs::Version,
    supported_tags: Vec<Tag>,
    marker_env: MarkerEnvironment,
    ordering: Ordering,
}

impl IndexProvider {
    /// Construct a provider. `supported_tags` is consumed eagerly here (the resolver itself may
    /// re-derive a fresh lazy iterator per candidate, but the provider needs the full set to sort
    /// and filter matches).
    pub fn new(
        client: IndexClient,
        cache: ArchiveCache,
        python_version: pep440_rs::Version,
        supported_tags: Vec<Tag>,
        marker_env: MarkerEnvironment,
        ordering: Ordering,
    ) -> Self {
        Self {
            client,
            cache,
            python_version,
            supported_tags,
            marker_env,
            ordering,
        }
    }

    fn satisfies_requires_python(&self, requires_python: &Option<VersionSpecifiers>) -> bool {
        match requires_python {
            None => true,
            Some(specifiers) => specifiers.contains(&self.python_version),
        }
    }

    /// Fetch every wheel candidate for `name`/`extras`, filtered by `Requires-Python` and
    /// platform-tag compatibility, sorted per the active ordering policy.
    #[instrument(skip(self))]
    fn candidates_for(
        &self,
        name: &PackageName,
        extras: Vec<pep508_rs::ExtraName>,
    ) -> Result<Vec<Candidate>, ClientError> {
        let links = self.client.fetch_project(name.as_ref())?;

        let mut candidates = Vec::new();
        for link in links {
            if !self.satisfies_requires_python(&link.requires_python) {
                continue;
            }
            let archive = match pepresolve_client::Archive::from_link(link) {
                Ok(archive) => archive,
                Err(_) => continue,
            };
            let wheel_tags = archive.tags();
            if !platform_tags::is_compatible(wheel_tags.iter(), self.supported_tags.iter().cloned())
            {
                continue;
            }
            candidates.push(Candidate::new(archive, extras.clone()));
        }

        let mut versions: Vec<_> = candidates.iter().map(|c| c.version.clone()).collect();
        self.ordering.sort(&mut versions);
        candidates.sort_by_key(|c| {
            versions
                .iter()
                .position(|v| v == &c.version)
                .unwrap_or(usize::MAX)
        });

        Ok(candidates)
    }
}

impl Provider for IndexProvider {
    fn identify_requirement(&self, requirement: &Requirement) -> DependencyKey {
        DependencyKey::new(requirement.name.clone(), requirement.extras.clone())
    }

    fn is_satisfied_by(&self, requirement: &Requirement, candidate: &Candidate) -> bool {
        if requirement.name != candidate.name {
            return false;
        }
        if !requirement
            .extras
            .iter()
            .all(|extra| candidate.extras.contains(extra))
        {
            return false;
        }
        requirement.specifier.contains(&candidate.version)
    }

    fn get_dependencies(&self, candidate: &Candidate) -> Result<Vec<Requirement>, ClientError> {
        candidate.dependencies(&self.client, &self.cache, &self.marker_env)
    }

    fn find_matches(
        &self,
        identifier: &DependencyKey,
        requirements: &[RequirementInformation],
        incompatibilities: &[Candidate],
    ) -> Result<Vec<Candidate>, ClientError> {
        let candidates = self.candidates_for(&identifier.name, identifier.extras.clone())?;
        let mut matches = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !requirements
                .iter()
                .all(|info| self.is_satisfied_by(&info.requirement, &candidate))
            {
                continue;
            }
            if incompatibilities
                .iter()
                .any(|incompatible| incompatible.version == candidate.version)
            {
                continue;
            }
            matches.push(candidate);
        }
        // `candidates_for` orders most-preferred-first, but the resolver tries candidates via
        // `Vec::pop`, which removes from the back — reverse so the most-preferred candidate is
        // tried first.
        matches.reverse();
        Ok(matches)
    }

    fn get_preference(
        &self,
        _identifier: &DependencyKey,
        _requirements: &[RequirementInformation],
        candidate_count: usize,
    ) -> Preference {
        // Candidate-count-ascending: identities the provider has already narrowed to the fewest
        // viable candidates are resolved first, since they are both cheapest to pin and most
        // likely to prune the search early if they turn out to be unsatisfiable.
        candidate_count
    }

    fn is_viable(&self, candidate: &Candidate) -> Result<bool, ClientError> {
        // A wheel that doesn't actually advertise a requested extra is never pinned for it. Only
        // fetched for the one candidate the resolver is about to try, not the whole match list.
        candidate.extras_are_advertised(&self.client, &self.cache)
    }
}
