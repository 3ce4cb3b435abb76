use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::instrument;

use pep508_rs::Requirement;
use pepresolve_client::Error as ClientError;

use crate::candidate::Candidate;
use crate::key::DependencyKey;
use crate::provider::{Preference, Provider, RequirementInformation};

/// The resolver gives up after this many rounds rather than loop forever on a pathological
/// dependency graph.
const ROUND_CAP: usize = 256;

/// A terminal failure of the resolution process.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No assignment of candidates satisfies every criterion, even after exhausting every
    /// candidate at every backtrack point. Carries the identity that ran out of candidates and
    /// every requirement recorded against it, for diagnostics.
    #[error("no compatible versions found for `{}`", conflicting.name)]
    ResolutionImpossible {
        /// The identity that had no remaining viable candidate.
        conflicting: DependencyKey,
        /// Every requirement recorded against that identity, for diagnostics.
        requirements: Vec<RequirementInformation>,
    },
    /// The round cap was exceeded before the resolver converged.
    #[error("resolution did not converge within {rounds} rounds")]
    ResolutionTooDeep {
        /// The round cap that was hit.
        rounds: usize,
    },
    /// The provider failed to fetch or parse data needed to make progress.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// One identity's accumulated state across the resolution: every requirement recorded against
/// it, and the remaining untried candidates (already filtered and ordered by the provider).
struct Criterion {
    requirements: Vec<RequirementInformation>,
    remaining: Vec<Candidate>,
}

impl Criterion {
    fn candidate_count(&self) -> usize {
        self.remaining.len()
    }
}

/// A pinned, resolved candidate per identity, in the order they were first pinned.
pub struct Resolution {
    /// The final pin for each identity.
    pub pins: Vec<(DependencyKey, Candidate)>,
    /// Every `(parent, child)` edge discovered while resolving: `parent` is `None` for a
    /// top-level requirement, `Some` for a requirement introduced by another pinned candidate.
    pub edges: Vec<(Option<DependencyKey>, DependencyKey)>,
}

/// Bookkeeping for one pin, so a later conflict can undo exactly the criteria this pin's own
/// dependencies introduced, and nothing more.
struct PinRecord {
    identifier: DependencyKey,
    /// Identities whose criterion did not exist before this pin's dependencies were added, and
    /// so must be removed entirely on backtrack.
    created_criteria: Vec<DependencyKey>,
    /// Identities whose criterion already existed, with one `RequirementInformation` appended by
    /// this pin's dependencies — popped on backtrack.
    appended_requirement_at: Vec<DependencyKey>,
}

/// The backtracking pinner: a bespoke reimplementation of `resolvelib`'s resolution loop — a
/// criteria table, a pins table, and a round counter — rather than a PubGrub-style solver.
pub struct Resolver<P: Provider> {
    provider: P,
}

impl<P: Provider> Resolver<P> {
    /// Construct a resolver around the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Resolve `root_requirements` to a pinned set of candidates.
    #[instrument(skip(self, root_requirements))]
    pub fn resolve(&self, root_requirements: Vec<Requirement>) -> Result<Resolution, ResolveError> {
        let mut criteria: FxHashMap<DependencyKey, Criterion> = FxHashMap::default();
        let mut pins: FxHashMap<DependencyKey, Candidate> = FxHashMap::default();
        let mut pin_order: Vec<DependencyKey> = Vec::new();
        let mut history: Vec<PinRecord> = Vec::new();

        for requirement in root_requirements {
            self.add_requirement(&mut criteria, requirement, None, &mut None)?;
        }

        let mut rounds = 0;
        loop {
            if rounds >= ROUND_CAP {
                return Err(ResolveError::ResolutionTooDeep { rounds: ROUND_CAP });
            }
            rounds += 1;
            tracing::debug!(round = rounds, "resolver round");

            let Some(identifier) = self.next_unresolved(&criteria, &pins) else {
                let mut edges = Vec::new();
                for key in &pin_order {
                    let criterion = criteria.get(key).expect("pinned identity has criteria");
                    let mut parents: Vec<Option<DependencyKey>> = criterion
                        .requirements
                        .iter()
                        .map(|info| info.parent.clone())
                        .collect();
                    parents.sort();
                    parents.dedup();
                    for parent in parents {
                        edges.push((parent, key.clone()));
                    }
                }
                let pins = pin_order
                    .into_iter()
                    .map(|key| {
                        let candidate = pins.remove(&key).expect("pinned identity has a pin");
                        (key, candidate)
                    })
                    .collect();
                return Ok(Resolution { pins, edges });
            };

            match self.try_pin(&identifier, &mut criteria, &mut pins, &mut pin_order)? {
                Some(record) => history.push(record),
                None => {
                    // No candidate of `identifier` can be pinned, even after trying every one of
                    // its own remaining candidates — unwind the most recent pin and retry it with
                    // its own next candidate; if that also runs dry, keep unwinding.
                    loop {
                        let Some(record) = history.pop() else {
                            let requirements = criteria
                                .get(&identifier)
                                .map(|c| c.requirements.clone())
                                .unwrap_or_default();
                            return Err(ResolveError::ResolutionImpossible {
                                conflicting: identifier,
                                requirements,
                            });
                        };
                        self.undo_pin(&record, &mut criteria, &mut pins, &mut pin_order);

                        match self.try_pin(
                            &record.identifier,
                            &mut criteria,
                            &mut pins,
                            &mut pin_order,
                        )? {
                            Some(new_record) => {
                                history.push(new_record);
                                break;
                            }
                            None => continue,
                        }
                    }
                }
            }
        }
    }

    /// Try every remaining candidate of `identifier` in turn until one both satisfies its own
    /// criterion and doesn't invalidate any already-pinned identity whose criterion its
    /// dependencies extend. Returns `None` if no candidate works.
    fn try_pin(
        &self,
        identifier: &DependencyKey,
        criteria: &mut FxHashMap<DependencyKey, Criterion>,
        pins: &mut FxHashMap<DependencyKey, Candidate>,
        pin_order: &mut Vec<DependencyKey>,
    ) -> Result<Option<PinRecord>, ResolveError> {
        loop {
            let candidate = {
                let criterion = criteria
                    .get_mut(identifier)
                    .expect("selected identity has criteria");
                self.pop_satisfying_candidate(criterion)?
            };
            let Some(candidate) = candidate else {
                return Ok(None);
            };

            let dependencies = self.provider.get_dependencies(&candidate)?;
            let mut record = PinRecord {
                identifier: identifier.clone(),
                created_criteria: Vec::new(),
                appended_requirement_at: Vec::new(),
            };
            pins.insert(identifier.clone(), candidate);
            pin_order.push(identifier.clone());
            for dependency in dependencies {
                self.add_requirement(
                    criteria,
                    dependency,
                    Some(identifier.clone()),
                    &mut Some(&mut record),
                )?;
            }

            if self.breaks_existing_pin(&record, criteria, pins) {
                self.undo_pin(&record, criteria, pins, pin_order);
                continue;
            }
            return Ok(Some(record));
        }
    }

    /// Whether pinning `record` appended a requirement onto an already-pinned identity's
    /// criterion that its existing pin no longer satisfies.
    fn breaks_existing_pin(
        &self,
        record: &PinRecord,
        criteria: &FxHashMap<DependencyKey, Criterion>,
        pins: &FxHashMap<DependencyKey, Candidate>,
    ) -> bool {
        record.appended_requirement_at.iter().any(|key| {
            let Some(pinned_candidate) = pins.get(key) else {
                return false;
            };
            let criterion = criteria.get(key).expect("appended-to identity has criteria");
            !criterion
                .requirements
                .iter()
                .all(|info| self.provider.is_satisfied_by(&info.requirement, pinned_candidate))
        })
    }

    /// Pop candidates off `criterion.remaining` until one satisfies every recorded requirement
    /// and passes the provider's last-mile viability check, or the list is exhausted.
    fn pop_satisfying_candidate(
        &self,
        criterion: &mut Criterion,
    ) -> Result<Option<Candidate>, ResolveError> {
        while let Some(candidate) = criterion.remaining.pop() {
            let satisfied = criterion
                .requirements
                .iter()
                .all(|info| self.provider.is_satisfied_by(&info.requirement, &candidate));
            if !satisfied {
                continue;
            }
            if !self.provider.is_viable(&candidate)? {
                continue;
            }
            return Ok(Some(candidate));
        }
        Ok(None)
    }

    /// Undo exactly the criteria mutations `record` made when it was originally pinned.
    fn undo_pin(
        &self,
        record: &PinRecord,
        criteria: &mut FxHashMap<DependencyKey, Criterion>,
        pins: &mut FxHashMap<DependencyKey, Candidate>,
        pin_order: &mut Vec<DependencyKey>,
    ) {
        pins.remove(&record.identifier);
        pin_order.retain(|key| key != &record.identifier);
        for key in &record.created_criteria {
            criteria.remove(key);
        }
        for key in &record.appended_requirement_at {
            if let Some(criterion) = criteria.get_mut(key) {
                criterion.requirements.pop();
            }
        }
    }

    fn add_requirement(
        &self,
        criteria: &mut FxHashMap<DependencyKey, Criterion>,
        requirement: Requirement,
        parent: Option<DependencyKey>,
        record: &mut Option<&mut PinRecord>,
    ) -> Result<(), ResolveError> {
        let identifier = self.provider.identify_requirement(&requirement);
        let info = RequirementInformation { requirement, parent };

        match criteria.get_mut(&identifier) {
            Some(criterion) => {
                criterion.requirements.push(info);
                if let Some(record) = record {
                    record.appended_requirement_at.push(identifier);
                }
            }
            None => {
                let matches = self.provider.find_matches(&identifier, &[info.clone()], &[])?;
                criteria.insert(
                    identifier.clone(),
                    Criterion {
                        requirements: vec![info],
                        remaining: matches,
                    },
                );
                if let Some(record) = record {
                    record.created_criteria.push(identifier);
                }
            }
        }
        Ok(())
    }

    /// Pick the next identity to pin: any identity with recorded criteria but no pin yet,
    /// preferring the lowest `get_preference` value (candidate-count-ascending).
    fn next_unresolved(
        &self,
        criteria: &FxHashMap<DependencyKey, Criterion>,
        pins: &FxHashMap<DependencyKey, Candidate>,
    ) -> Option<DependencyKey> {
        criteria
            .iter()
            .filter(|(key, _)| !pins.contains_key(*key))
            .min_by_key(|(key, criterion)| {
                self.provider
                    .get_preference(key, &criterion.requirements, criterion.candidate_count())
            })
            .map(|(key, _)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::str::FromStr;

    use pep508_rs::ExtraName;
    use pepresolve_client::{Archive, ArchiveLink};
    use url::Url;

    use super::*;

    /// One buildable version of a package in a [`MockProvider`]'s catalog, most-preferred first
    /// within its package's list.
    struct MockCandidateSpec {
        version: &'static str,
        dependencies: &'static [&'static str],
    }

    /// A [`Provider`] backed entirely by an in-memory catalog, for scenario tests that would
    /// otherwise need a live simple index.
    struct MockProvider {
        catalog: HashMap<&'static str, Vec<MockCandidateSpec>>,
    }

    fn make_candidate(name: &str, version: &str, extras: Vec<ExtraName>) -> Candidate {
        let filename = format!("{name}-{version}-py3-none-any.whl");
        let link = ArchiveLink {
            url: Url::parse(&format!("https://example.org/{filename}")).unwrap(),
            filename,
            requires_python: None,
        };
        let archive = Archive::from_link(link).expect("synthetic wheel filename is well-formed");
        Candidate::new(archive, extras)
    }

    impl Provider for MockProvider {
        fn identify_requirement(&self, requirement: &Requirement) -> DependencyKey {
            DependencyKey::new(requirement.name.clone(), requirement.extras.clone())
        }

        fn is_satisfied_by(&self, requirement: &Requirement, candidate: &Candidate) -> bool {
            requirement.name == candidate.name && requirement.specifier.contains(&candidate.version)
        }

        fn get_dependencies(&self, candidate: &Candidate) -> Result<Vec<Requirement>, ClientError> {
            let specs = self
                .catalog
                .get(candidate.name.as_ref())
                .expect("get_dependencies called for a known package");
            let spec = specs
                .iter()
                .find(|spec| spec.version == candidate.version.to_string())
                .expect("get_dependencies called for a known candidate version");

            let mut out = Vec::new();
            if !candidate.extras.is_empty() {
                out.push(
                    Requirement::from_str(&format!("{}=={}", candidate.name, candidate.version))
                        .expect("name==version always parses"),
                );
            }
            for raw in spec.dependencies {
                out.push(Requirement::from_str(raw).expect("synthetic requirement is well-formed"));
            }
            Ok(out)
        }

        fn find_matches(
            &self,
            identifier: &DependencyKey,
            requirements: &[RequirementInformation],
            incompatibilities: &[Candidate],
        ) -> Result<Vec<Candidate>, ClientError> {
            let Some(specs) = self.catalog.get(identifier.name.as_ref()) else {
                return Ok(Vec::new());
            };
            let mut matches = Vec::new();
            for spec in specs {
                let candidate =
                    make_candidate(identifier.name.as_ref(), spec.version, identifier.extras.clone());
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
            // Mirrors `IndexProvider`: catalog order is most-preferred-first, but the resolver
            // tries candidates via `Vec::pop`, so reverse before returning.
            matches.reverse();
            Ok(matches)
        }

        fn get_preference(
            &self,
            _identifier: &DependencyKey,
            _requirements: &[RequirementInformation],
            candidate_count: usize,
        ) -> Preference {
            candidate_count
        }
    }

    fn find_pin<'a>(resolution: &'a Resolution, name: &str) -> &'a Candidate {
        resolution
            .pins
            .iter()
            .find(|(key, _)| key.name.as_ref() == name && key.extras.is_empty())
            .map(|(_, candidate)| candidate)
            .unwrap_or_else(|| panic!("no pin for `{name}`"))
    }

    #[test]
    fn single_leaf_resolves_to_highest_matching_version() {
        let provider = MockProvider {
            catalog: HashMap::from([(
                "foo",
                vec![
                    MockCandidateSpec { version: "2.0", dependencies: &[] },
                    MockCandidateSpec { version: "1.0", dependencies: &[] },
                ],
            )]),
        };
        let resolver = Resolver::new(provider);

        let resolution = resolver
            .resolve(vec![Requirement::from_str("foo>=1.0").unwrap()])
            .unwrap();

        assert_eq!(resolution.pins.len(), 1);
        assert_eq!(find_pin(&resolution, "foo").version.to_string(), "2.0");
        assert_eq!(resolution.edges, vec![(None, DependencyKey::base(find_pin(&resolution, "foo").name.clone()))]);
    }

    #[test]
    fn transitive_dependency_is_pinned_and_recorded_as_an_edge() {
        let provider = MockProvider {
            catalog: HashMap::from([
                (
                    "app",
                    vec![MockCandidateSpec { version: "1.0", dependencies: &["foo==1.0"] }],
                ),
                (
                    "foo",
                    vec![MockCandidateSpec { version: "1.0", dependencies: &[] }],
                ),
            ]),
        };
        let resolver = Resolver::new(provider);

        let resolution = resolver
            .resolve(vec![Requirement::from_str("app").unwrap()])
            .unwrap();

        assert_eq!(resolution.pins.len(), 2);
        let app_key = DependencyKey::base(find_pin(&resolution, "app").name.clone());
        let foo_key = DependencyKey::base(find_pin(&resolution, "foo").name.clone());
        assert!(resolution.edges.contains(&(None, app_key.clone())));
        assert!(resolution.edges.contains(&(Some(app_key), foo_key)));
    }

    #[test]
    fn extras_pull_in_a_self_dependency_and_the_extras_own_requirements() {
        // The `dev` extra's own requirement is baked directly into `foo`'s dependency list here,
        // mirroring what `Candidate::dependencies` would read from a real wheel's marker-gated
        // `Requires-Dist` entries once `extras` is non-empty.
        let provider = MockProvider {
            catalog: HashMap::from([
                (
                    "foo",
                    vec![MockCandidateSpec {
                        version: "1.0",
                        dependencies: &["extradep>=1.0"],
                    }],
                ),
                (
                    "extradep",
                    vec![MockCandidateSpec { version: "1.0", dependencies: &[] }],
                ),
            ]),
        };
        let resolver = Resolver::new(provider);

        let resolution = resolver
            .resolve(vec![Requirement::from_str("foo[dev]").unwrap()])
            .unwrap();

        assert_eq!(resolution.pins.len(), 3);
        assert!(resolution
            .pins
            .iter()
            .any(|(key, _)| key.name.as_ref() == "foo" && key.extras.is_empty()));
        assert!(resolution
            .pins
            .iter()
            .any(|(key, _)| key.name.as_ref() == "foo" && !key.extras.is_empty()));
        assert!(find_pin(&resolution, "extradep").version.to_string() == "1.0");
    }

    #[test]
    fn conflicting_transitive_constraint_backtracks_to_a_compatible_version() {
        // `app` depends on both `foo` and `bar`. `foo`'s preferred version 2.0 wants `baz>=2.0`,
        // but `bar` unconditionally wants `baz<2.0` and only `baz==1.0` exists. The resolver must
        // undo its first pin of `foo` and retry with `foo==1.0`, which wants `baz<2.0`.
        let provider = MockProvider {
            catalog: HashMap::from([
                (
                    "app",
                    vec![MockCandidateSpec {
                        version: "1.0",
                        dependencies: &["foo", "bar"],
                    }],
                ),
                (
                    "foo",
                    vec![
                        MockCandidateSpec { version: "2.0", dependencies: &["baz>=2.0"] },
                        MockCandidateSpec { version: "1.0", dependencies: &["baz<2.0"] },
                    ],
                ),
                (
                    "bar",
                    vec![MockCandidateSpec { version: "1.0", dependencies: &["baz<2.0"] }],
                ),
                (
                    "baz",
                    vec![MockCandidateSpec { version: "1.0", dependencies: &[] }],
                ),
            ]),
        };
        let resolver = Resolver::new(provider);

        let resolution = resolver
            .resolve(vec![Requirement::from_str("app").unwrap()])
            .unwrap();

        assert_eq!(find_pin(&resolution, "foo").version.to_string(), "1.0");
        assert_eq!(find_pin(&resolution, "baz").version.to_string(), "1.0");
    }

    #[test]
    fn disjoint_root_requirements_are_reported_as_impossible() {
        let provider = MockProvider {
            catalog: HashMap::from([(
                "foo",
                vec![
                    MockCandidateSpec { version: "2.0", dependencies: &[] },
                    MockCandidateSpec { version: "1.0", dependencies: &[] },
                ],
            )]),
        };
        let resolver = Resolver::new(provider);

        let err = resolver
            .resolve(vec![
                Requirement::from_str("foo==1.0").unwrap(),
                Requirement::from_str("foo==2.0").unwrap(),
            ])
            .unwrap_err();

        assert!(matches!(err, ResolveError::ResolutionImpossible { .. }));
    }
}
