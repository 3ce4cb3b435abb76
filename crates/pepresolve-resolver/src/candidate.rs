use std::str::FromStr;

use pep440_rs::Version;
use pep508_rs::{ExtraName, MarkerEnvironment, PackageName, Requirement};
use pepresolve_client::{Archive, ArchiveCache, Error as ClientError, IndexClient};

use crate::key::DependencyKey;

/// A specific distribution archive bound to a requested extras set, as considered by one
/// resolver round.
pub struct Candidate {
    /// The canonicalized distribution name.
    pub name: PackageName,
    /// The pinned version.
    pub version: Version,
    /// The extras this candidate is being evaluated for.
    pub extras: Vec<ExtraName>,
    /// The backing archive.
    pub archive: Archive,
}

impl Candidate {
    /// Construct a candidate from a resolved archive and a requested extras set.
    pub fn new(archive: Archive, extras: Vec<ExtraName>) -> Self {
        Self {
            name: archive.name().clone(),
            version: archive.version().clone(),
            extras,
            archive,
        }
    }

    /// This candidate's identity: its name and requested extras.
    pub fn identity(&self) -> DependencyKey {
        DependencyKey::new(self.name.clone(), self.extras.clone())
    }

    /// Whether every extra this candidate was asked for is actually advertised by the wheel's
    /// metadata.
    pub fn extras_are_advertised(
        &self,
        client: &IndexClient,
        cache: &ArchiveCache,
    ) -> Result<bool, ClientError> {
        if self.extras.is_empty() {
            return Ok(true);
        }
        let metadata = self.archive.metadata(client, cache)?;
        Ok(self
            .extras
            .iter()
            .all(|extra| metadata.provides_extra.contains(extra)))
    }

    /// Derive this candidate's transitive requirements.
    ///
    /// If extras were requested, a synthetic self-dependency `name==version` (no extras) is
    /// emitted first, so the base package and every extras-variant of it converge on the same
    /// pin. Each of the wheel's own `Requires-Dist` entries is then included according to its
    /// marker: unconditional entries only apply to the base (extras-less) identity; marked
    /// entries apply once per requested extra for which the marker evaluates true with
    /// `extra=<that extra>` and false with `extra=''` (the gate that keeps a marker written for
    /// an extra from also firing unconditionally).
    pub fn dependencies(
        &self,
        client: &IndexClient,
        cache: &ArchiveCache,
        marker_env: &MarkerEnvironment,
    ) -> Result<Vec<Requirement>, ClientError> {
        let metadata = self.archive.metadata(client, cache)?;
        let mut out = Vec::new();

        if !self.extras.is_empty() {
            let self_dep = format!("{}=={}", self.name, self.version);
            out.push(Requirement::from_str(&self_dep).expect("name==version always parses"));
        }

        for requirement in &metadata.requires_dist {
            match &requirement.marker {
                None => {
                    if self.extras.is_empty() {
                        out.push(requirement.clone());
                    }
                }
                Some(marker) => {
                    let fires_for_any_requested_extra = self.extras.iter().any(|extra| {
                        marker.evaluate(marker_env, extra.as_ref())
                            && !marker.evaluate(marker_env, "")
                    });
                    if fires_for_any_requested_extra {
                        out.push(requirement.clone());
                    }
                }
            }
        }

        Ok(out)
    }
}
