use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::version::Operator;
use crate::Version;

/// Error returned when a version specifier or comma-separated specifier set fails to parse, or
/// when a specifier's operator and version are mutually inconsistent (e.g. `~=1` or `==1.*.0`).
#[derive(Debug, Error, Eq, PartialEq)]
pub enum VersionSpecifierError {
    /// The specifier did not match `<op><version>`.
    #[error("invalid version specifier: `{0}`")]
    InvalidSpecifier(String),
    /// `~=` requires at least two release segments.
    #[error("`~=` requires a version with at least two release segments, got `{0}`")]
    TildeEqualTooShort(String),
    /// A wildcard (`.*`) suffix was used with an operator that doesn't support it.
    #[error("operator `{operator}` does not allow a wildcard version, got `{version}`")]
    WildcardNotAllowed {
        /// The operator that rejected the wildcard.
        operator: Operator,
        /// The offending version string.
        version: String,
    },
    /// A non-wildcard version string failed to parse as a [`Version`].
    #[error(transparent)]
    Version(#[from] crate::version::VersionParseError),
}

/// A single PEP 440 version specifier, e.g. `>=1.2.3` or `==1.4.*`.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub struct VersionSpecifier {
    operator: Operator,
    version: Version,
}

impl VersionSpecifier {
    /// Construct a specifier directly from its parts, validating the same invariants that
    /// parsing enforces (wildcard compatibility, `~=` release-segment length).
    pub fn new(operator: Operator, version: Version) -> Result<Self, VersionSpecifierError> {
        if operator.is_star() && version.is_local() {
            return Err(VersionSpecifierError::WildcardNotAllowed {
                operator,
                version: version.to_string(),
            });
        }
        if operator == Operator::TildeEqual && version.release().len() < 2 {
            return Err(VersionSpecifierError::TildeEqualTooShort(version.to_string()));
        }
        Ok(Self { operator, version })
    }

    /// The comparison operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The right-hand-side version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether `version` satisfies this specifier.
    pub fn contains(&self, version: &Version) -> bool {
        match self.operator {
            Operator::Equal => *version == self.version,
            Operator::ExactEqual => version.to_string() == self.version.to_string(),
            Operator::NotEqual => *version != self.version,
            Operator::EqualStar => version.release_matches_prefix(self.version.release()),
            Operator::NotEqualStar => !version.release_matches_prefix(self.version.release()),
            Operator::LessThan => {
                // Pre-releases are excluded from `<` unless the bound itself is a pre-release,
                // matching PEP 440's "pre-releases are hidden by default" rule.
                *version < self.version && (self.version.any_prerelease() || !version.any_prerelease())
            }
            Operator::GreaterThan => {
                *version > self.version
                    && version.without_local() != self.version.without_local()
                    && (self.version.any_prerelease() || !version.any_prerelease())
            }
            Operator::LessThanEqual => *version <= self.version,
            Operator::GreaterThanEqual => *version >= self.version,
            Operator::TildeEqual => {
                // `~=V.N` means `>=V.N, ==V.*` where the trailing release segment is dropped
                // from the prefix.
                let mut prefix = self.version.release().to_vec();
                prefix.pop();
                *version >= self.version && version.release_matches_prefix(&prefix)
            }
        }
    }

    /// Whether this specifier's version has a pre-release or dev marker, in which case
    /// pre-release candidates should not be globally filtered out of a resolution.
    pub fn any_prerelease(&self) -> bool {
        self.version.any_prerelease()
    }
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)?;
        if self.operator.is_star() {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

impl FromStr for VersionSpecifier {
    type Err = VersionSpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let op_end = s
            .char_indices()
            .find(|(_, c)| !matches!(c, '=' | '!' | '<' | '>' | '~'))
            .map(|(i, _)| i)
            .unwrap_or(0);
        if op_end == 0 {
            return Err(VersionSpecifierError::InvalidSpecifier(s.to_string()));
        }
        let (op_str, version_str) = s.split_at(op_end);
        let operator = Operator::from_str(op_str)
            .map_err(|_| VersionSpecifierError::InvalidSpecifier(s.to_string()))?;
        let version_str = version_str.trim();

        if let Some(prefix) = version_str.strip_suffix(".*") {
            if !matches!(operator, Operator::Equal | Operator::NotEqual) {
                return Err(VersionSpecifierError::WildcardNotAllowed {
                    operator,
                    version: version_str.to_string(),
                });
            }
            let wildcard_operator = if operator == Operator::Equal {
                Operator::EqualStar
            } else {
                Operator::NotEqualStar
            };
            let version = Version::from_str(prefix)?;
            return Self::new(wildcard_operator, version);
        }

        let version = Version::from_str(version_str)?;
        Self::new(operator, version)
    }
}

/// A comma-separated set of [`VersionSpecifier`]s, e.g. `>=1.16,<2.0`. A version satisfies the
/// set only if it satisfies every member.
#[derive(Debug, Eq, PartialEq, Clone, Default, Hash)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl VersionSpecifiers {
    /// The individual specifiers making up this set.
    pub fn as_slice(&self) -> &[VersionSpecifier] {
        &self.0
    }

    /// Whether `version` satisfies every specifier in the set. An empty set is satisfied by
    /// every version.
    pub fn contains(&self, version: &Version) -> bool {
        self.0.iter().all(|specifier| specifier.contains(version))
    }

    /// Whether any specifier in the set explicitly targets a pre-release.
    pub fn any_prerelease(&self) -> bool {
        self.0.iter().any(VersionSpecifier::any_prerelease)
    }
}

impl FromStr for VersionSpecifiers {
    type Err = VersionSpecifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        let specifiers = s
            .split(',')
            .map(|part| VersionSpecifier::from_str(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(specifiers))
    }
}

impl fmt::Display for VersionSpecifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, specifier) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{specifier}")?;
        }
        Ok(())
    }
}

impl IntoIterator for VersionSpecifiers {
    type Item = VersionSpecifier;
    type IntoIter = std::vec::IntoIter<VersionSpecifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<VersionSpecifier> for VersionSpecifiers {
    fn from_iter<I: IntoIterator<Item = VersionSpecifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("==1.2.3", "1.2.3", true)]
    #[test_case("==1.2.3", "1.2.4", false)]
    #[test_case("==1.2.*", "1.2.9", true)]
    #[test_case("==1.2.*", "1.3.0", false)]
    #[test_case("!=1.2.*", "1.3.0", true)]
    #[test_case(">=1.0", "1.0", true)]
    #[test_case(">1.0", "1.0", false)]
    #[test_case(">1.0", "1.0.1", true)]
    #[test_case("<2.0", "2.0a1", false)]
    #[test_case("<2.0a1", "2.0.dev0", true)]
    #[test_case("~=2.2", "2.3", true)]
    #[test_case("~=2.2", "3.0", false)]
    #[test_case("~=2.2.post3", "2.2.post5", true)]
    fn membership(spec: &str, version: &str, expected: bool) {
        let spec = VersionSpecifier::from_str(spec).unwrap();
        let version = Version::from_str(version).unwrap();
        assert_eq!(spec.contains(&version), expected);
    }

    #[test]
    fn tilde_equal_requires_two_segments() {
        assert!(VersionSpecifier::from_str("~=2").is_err());
    }

    #[test]
    fn specifier_set_is_conjunctive() {
        let set = VersionSpecifiers::from_str(">=1.0,<2.0").unwrap();
        assert!(set.contains(&Version::from_str("1.5").unwrap()));
        assert!(!set.contains(&Version::from_str("2.0").unwrap()));
    }

    #[test]
    fn empty_set_matches_everything() {
        let set = VersionSpecifiers::from_str("").unwrap();
        assert!(set.contains(&Version::from_str("0.0.1").unwrap()));
    }
}
