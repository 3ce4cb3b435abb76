use std::fmt;
use std::str::FromStr;

use pep440_rs::{VersionSpecifier, VersionSpecifiers};
use thiserror::Error;

use crate::marker::{parse_marker, MarkerParseError, MarkerTree};
use crate::name::{ExtraName, InvalidNameError, PackageName};

/// Error parsing a PEP 508 requirement string.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RequirementParseError {
    /// The distribution or an extra name was invalid.
    #[error(transparent)]
    Name(#[from] InvalidNameError),
    /// The version specifier portion was invalid.
    #[error(transparent)]
    Specifier(#[from] pep440_rs::VersionSpecifierError),
    /// The marker portion, after `;`, was invalid.
    #[error(transparent)]
    Marker(#[from] MarkerParseError),
    /// The input did not match the requirement grammar at all.
    #[error("invalid requirement `{0}`")]
    Malformed(String),
}

/// A single PEP 508 dependency specifier, e.g.
/// `requests[security,tests]>=2.8.1,<3; python_version >= "3.8"`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Requirement {
    /// The canonicalized distribution name, `requests` above.
    pub name: PackageName,
    /// The requested extras, `security` and `tests` above.
    pub extras: Vec<ExtraName>,
    /// The version specifier set, `>=2.8.1,<3` above.
    pub specifier: VersionSpecifiers,
    /// The environment marker, if any, `python_version >= "3.8"` above.
    pub marker: Option<MarkerTree>,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            f.write_str("[")?;
            for (i, extra) in self.extras.iter().enumerate() {
                if i != 0 {
                    f.write_str(",")?;
                }
                write!(f, "{extra}")?;
            }
            f.write_str("]")?;
        }
        if !self.specifier.as_slice().is_empty() {
            write!(f, "{}", self.specifier)?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

impl FromStr for Requirement {
    type Err = RequirementParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();

        let name_end = s
            .find(|c: char| !is_name_char(c))
            .unwrap_or(s.len());
        if name_end == 0 {
            return Err(RequirementParseError::Malformed(input.to_string()));
        }
        let name = PackageName::new(&s[..name_end])?;
        let mut rest = s[name_end..].trim_start();

        let mut extras = Vec::new();
        if let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| RequirementParseError::Malformed(input.to_string()))?;
            let (extras_str, after) = stripped.split_at(close);
            for part in extras_str.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                extras.push(ExtraName::new(part)?);
            }
            rest = after[1..].trim_start();
        }

        let (specifier_str, marker_str) = match rest.find(';') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };
        let specifier_str = specifier_str.trim();
        let specifier = if specifier_str.is_empty() {
            VersionSpecifiers::default()
        } else {
            specifier_str
                .split(',')
                .map(|part| VersionSpecifier::from_str(part.trim()))
                .collect::<Result<VersionSpecifiers, _>>()?
        };

        let marker = match marker_str {
            Some(m) if !m.trim().is_empty() => Some(parse_marker(m.trim())?),
            _ => None,
        };

        Ok(Self {
            name,
            extras,
            specifier,
            marker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn basic_requirement() {
        let req = Requirement::from_str("requests[security,tests]>=2.8.1,<3").unwrap();
        assert_eq!(req.name.to_string(), "requests");
        assert_eq!(req.extras.len(), 2);
        assert!(req.specifier.contains(&"2.9".parse().unwrap()));
        assert!(req.marker.is_none());
    }

    #[test]
    fn requirement_with_marker() {
        let req = Requirement::from_str(r#"foo>=1.2; python_version >= "3.8""#).unwrap();
        assert!(req.marker.is_some());
    }

    #[test]
    fn bare_name_has_empty_specifier() {
        let req = Requirement::from_str("foo").unwrap();
        assert!(req.specifier.as_slice().is_empty());
        assert!(req.specifier.contains(&"0.0.1".parse().unwrap()));
    }

    #[test_case("-foo")]
    #[test_case("")]
    fn rejects_invalid_name(s: &str) {
        assert!(Requirement::from_str(s).is_err());
    }

    #[test]
    fn canonicalizes_name_and_extras() {
        let req = Requirement::from_str("Foo_Bar[Baz_Qux]").unwrap();
        assert_eq!(req.name.to_string(), "foo-bar");
        assert_eq!(req.extras[0].to_string(), "baz-qux");
    }
}
