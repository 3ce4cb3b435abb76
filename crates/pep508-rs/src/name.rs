use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a name contains characters outside the set PEP 508 allows for
/// distribution and extra names.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("name `{0}` contains characters not allowed by PEP 508 (letters, digits, `.`, `-`, `_` only, bounded by an alphanumeric character)")]
pub struct InvalidNameError(String);

fn validate(name: &str) -> Result<(), InvalidNameError> {
    let ok = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
        && name.as_bytes()[0].is_ascii_alphanumeric()
        && name.as_bytes()[name.len() - 1].is_ascii_alphanumeric();
    if ok {
        Ok(())
    } else {
        Err(InvalidNameError(name.to_string()))
    }
}

/// Canonicalize a distribution or extra name per PEP 503: lowercase, then collapse any run of
/// `-`, `_`, or `.` into a single `-`.
fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_was_separator {
                out.push('-');
            }
            last_was_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_was_separator = false;
        }
    }
    out
}

/// A canonicalized python distribution name, e.g. `numpy` or `scikit-learn`.
///
/// Two names that differ only in case or in their `-`/`_`/`.` separators compare and hash
/// equal, matching the identity PyPI and the index protocol use.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Construct from an already-validated, possibly non-canonical name.
    pub fn new(name: &str) -> Result<Self, InvalidNameError> {
        validate(name)?;
        Ok(Self(canonicalize(name)))
    }
}

impl FromStr for PackageName {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PackageName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PackageName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A canonicalized extra name, e.g. `security` in `requests[security]`. Uses the same
/// normalization rules as [`PackageName`].
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ExtraName(String);

impl ExtraName {
    /// Construct from an already-validated, possibly non-canonical name.
    pub fn new(name: &str) -> Result<Self, InvalidNameError> {
        validate(name)?;
        Ok(Self(canonicalize(name)))
    }
}

impl FromStr for ExtraName {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ExtraName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExtraName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ExtraName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ExtraName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_separators_and_case() {
        assert_eq!(PackageName::new("Foo_Bar.Baz").unwrap().to_string(), "foo-bar-baz");
        assert_eq!(PackageName::new("foo--bar").unwrap().to_string(), "foo-bar");
        assert_eq!(PackageName::new("FOO").unwrap(), PackageName::new("foo").unwrap());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(PackageName::new("").is_err());
        assert!(PackageName::new("-foo").is_err());
        assert!(PackageName::new("foo-").is_err());
        assert!(PackageName::new("foo bar").is_err());
    }
}
