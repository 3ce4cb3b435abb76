//! Wheel compatibility tags, as defined by
//! [PEP 425](https://peps.python.org/pep-0425/) and refined by
//! [PEP 600](https://peps.python.org/pep-0600/).
//!
//! A wheel filename's compressed tag section decodes into a set of `(python, abi, platform)`
//! triples (the Cartesian product of each dot-separated component); a wheel is installable on
//! an interpreter if any one of those triples exactly matches a tag the interpreter supports.

use std::fmt;

/// One compatibility tag: an exact `(python, abi, platform)` triple, e.g.
/// `(cp310, cp310, manylinux_2_17_x86_64)`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    python: String,
    abi: String,
    platform: String,
}

impl Tag {
    /// Construct a tag from its three components.
    pub fn new(python: impl Into<String>, abi: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            abi: abi.into(),
            platform: platform.into(),
        }
    }

    /// The python tag, e.g. `cp310`.
    pub fn python(&self) -> &str {
        &self.python
    }

    /// The abi tag, e.g. `cp310` or `none`.
    pub fn abi(&self) -> &str {
        &self.abi
    }

    /// The platform tag, e.g. `manylinux_2_17_x86_64`.
    pub fn platform(&self) -> &str {
        &self.platform
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

/// Returns `true` if any tag produced by `wheel_tags` exactly matches any tag produced by
/// `supported_tags`.
///
/// `supported_tags` is consumed lazily as an iterator — the engine never requires random access
/// into the (potentially long) list of interpreter-supported tags, and a caller may supply them
/// most-preferred-first without the engine needing to materialize the whole sequence.
pub fn is_compatible<'a>(
    wheel_tags: impl IntoIterator<Item = &'a Tag>,
    supported_tags: impl Iterator<Item = Tag>,
) -> bool {
    let wheel_tags: Vec<&Tag> = wheel_tags.into_iter().collect();
    for supported in supported_tags {
        if wheel_tags.iter().any(|tag| **tag == supported) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_triple_match() {
        let wheel = vec![Tag::new("cp310", "cp310", "linux_x86_64")];
        let supported = vec![
            Tag::new("cp39", "cp39", "linux_x86_64"),
            Tag::new("cp310", "cp310", "linux_x86_64"),
        ];
        assert!(is_compatible(&wheel, supported.into_iter()));
    }

    #[test]
    fn no_match_when_platform_differs() {
        let wheel = vec![Tag::new("cp310", "cp310", "macosx_11_0_arm64")];
        let supported = vec![Tag::new("cp310", "cp310", "linux_x86_64")];
        assert!(!is_compatible(&wheel, supported.into_iter()));
    }

    #[test]
    fn consumes_supported_tags_lazily() {
        // An infinite iterator would hang a non-lazy implementation; matching on the first
        // element proves `is_compatible` stops as soon as a hit is found.
        let wheel = vec![Tag::new("py3", "none", "any")];
        let supported = std::iter::repeat(Tag::new("py3", "none", "any"));
        assert!(is_compatible(&wheel, supported));
    }
}
