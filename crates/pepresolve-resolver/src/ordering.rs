use pep440_rs::Version;

/// Which end of the version range candidates are tried from first.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Ordering {
    /// Try the newest compatible version first. The default.
    #[default]
    Highest,
    /// Try the oldest compatible version first (`mindeps`-style resolution).
    Lowest,
}

impl Ordering {
    /// Sort `versions` in the direction this policy tries candidates. Order within equal
    /// versions is left as encountered — the caller's sort is expected to be stable.
    pub fn sort(self, versions: &mut [Version]) {
        match self {
            Self::Highest => versions.sort_by(|a, b| b.cmp(a)),
            Self::Lowest => versions.sort(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    fn versions(raw: &[&str]) -> Vec<Version> {
        raw.iter().map(|v| Version::from_str(v).unwrap()).collect()
    }

    #[test_case(Ordering::Highest, &["3.0", "2.0", "1.0"])]
    #[test_case(Ordering::Lowest, &["1.0", "2.0", "3.0"])]
    fn sorts_in_the_expected_direction(ordering: Ordering, expected: &[&str]) {
        let mut v = versions(&["1.0", "3.0", "2.0"]);
        ordering.sort(&mut v);
        assert_eq!(v, versions(expected));
    }

    #[test]
    fn default_is_highest() {
        assert_eq!(Ordering::default(), Ordering::Highest);
    }
}
