use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// One of `~=` `==` `!=` `<=` `>=` `<` `>` `===`.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum Operator {
    /// `== 1.2.3`
    Equal,
    /// `== 1.2.*`
    EqualStar,
    /// `===` (discouraged, arbitrary string equality)
    ExactEqual,
    /// `!= 1.2.3`
    NotEqual,
    /// `!= 1.2.*`
    NotEqualStar,
    /// `~=`
    TildeEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
}

impl Operator {
    /// Returns `true` if this operator represents a `.*` wildcard match.
    pub fn is_star(self) -> bool {
        matches!(self, Self::EqualStar | Self::NotEqualStar)
    }
}

/// Error parsing an [`Operator`] from its string form.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("invalid comparison operator: `{0}`")]
pub struct OperatorParseError(String);

impl FromStr for Operator {
    type Err = OperatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => Self::Equal,
            "===" => Self::ExactEqual,
            "!=" => Self::NotEqual,
            "~=" => Self::TildeEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessThanEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterThanEqual,
            other => return Err(OperatorParseError(other.to_string())),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equal | Self::EqualStar => "==",
            Self::ExactEqual => "===",
            Self::NotEqual | Self::NotEqualStar => "!=",
            Self::TildeEqual => "~=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
        };
        f.write_str(s)
    }
}

/// The kind of a pre-release segment: `a` (alpha), `b` (beta), or `rc` (release candidate).
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash)]
pub enum PrereleaseKind {
    /// `aN`
    Alpha,
    /// `bN`
    Beta,
    /// `rcN` (also spelled `c`)
    ReleaseCandidate,
}

impl fmt::Display for PrereleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::ReleaseCandidate => "rc",
        })
    }
}

/// A pre-release segment, e.g. the `a1` in `1.0a1`.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash)]
pub struct Prerelease {
    /// The kind of pre-release.
    pub kind: PrereleaseKind,
    /// The pre-release number.
    pub number: u64,
}

impl fmt::Display for Prerelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.number)
    }
}

/// One dot-separated segment of a local version identifier, e.g. `ubuntu` or `1` in `+ubuntu.1`.
///
/// Per PEP 440, segments are compared numerically if both sides parse as integers, and
/// lexically (case-insensitively normalized) otherwise; numeric segments always sort after
/// alphanumeric ones when compared against each other.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub enum LocalSegment {
    /// An alphanumeric segment, compared case-insensitively.
    String(String),
    /// A purely numeric segment.
    Number(u64),
}

impl Ord for LocalSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            // Numeric segments always sort higher than alphanumeric ones.
            (Self::Number(_), Self::String(_)) => Ordering::Greater,
            (Self::String(_), Self::Number(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for LocalSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A PEP 440 version, e.g. `1!2.0.post3.dev4+ubuntu.1`.
///
/// `Version` implements a total order: epoch, then release segments (padded with zeros to the
/// longer length), then pre/dev/post status, then local segments. Equal versions produce equal
/// hashes.
#[derive(Debug, Eq, Clone)]
pub struct Version {
    epoch: u64,
    release: Arc<[u64]>,
    pre: Option<Prerelease>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Arc<[LocalSegment]>,
}

impl Version {
    /// Construct a version from a release-segment iterator, with no epoch, pre/post/dev, or
    /// local segment.
    pub fn new<I, R>(release_numbers: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<u64>,
    {
        Self {
            epoch: 0,
            release: release_numbers.into_iter().map(Into::into).collect(),
            pre: None,
            post: None,
            dev: None,
            local: Arc::from([]),
        }
    }

    /// The epoch, `0` if unspecified.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The release segments, e.g. `[1, 2, 3]` for `1.2.3`.
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// The pre-release segment, if any.
    pub fn pre(&self) -> Option<Prerelease> {
        self.pre
    }

    /// The post-release number, if any.
    pub fn post(&self) -> Option<u64> {
        self.post
    }

    /// The dev-release number, if any.
    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    /// The local version segments, e.g. `[ubuntu, 1]` for `+ubuntu.1`.
    pub fn local(&self) -> &[LocalSegment] {
        &self.local
    }

    /// Whether this version has any pre-release or dev-release marker.
    pub fn any_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Whether this version has a non-empty local segment.
    pub fn is_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// This version with the local segment stripped, used when matching `~=` and `==`/`!=`
    /// against a specifier with no local segment of its own.
    pub fn without_local(&self) -> Self {
        Self {
            local: Arc::from([]),
            ..self.clone()
        }
    }

    /// Padded comparison key for the release segment: `1.2` and `1.2.0` compare equal.
    fn release_key(&self, len: usize) -> Vec<u64> {
        let mut v: Vec<u64> = self.release.to_vec();
        v.resize(len, 0);
        v
    }

    /// Returns `true` if `self`'s release segments, truncated to the length of `prefix`, equal
    /// `prefix`. Used by the `==X.Y.*` and `!=X.Y.*` operators.
    pub fn release_matches_prefix(&self, prefix: &[u64]) -> bool {
        self.epoch == 0 && self.release.iter().take(prefix.len()).eq(prefix.iter())
    }

    /// Ordering key for pre/dev status: stable releases without a dev segment sort highest;
    /// dev-only releases sort lowest; pre-releases (with or without a trailing dev) sort in the
    /// middle, ordered by `(kind, number)`, with the dev segment breaking ties just below the
    /// pre-release proper.
    fn prerelease_key(&self) -> (i8, Option<Prerelease>, i64) {
        match (self.pre, self.dev) {
            (Some(pre), dev) => (1, Some(pre), dev.map_or(i64::MAX, |d| d as i64 - i64::MAX)),
            (None, Some(dev)) => (-1, None, dev as i64),
            (None, None) => (2, None, 0),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        // `cmp` pads release segments to the longer length when comparing, so `1.0` and `1.0.0`
        // are equal versions; strip trailing zeros here so they also hash equal.
        let mut release = self.release.to_vec();
        while release.last() == Some(&0) {
            release.pop();
        }
        release.hash(state);
        self.prerelease_key().hash(state);
        self.post.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| {
                let len = self.release.len().max(other.release.len());
                self.release_key(len).cmp(&other.release_key(len))
            })
            .then_with(|| self.prerelease_key().cmp(&other.prerelease_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| {
                // No local segment sorts below any local segment; otherwise segment-by-segment,
                // with a missing trailing segment sorting below a present one.
                match (self.local.len(), other.local.len()) {
                    (0, 0) => Ordering::Equal,
                    (0, _) => Ordering::Less,
                    (_, 0) => Ordering::Greater,
                    _ => self.local.cmp(&other.local),
                }
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        for (i, segment) in self.release.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        if let Some(pre) = self.pre {
            write!(f, "{pre}")?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        if !self.local.is_empty() {
            f.write_str("+")?;
            for (i, segment) in self.local.iter().enumerate() {
                if i != 0 {
                    f.write_str(".")?;
                }
                write!(f, "{segment}")?;
            }
        }
        Ok(())
    }
}

/// Error returned when a version string does not follow the PEP 440 grammar.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("version `{0}` does not match PEP 440 rules")]
pub struct VersionParseError(String);

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s).ok_or_else(|| VersionParseError(s.to_string()))
    }
}

/// A hand-rolled recursive-descent parser for the PEP 440 version grammar. Regex would work
/// too, but this keeps every branch's precedence explicit and gives clean error locality.
fn parse(s: &str) -> Option<Version> {
    let s = s.trim();
    // PEP 440 permits an optional leading "v".
    let s = s.strip_prefix('v').unwrap_or(s);

    let mut rest = s;

    let epoch = if let Some(bang) = rest.find('!') {
        let (epoch_str, after) = rest.split_at(bang);
        let epoch = epoch_str.parse::<u64>().ok()?;
        rest = &after[1..];
        epoch
    } else {
        0
    };

    let release_end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let (release_str, mut rest) = rest.split_at(release_end);
    if release_str.is_empty() || release_str.starts_with('.') || release_str.ends_with('.') {
        return None;
    }
    let mut release = Vec::new();
    for part in release_str.split('.') {
        release.push(part.parse::<u64>().ok()?);
    }

    let pre = parse_prerelease(&mut rest)?;
    let post = parse_post(&mut rest)?;
    let dev = parse_dev(&mut rest)?;
    let local = parse_local(&mut rest)?;

    if !rest.is_empty() {
        return None;
    }

    Some(Version {
        epoch,
        release: release.into(),
        pre,
        post,
        dev,
        local: local.into(),
    })
}

fn strip_separator(s: &str) -> &str {
    s.strip_prefix(['-', '_', '.']).unwrap_or(s)
}

fn parse_prerelease(rest: &mut &str) -> Option<Option<Prerelease>> {
    let candidate = strip_separator(rest);
    let (kind, after_kind) = if let Some(a) = candidate.strip_prefix("rc") {
        (PrereleaseKind::ReleaseCandidate, a)
    } else if let Some(a) = candidate.strip_prefix('c') {
        (PrereleaseKind::ReleaseCandidate, a)
    } else if let Some(a) = candidate.strip_prefix("alpha") {
        (PrereleaseKind::Alpha, a)
    } else if let Some(a) = candidate.strip_prefix('a') {
        (PrereleaseKind::Alpha, a)
    } else if let Some(a) = candidate.strip_prefix("beta") {
        (PrereleaseKind::Beta, a)
    } else if let Some(a) = candidate.strip_prefix('b') {
        (PrereleaseKind::Beta, a)
    } else {
        return Some(None);
    };
    let digits_end = after_kind
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_kind.len());
    let (digits, after_digits) = after_kind.split_at(digits_end);
    let number = if digits.is_empty() { 0 } else { digits.parse().ok()? };
    *rest = after_digits;
    Some(Some(Prerelease { kind, number }))
}

fn parse_post(rest: &mut &str) -> Option<Option<u64>> {
    // Both `.postN` and the legacy bare `-N` spelling are accepted.
    if let Some(stripped) = rest.strip_prefix('-') {
        let digits_end = stripped
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(stripped.len());
        if digits_end > 0 {
            let (digits, after) = stripped.split_at(digits_end);
            let number = digits.parse().ok()?;
            *rest = after;
            return Some(Some(number));
        }
        return Some(None);
    }
    let candidate = strip_separator(rest);
    let Some(after) = candidate.strip_prefix("post").or_else(|| candidate.strip_prefix("rev")).or_else(|| candidate.strip_prefix('r')) else {
        return Some(None);
    };
    let digits_end = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
    let (digits, after_digits) = after.split_at(digits_end);
    let number = if digits.is_empty() { 0 } else { digits.parse().ok()? };
    *rest = after_digits;
    Some(Some(number))
}

fn parse_dev(rest: &mut &str) -> Option<Option<u64>> {
    let candidate = strip_separator(rest);
    let Some(after) = candidate.strip_prefix("dev") else {
        return Some(None);
    };
    let digits_end = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
    let (digits, after_digits) = after.split_at(digits_end);
    let number = if digits.is_empty() { 0 } else { digits.parse().ok()? };
    *rest = after_digits;
    Some(Some(number))
}

fn parse_local(rest: &mut &str) -> Option<Vec<LocalSegment>> {
    let Some(after) = rest.strip_prefix('+') else {
        return Some(Vec::new());
    };
    if after.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    for part in after.split(['.', '-', '_']) {
        if part.is_empty() {
            return None;
        }
        segments.push(if let Ok(n) = part.parse::<u64>() {
            LocalSegment::Number(n)
        } else {
            LocalSegment::String(part.to_ascii_lowercase())
        });
    }
    *rest = "";
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1.0", "1.0", Ordering::Equal)]
    #[test_case("1.0", "1.0.0", Ordering::Equal)]
    #[test_case("1.0", "2.0", Ordering::Less)]
    #[test_case("1.0a1", "1.0", Ordering::Less)]
    #[test_case("1.0.dev1", "1.0a1", Ordering::Less)]
    #[test_case("1.0.post1", "1.0", Ordering::Greater)]
    #[test_case("1!0.1", "2.0", Ordering::Greater)]
    #[test_case("1.0+local", "1.0", Ordering::Greater)]
    fn ordering(a: &str, b: &str, expected: Ordering) {
        let a = Version::from_str(a).unwrap();
        let b = Version::from_str(b).unwrap();
        assert_eq!(a.cmp(&b), expected);
    }

    #[test]
    fn roundtrip_display() {
        for s in ["1.2.3", "1!2.0.post3.dev4+ubuntu.1", "2.0rc1", "1.0.dev0"] {
            let v = Version::from_str(s).unwrap();
            assert_eq!(v.to_string(), s);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::from_str("not-a-version").is_err());
        assert!(Version::from_str("1..0").is_err());
    }

    #[test]
    fn local_segments_incomparable_but_hashable() {
        let a = Version::from_str("1.0+ubuntu.1").unwrap();
        let b = Version::from_str("1.0+debian.1").unwrap();
        // Neither local identifier is ordered relative to the other by content, but both must
        // still compare greater than the bare public version.
        assert!(a != b);
        assert!(a > Version::from_str("1.0").unwrap());
        assert!(b > Version::from_str("1.0").unwrap());
    }

    fn hash_of(v: &Version) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test_case("1.0", "1.0.0")]
    #[test_case("1.0", "1.0.0.0")]
    #[test_case("1!0.1", "1!0.1.0")]
    fn equal_versions_hash_equal(a: &str, b: &str) {
        let a = Version::from_str(a).unwrap();
        let b = Version::from_str(b).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
