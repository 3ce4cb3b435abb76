use std::hash::{Hash, Hasher};

use pep508_rs::{ExtraName, PackageName};

/// The identity the resolver pins one candidate per: a canonical distribution name plus the set
/// of extras requested of it. `foo` and `foo[dev]` are distinct identities — each gets its own
/// pin and its own criteria — even though both ultimately resolve to the same archive.
#[derive(Debug, Clone, Eq)]
pub struct DependencyKey {
    /// The canonicalized distribution name.
    pub name: PackageName,
    /// The requested extras, sorted for a canonical hash/equality even though construction may
    /// not supply them in sorted order.
    pub extras: Vec<ExtraName>,
}

impl DependencyKey {
    /// Construct a key, sorting and deduplicating the extras set.
    pub fn new(name: PackageName, mut extras: Vec<ExtraName>) -> Self {
        extras.sort();
        extras.dedup();
        Self { name, extras }
    }

    /// The identity with no extras requested.
    pub fn base(name: PackageName) -> Self {
        Self::new(name, Vec::new())
    }
}

impl PartialEq for DependencyKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.extras == other.extras
    }
}

impl Ord for DependencyKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.name, &self.extras).cmp(&(&other.name, &other.extras))
    }
}

impl PartialOrd for DependencyKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for DependencyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hashed on name *and* extras, not name alone: equality already requires both fields,
        // so hashing the finer-grained key avoids funneling every extras variant of a
        // distribution into one hash bucket.
        self.name.hash(state);
        self.extras.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_requires_matching_extras() {
        let name = PackageName::new("foo").unwrap();
        let base = DependencyKey::base(name.clone());
        let with_extra = DependencyKey::new(name, vec![ExtraName::new("dev").unwrap()]);
        assert_ne!(base, with_extra);
    }

    #[test]
    fn extras_order_does_not_affect_identity() {
        let name = PackageName::new("foo").unwrap();
        let a = DependencyKey::new(
            name.clone(),
            vec![ExtraName::new("b").unwrap(), ExtraName::new("a").unwrap()],
        );
        let b = DependencyKey::new(
            name,
            vec![ExtraName::new("a").unwrap(), ExtraName::new("b").unwrap()],
        );
        assert_eq!(a, b);
    }
}
