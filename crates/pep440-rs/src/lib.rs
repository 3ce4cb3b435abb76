//! A library for python version numbers and specifiers, implementing
//! [PEP 440](https://peps.python.org/pep-0440).
//!
//! ```rust
//! use std::str::FromStr;
//! use pep440_rs::{VersionSpecifiers, Version, VersionSpecifier};
//!
//! let version = Version::from_str("1.19").unwrap();
//! let version_specifier = VersionSpecifier::from_str("==1.*").unwrap();
//! assert!(version_specifier.contains(&version));
//! let version_specifiers = VersionSpecifiers::from_str(">=1.16, <2.0").unwrap();
//! assert!(version_specifiers.contains(&version));
//! ```
//!
//! PEP 440 has a lot of unintuitive features:
//!
//! * An epoch prefix (`1!1.2.3`); a lower epoch always sorts below a higher one, regardless of
//!   the release segment.
//! * Post-releases, which can be attached to both stable releases and pre-releases.
//! * Dev-releases, which sort just below the release they're attached to when the release is a
//!   pre-release, but *before* all pre-releases when attached to a stable release.
//! * Local version identifiers (`+ubuntu.1`), which are incomparable across differing local
//!   segments but otherwise sort above the same public version without one.
//! * No semver-style caret, only a pseudo-semver tilde (`~=1.4.2` == `>=1.4.2, ==1.4.*`).

pub use version::{
    LocalSegment, Operator, OperatorParseError, Prerelease, PrereleaseKind, Version,
    VersionParseError,
};
pub use version_specifier::{VersionSpecifier, VersionSpecifierError, VersionSpecifiers};

mod version;
mod version_specifier;
