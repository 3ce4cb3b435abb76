//! A library for python dependency specifiers, better known as
//! [PEP 508](https://peps.python.org/pep-0508/), plus the environment marker grammar the same
//! PEP defines.
//!
//! ```rust
//! use std::str::FromStr;
//! use pep508_rs::Requirement;
//!
//! let requirement = Requirement::from_str("foo[bar]>=1.2,<2; python_version >= \"3.8\"").unwrap();
//! assert_eq!(requirement.name.as_ref(), "foo");
//! ```

pub use marker::{MarkerEnvironment, MarkerExpression, MarkerParseError, MarkerTree, MarkerValue};
pub use name::{ExtraName, InvalidNameError, PackageName};
pub use requirement::{Requirement, RequirementParseError};

mod marker;
mod name;
mod requirement;
