//! Distribution filename parsing: decoding a wheel filename into its distribution name,
//! version, build tag, and PEP 425 compatibility tag components.

pub use wheel::{WheelFilename, WheelFilenameError};

mod wheel;
