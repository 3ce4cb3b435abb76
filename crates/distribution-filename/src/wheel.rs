use std::fmt::{Display, Formatter};
use std::str::FromStr;

use pep440_rs::{Version, VersionParseError, VersionSpecifiers};
use pep508_rs::{InvalidNameError, PackageName};
use platform_tags::Tag;
use thiserror::Error;

/// A wheel filename decoded per [PEP 427](https://peps.python.org/pep-0427/#file-name-convention):
/// `{distribution}-{version}(-{build tag})?-{python tag}-{abi tag}-{platform tag}.whl`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct WheelFilename {
    /// The distribution name.
    pub name: PackageName,
    /// The distribution version.
    pub version: Version,
    /// The optional build tag, used only to break ties between otherwise-identical filenames.
    pub build_tag: Option<String>,
    /// The dot-separated python tag components, e.g. `["cp310"]`.
    pub python_tag: Vec<String>,
    /// The dot-separated abi tag components, e.g. `["cp310"]`.
    pub abi_tag: Vec<String>,
    /// The dot-separated platform tag components, e.g. `["manylinux_2_17_x86_64"]`.
    pub platform_tag: Vec<String>,
}

impl WheelFilename {
    /// The Cartesian product of this wheel's python/abi/platform tag components, the full set
    /// of `(python, abi, platform)` triples this wheel file satisfies.
    pub fn compatible_tags(&self) -> Vec<Tag> {
        let mut tags = Vec::with_capacity(self.python_tag.len() * self.abi_tag.len() * self.platform_tag.len());
        for python in &self.python_tag {
            for abi in &self.abi_tag {
                for platform in &self.platform_tag {
                    tags.push(Tag::new(python.clone(), abi.clone(), platform.clone()));
                }
            }
        }
        tags
    }

    /// Returns `false` if this wheel's tags state it can't be used under the given
    /// `Requires-Python` range. Meant to filter out clearly unusable wheels with perfect
    /// specificity and acceptable sensitivity — an unrecognized tag is allowed through.
    pub fn matches_requires_python(&self, specifiers: &VersionSpecifiers) -> bool {
        self.abi_tag.iter().any(|abi_tag| {
            if abi_tag == "abi3" {
                true
            } else if abi_tag == "none" {
                self.python_tag.iter().any(|python_tag| {
                    if python_tag.starts_with("py2") {
                        return false;
                    }
                    let Some(minor) = python_tag
                        .strip_prefix("cp3")
                        .or_else(|| python_tag.strip_prefix("pp3"))
                        .or_else(|| python_tag.strip_prefix("py3"))
                    else {
                        return true;
                    };
                    let Ok(minor) = minor.parse::<u64>() else {
                        return true;
                    };
                    specifiers.contains(&Version::new([3, minor]))
                })
            } else if abi_tag.starts_with("cp2") || abi_tag.starts_with("pypy2") {
                false
            } else if let Some(minor_no_dot_abi) = abi_tag.strip_prefix("cp3") {
                let minor_not_dot = minor_no_dot_abi.trim_matches(char::is_alphabetic);
                let Ok(minor) = minor_not_dot.parse::<u64>() else {
                    return true;
                };
                specifiers.contains(&Version::new([3, minor]))
            } else if let Some(minor_no_dot_abi) = abi_tag.strip_prefix("pypy3") {
                let Some((minor_not_dot, _)) = minor_no_dot_abi.split_once('_') else {
                    return true;
                };
                let Ok(minor) = minor_not_dot.parse::<u64>() else {
                    return true;
                };
                specifiers.contains(&Version::new([3, minor]))
            } else {
                true
            }
        })
    }

    fn get_tag(&self) -> String {
        format!(
            "{}-{}-{}",
            self.python_tag.join("."),
            self.abi_tag.join("."),
            self.platform_tag.join(".")
        )
    }

    fn parse(stem: &str, filename: &str) -> Result<Self, WheelFilenameError> {
        // Five or six dash-separated entries; if six, the third is the build tag.
        // https://peps.python.org/pep-0427/#file-name-convention
        let mut parts = stem.split('-');

        let name = parts.next().expect("split always yields 1 or more elements");

        let Some(version) = parts.next() else {
            return Err(WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Must have a version".to_string(),
            ));
        };

        let Some(build_tag_or_python_tag) = parts.next() else {
            return Err(WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Must have a Python tag".to_string(),
            ));
        };

        let Some(python_tag_or_abi_tag) = parts.next() else {
            return Err(WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Must have an ABI tag".to_string(),
            ));
        };

        let Some(abi_tag_or_platform_tag) = parts.next() else {
            return Err(WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Must have a platform tag".to_string(),
            ));
        };

        let (name, version, build_tag, python_tag, abi_tag, platform_tag) =
            if let Some(platform_tag) = parts.next() {
                if parts.next().is_some() {
                    return Err(WheelFilenameError::InvalidWheelFileName(
                        filename.to_string(),
                        "Must have 5 or 6 components, but has more".to_string(),
                    ));
                }
                (
                    name,
                    version,
                    Some(build_tag_or_python_tag),
                    python_tag_or_abi_tag,
                    abi_tag_or_platform_tag,
                    platform_tag,
                )
            } else {
                (
                    name,
                    version,
                    None,
                    build_tag_or_python_tag,
                    python_tag_or_abi_tag,
                    abi_tag_or_platform_tag,
                )
            };

        if let Some(build_tag) = build_tag {
            if !build_tag.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(WheelFilenameError::InvalidBuildTag(
                    filename.to_string(),
                    build_tag.to_string(),
                ));
            }
        }

        let name = PackageName::new(name)
            .map_err(|err| WheelFilenameError::InvalidPackageName(filename.to_string(), err))?;
        let version = Version::from_str(version)
            .map_err(|err| WheelFilenameError::InvalidVersion(filename.to_string(), err))?;

        Ok(Self {
            name,
            version,
            build_tag: build_tag.map(str::to_string),
            python_tag: python_tag.split('.').map(String::from).collect(),
            abi_tag: abi_tag.split('.').map(String::from).collect(),
            platform_tag: platform_tag.split('.').map(String::from).collect(),
        })
    }
}

impl FromStr for WheelFilename {
    type Err = WheelFilenameError;

    fn from_str(filename: &str) -> Result<Self, Self::Err> {
        let stem = filename.strip_suffix(".whl").ok_or_else(|| {
            WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Must end with .whl".to_string(),
            )
        })?;
        Self::parse(stem, filename)
    }
}

impl Display for WheelFilename {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}.whl", self.name, self.version, self.get_tag())
    }
}

/// Error parsing a wheel filename.
#[derive(Error, Debug)]
pub enum WheelFilenameError {
    /// The overall filename doesn't match the five/six-component grammar.
    #[error("the wheel filename `{0}` is invalid: {1}")]
    InvalidWheelFileName(String, String),
    /// The version component isn't a valid PEP 440 version.
    #[error("the wheel filename `{0}` has an invalid version: {1}")]
    InvalidVersion(String, VersionParseError),
    /// The distribution name component isn't a valid package name.
    #[error("the wheel filename `{0}` has an invalid package name: {1}")]
    InvalidPackageName(String, InvalidNameError),
    /// The build tag doesn't start with a digit.
    #[error("the wheel filename `{0}` has an invalid build tag: `{1}` must start with a digit")]
    InvalidBuildTag(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("foo.rs")]
    #[test_case(".whl")]
    #[test_case("foo.whl")]
    #[test_case("foo-version.whl")]
    #[test_case("foo-version-python.whl")]
    #[test_case("foo-version-python-abi.whl")]
    #[test_case("foo-1.2.3-build-python-abi-platform-oops.whl")]
    #[test_case("f!oo-1.2.3-python-abi-platform.whl")]
    #[test_case("foo-x.y.z-python-abi-platform.whl")]
    #[test_case("foo-1.2.3-tag-python-abi-platform.whl")]
    fn rejects_malformed_filenames(filename: &str) {
        assert!(WheelFilename::from_str(filename).is_err());
    }

    #[test]
    fn from_and_to_string() {
        let wheel_names = &[
            "django_allauth-0.51.0-py3-none-any.whl",
            "osm2geojson-0.2.4-py3-none-any.whl",
            "numpy-1.26.2-cp311-cp311-manylinux_2_17_x86_64.manylinux2014_x86_64.whl",
        ];
        for wheel_name in wheel_names {
            assert_eq!(
                WheelFilename::from_str(wheel_name).unwrap().to_string(),
                *wheel_name
            );
        }
    }

    #[test]
    fn build_tag_is_captured_but_not_part_of_identity_tags() {
        let parsed = WheelFilename::from_str("foo-1.2.3-202206090410-python-abi-platform.whl").unwrap();
        assert_eq!(parsed.build_tag.as_deref(), Some("202206090410"));
    }

    #[test]
    fn compatible_tags_is_a_cartesian_product() {
        let parsed =
            WheelFilename::from_str("foo-1.2.3-ab.cd-ef-gh.ij.whl").unwrap();
        assert_eq!(parsed.compatible_tags().len(), 2 * 1 * 2);
    }

    #[test]
    fn requires_python_included() {
        let version_specifiers = VersionSpecifiers::from_str("==3.10.*").unwrap();
        let wheel_names = &[
            "bcrypt-4.1.3-cp37-abi3-macosx_10_12_universal2.whl",
            "black-24.4.2-cp310-cp310-win_amd64.whl",
            "black-24.4.2-cp310-none-win_amd64.whl",
            "cbor2-5.6.4-py3-none-any.whl",
            "watchfiles-0.22.0-pp310-pypy310_pp73-macosx_11_0_arm64.whl",
        ];
        for wheel_name in wheel_names {
            assert!(
                WheelFilename::from_str(wheel_name)
                    .unwrap()
                    .matches_requires_python(&version_specifiers),
                "{wheel_name}"
            );
        }
    }

    #[test]
    fn requires_python_dropped() {
        let version_specifiers = VersionSpecifiers::from_str("==3.10.*").unwrap();
        let wheel_names = &[
            "PySocks-1.7.1-py27-none-any.whl",
            "black-24.4.2-cp39-cp39-win_amd64.whl",
            "psutil-6.0.0-cp36-cp36m-win32.whl",
            "pydantic_core-2.20.1-pp39-pypy39_pp73-win_amd64.whl",
            "torch-1.10.0-cp36-none-macosx_10_9_x86_64.whl",
            "torch-1.10.0-py36-none-macosx_10_9_x86_64.whl",
        ];
        for wheel_name in wheel_names {
            assert!(
                !WheelFilename::from_str(wheel_name)
                    .unwrap()
                    .matches_requires_python(&version_specifiers),
                "{wheel_name}"
            );
        }
    }
}
