use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use pep508_rs::{ExtraName, Requirement};
use tracing::instrument;

use crate::error::Error;

/// The subset of a wheel's `dist-info/METADATA` this engine needs: the distribution's own
/// dependencies and the extras it advertises.
#[derive(Debug, Clone, Default)]
pub struct WheelMetadata {
    /// Every `Requires-Dist` entry, parsed as a PEP 508 requirement.
    pub requires_dist: Vec<Requirement>,
    /// Every `Provides-Extra` entry.
    pub provides_extra: Vec<ExtraName>,
}

/// Open `wheel_path` as a zip archive, locate `{name}-{version}.dist-info/METADATA`, and parse
/// it as an email-style header block.
#[instrument(skip(name, version))]
pub fn read_wheel_metadata(
    wheel_path: &Path,
    name: &str,
    version: &str,
) -> Result<WheelMetadata, Error> {
    let file = File::open(wheel_path).map_err(|err| Error::Io(wheel_path.to_path_buf(), err))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| Error::Zip(wheel_path.to_path_buf(), err))?;

    let dist_info_dir = format!(
        "{}-{}.dist-info",
        name.replace('-', "_"),
        version
    );
    let entry_name = (0..archive.len())
        .map(|i| archive.by_index(i).map(|f| f.name().to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| Error::Zip(wheel_path.to_path_buf(), err))?
        .into_iter()
        .find(|name| {
            name.ends_with("/METADATA")
                && name
                    .to_ascii_lowercase()
                    .contains(&dist_info_dir.to_ascii_lowercase())
        })
        .or_else(|| {
            // Fall back to any `*.dist-info/METADATA` entry — some indexes normalize the
            // dist-info directory name slightly differently than the requested name/version.
            (0..archive.len())
                .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
                .find(|name| name.ends_with(".dist-info/METADATA"))
        })
        .ok_or_else(|| Error::MetadataMissing(wheel_path.to_path_buf()))?;

    let mut contents = String::new();
    archive
        .by_name(&entry_name)
        .map_err(|err| Error::Zip(wheel_path.to_path_buf(), err))?
        .read_to_string(&mut contents)
        .map_err(|err| Error::Io(wheel_path.to_path_buf(), err))?;

    parse_metadata(&contents).map_err(|reason| Error::MetadataParse(wheel_path.to_path_buf(), reason))
}

/// Parse the email-style header block of a `METADATA` file, collecting every `Requires-Dist`
/// and `Provides-Extra` field. Continuation lines (indented with whitespace) are folded into
/// the previous field's value, and parsing stops at the blank line separating the header block
/// from the long description body.
fn parse_metadata(contents: &str) -> Result<WheelMetadata, String> {
    let mut metadata = WheelMetadata::default();
    let mut current: Option<(String, String)> = None;

    let flush = |current: &mut Option<(String, String)>, metadata: &mut WheelMetadata| -> Result<(), String> {
        if let Some((key, value)) = current.take() {
            match key.as_str() {
                "Requires-Dist" => {
                    let req = Requirement::from_str(value.trim())
                        .map_err(|err| format!("invalid Requires-Dist `{value}`: {err}"))?;
                    metadata.requires_dist.push(req);
                }
                "Provides-Extra" => {
                    let extra = ExtraName::from_str(value.trim())
                        .map_err(|err| format!("invalid Provides-Extra `{value}`: {err}"))?;
                    metadata.provides_extra.push(extra);
                }
                _ => {}
            }
        }
        Ok(())
    };

    for line in contents.lines() {
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = current.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        flush(&mut current, &mut metadata)?;
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        current = Some((key.trim().to_string(), value.trim().to_string()));
    }
    flush(&mut current, &mut metadata)?;

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_before_description_body() {
        let text = "\
Metadata-Version: 2.1
Name: foo
Version: 1.0
Requires-Dist: bar>=1.0

A long description mentioning Requires-Dist: nope>=1.0 which must be ignored.
";
        let metadata = parse_metadata(text).unwrap();
        assert_eq!(metadata.requires_dist.len(), 1);
        assert_eq!(metadata.requires_dist[0].name.to_string(), "bar");
    }

    #[test]
    fn accepts_bare_requirements() {
        let text = "\
Name: foo
Version: 1.0
Requires-Dist: bar>=1.0
Requires-Dist: baz[x]>=2.0; extra == \"dev\"
Provides-Extra: dev
";
        let metadata = parse_metadata(text).unwrap();
        assert_eq!(metadata.requires_dist.len(), 2);
        assert_eq!(metadata.requires_dist[0].name.to_string(), "bar");
        assert_eq!(metadata.provides_extra.len(), 1);
        assert_eq!(metadata.provides_extra[0].to_string(), "dev");
    }

    #[test]
    fn stops_at_blank_line() {
        let text = "Name: foo\n\nRequires-Dist: bar>=1.0\n";
        let metadata = parse_metadata(text).unwrap();
        assert!(metadata.requires_dist.is_empty());
    }
}
