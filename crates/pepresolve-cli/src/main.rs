#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use pep440_rs::Version;
use pep508_rs::{ExtraName, Requirement};
use pepresolve_resolver::{build_graph, resolve, EngineConfig, Node, Ordering};
use platform_tags::Tag;

mod logging;

/// Resolve a set of PEP 508 requirements against a PEP 503 simple index into a pinned set of
/// wheel distributions.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// PEP 508 requirement strings, e.g. `requests>=2.31` or `foo[dev]; python_version>="3.8"`.
    #[arg(required(true))]
    requirements: Vec<String>,

    /// Extras requested of every top-level requirement, beyond any already named inline.
    #[arg(long = "extra")]
    extras: Vec<String>,

    /// The interpreter version to resolve for.
    #[arg(long, default_value = "3.12")]
    python_version: String,

    /// The root of the PEP 503 simple index.
    #[arg(long, env = "PEPRESOLVE_INDEX_URL")]
    index_url: Option<Url>,

    /// Where to cache downloaded wheel archives. Defaults to a temporary, process-owned cache.
    #[arg(long, env = "PEPRESOLVE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Resolve to the lowest compatible version of every package instead of the highest.
    #[arg(long)]
    mindeps: bool,

    /// A supported `python-abi-platform` tag triple; may be given multiple times, most
    /// preferred first. Defaults to a generic pure-Python tag if none are given.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Output format for the pinned set.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    /// One `name[extras]==version` line per pin.
    Text,
    /// A single JSON array of pins.
    Json,
}

#[derive(serde::Serialize)]
struct PinSummary {
    name: String,
    extras: Vec<String>,
    version: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::setup_logging() {
        eprintln!("\x1b[31mERROR\x1b[0m: failed to install logging: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\x1b[31mERROR\x1b[0m: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let python_version =
        Version::from_str(&cli.python_version).context("invalid --python-version")?;

    let requirements = cli
        .requirements
        .iter()
        .map(|s| Requirement::from_str(s).with_context(|| format!("invalid requirement `{s}`")))
        .collect::<Result<Vec<_>>>()?;

    let extras = cli
        .extras
        .iter()
        .map(|s| ExtraName::new(s).with_context(|| format!("invalid extra `{s}`")))
        .collect::<Result<Vec<_>>>()?;

    let supported_tags = if cli.tags.is_empty() {
        vec![Tag::new("py3", "none", "any")]
    } else {
        cli.tags
            .iter()
            .map(|raw| parse_tag(raw))
            .collect::<Result<Vec<_>>>()?
    };

    let marker_env = EngineConfig::host_marker_environment(&python_version);

    let mut config = EngineConfig {
        requirements,
        extras,
        cache_directory: cli.cache_dir,
        python_version,
        package_index_url: Url::parse("https://pypi.org/simple/").expect("valid default"),
        supported_tags,
        ordering: if cli.mindeps {
            Ordering::Lowest
        } else {
            Ordering::Highest
        },
        marker_env,
    };
    if let Some(index_url) = cli.index_url {
        config.package_index_url = index_url;
    }

    let resolution = resolve(config).context("resolution failed")?;

    match cli.format {
        OutputFormat::Text => {
            for (key, candidate) in &resolution.pins {
                let extras = if key.extras.is_empty() {
                    String::new()
                } else {
                    format!(
                        "[{}]",
                        key.extras
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(",")
                    )
                };
                println!("{}{extras}=={}", key.name, candidate.version);
            }
        }
        OutputFormat::Json => {
            let summaries: Vec<PinSummary> = resolution
                .pins
                .iter()
                .map(|(key, candidate)| PinSummary {
                    name: key.name.to_string(),
                    extras: key.extras.iter().map(ToString::to_string).collect(),
                    version: candidate.version.to_string(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).context("failed to serialize pins")?
            );
        }
    }

    let graph = build_graph(&resolution);
    tracing::debug!(nodes = graph.node_count(), "built resolution graph");
    for node in graph.node_weights() {
        if let Node::Package(key, label) = node {
            tracing::trace!(%key.name, %label, "resolved node");
        }
    }

    Ok(())
}

fn parse_tag(raw: &str) -> Result<Tag> {
    let mut parts = raw.splitn(3, '-');
    let python = parts.next().context("tag missing python component")?;
    let abi = parts.next().context("tag missing abi component")?;
    let platform = parts.next().context("tag missing platform component")?;
    Ok(Tag::new(python, abi, platform))
}
