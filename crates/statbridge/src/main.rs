//! statbridge - converts activity samples to a metric archive and back.
//!
//! `export` encodes a JSON array of samples into a `MemoryStore` dump,
//! `import` decodes such a dump back into samples, and `catalog` lists the
//! metrics each statistic group publishes.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use statbridge_core::groups::GroupId;
use statbridge_core::model::FileHeader;
use statbridge_core::{MemoryStore, MetricStore, SampleInput, Session, SessionConfig};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Activity sample to metric archive converter.
#[derive(Parser)]
#[command(name = "statbridge", about = "Activity sample to metric archive converter", version)]
struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode samples into a metric archive dump.
    Export {
        /// Samples file: `{"header": ..., "samples": [...]}` or a bare array.
        input: PathBuf,

        /// Output archive (JSON).
        #[arg(short, long)]
        output: PathBuf,

        /// Session configuration (JSON). Defaults select everything.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Decode a metric archive dump back into samples.
    Import {
        /// Archive produced by `export`.
        input: PathBuf,

        /// Output file. Writes to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List metric descriptors.
    Catalog {
        /// Only this group (e.g. `cpu`, `disk`, `psi-io`).
        #[arg(long)]
        group: Option<String>,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

// ── Interchange ─────────────────────────────────────────────────────────────

/// Host header plus the samples recorded on it.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct Archive {
    #[serde(default)]
    header: FileHeader,
    samples: Vec<SampleInput>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArchiveInput {
    Full(Archive),
    Bare(Vec<SampleInput>),
}

impl From<ArchiveInput> for Archive {
    fn from(input: ArchiveInput) -> Self {
        match input {
            ArchiveInput::Full(archive) => archive,
            ArchiveInput::Bare(samples) => Archive {
                header: FileHeader::default(),
                samples,
            },
        }
    }
}

#[derive(Serialize)]
struct CatalogEntry {
    group: &'static str,
    id: String,
    domain: u32,
    cluster: u32,
    item: u32,
    name: &'static str,
    #[serde(rename = "type")]
    value_type: String,
    semantics: String,
    indom: Option<String>,
    unit: &'static str,
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Formats a unix timestamp as a UTC datetime string.
fn fmt_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CliResult<T> {
    let data = fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_slice(&data)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()).into())
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> CliResult<()> {
    match output {
        Some(path) => {
            let file = fs::File::create(path)
                .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
            serde_json::to_writer_pretty(io::BufWriter::new(file), value)?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn selected_groups(group: Option<&str>) -> CliResult<Vec<GroupId>> {
    match group {
        None => Ok(GroupId::ALL.to_vec()),
        Some(name) => GroupId::from_name(name)
            .map(|g| vec![g])
            .ok_or_else(|| format!("unknown group '{name}'").into()),
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

fn export(archive: &Archive, config: SessionConfig) -> CliResult<MemoryStore> {
    let mut store = MemoryStore::new();
    let mut session = Session::new(config)?;
    session.define(&mut store, &archive.header, &archive.samples)?;
    debug!(groups = ?session.defined_groups(), "defined groups");

    for sample in &archive.samples {
        session.export_record(&mut store, sample)?;
        debug!(time = %fmt_ts(sample.timestamp), "exported record");
    }
    session.close()?;
    store.seal();
    Ok(store)
}

fn import(store: &MemoryStore) -> CliResult<Archive> {
    let mut session = Session::new(SessionConfig::default())?;
    session.attach_reader(store.instances().clone())?;

    let mut samples = Vec::with_capacity(store.records().len());
    for record in store.fetch() {
        let sample = session.import_record(&record)?;
        debug!(time = %fmt_ts(record.timestamp), sets = record.sets.len(), "imported record");
        samples.push(sample);
    }
    let header = session.file_header().clone();
    session.close()?;
    Ok(Archive { header, samples })
}

fn catalog_entries(groups: &[GroupId]) -> Vec<CatalogEntry> {
    groups
        .iter()
        .flat_map(|&g| {
            g.descriptors().iter().map(move |d| {
                let (domain, cluster, item) = d.id.decode();
                CatalogEntry {
                    group: g.name(),
                    id: d.id.to_string(),
                    domain,
                    cluster,
                    item,
                    name: d.name,
                    value_type: format!("{:?}", d.value_type),
                    semantics: format!("{:?}", d.semantics),
                    indom: d.indom.map(|i| i.to_string()),
                    unit: d.unit.label(),
                }
            })
        })
        .collect()
}

fn print_catalog(entries: &[CatalogEntry]) {
    println!(
        "{:<14} {:<12} {:<48} {:<7} {:<9} {:<8} {}",
        "GROUP", "ID", "NAME", "TYPE", "SEM", "INDOM", "UNIT"
    );
    for e in entries {
        println!(
            "{:<14} {:<12} {:<48} {:<7} {:<9} {:<8} {}",
            e.group,
            e.id,
            e.name,
            e.value_type,
            e.semantics,
            e.indom.as_deref().unwrap_or("-"),
            e.unit
        );
    }
}

/// Initializes the tracing subscriber. Default level is INFO, -q keeps errors only.
fn init_logging(verbose: u8, quiet: bool) -> CliResult<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("statbridge={level}").parse()?)
        .add_directive(format!("statbridge_core={level}").parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Export {
            input,
            output,
            config,
        } => {
            let archive: Archive = read_json::<ArchiveInput>(&input)?.into();
            let config = match config {
                Some(path) => read_json(&path)?,
                None => SessionConfig::default(),
            };
            if archive.samples.is_empty() {
                warn!(input = %input.display(), "no samples to export");
            }
            let store = export(&archive, config)?;
            write_json(&store, Some(&output))?;
            info!(
                records = store.records().len(),
                metrics = store.metrics().len(),
                first = %archive.samples.first().map(|s| fmt_ts(s.timestamp)).unwrap_or_default(),
                last = %archive.samples.last().map(|s| fmt_ts(s.timestamp)).unwrap_or_default(),
                output = %output.display(),
                "archive written"
            );
        }
        Command::Import { input, output } => {
            let store: MemoryStore = read_json(&input)?;
            let archive = import(&store)?;
            write_json(&archive, output.as_deref())?;
            info!(
                samples = archive.samples.len(),
                host = %archive.header.nodename,
                "archive decoded"
            );
        }
        Command::Catalog { group, json } => {
            let entries = catalog_entries(&selected_groups(group.as_deref())?);
            if json {
                write_json(&entries, None)?;
            } else {
                print_catalog(&entries);
            }
        }
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;
    info!("statbridge {} starting", env!("CARGO_PKG_VERSION"));
    run(cli)
}
