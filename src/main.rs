mod report;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use skblob_core::{BlobError, OutputWriter, ResolveOptions, Resolved, Resolver, StoryContext};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::report::{InputReport, Report};

#[derive(Parser)]
#[command(name = "skblob", version, about = "Decrypt and unpack story media blobs")]
struct Cli {
    /// Blob files to resolve
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, required_unless_present = "dry_run")]
    output: Option<PathBuf>,

    /// Base64 story media key
    #[arg(long, requires = "iv", conflicts_with = "context")]
    key: Option<String>,

    /// Base64 story media IV
    #[arg(long, requires = "key", conflicts_with = "context")]
    iv: Option<String>,

    /// JSON story record with media_key and media_iv
    #[arg(long)]
    context: Option<PathBuf>,

    /// Inputs are known ciphertext: always take the decrypt path
    #[arg(long)]
    ciphertext: bool,

    /// JSON file with resolver options (limits, cipher)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Write a JSON report of every input and output
    #[arg(long)]
    report: Option<PathBuf>,

    /// Overwrite existing files instead of renaming around them
    #[arg(long)]
    force: bool,

    /// Resolve without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_context(cli: &Cli) -> anyhow::Result<Option<StoryContext>> {
    if let Some(path) = &cli.context {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading context {}", path.display()))?;
        return Ok(Some(StoryContext::from_json(&bytes)?));
    }
    match (&cli.key, &cli.iv) {
        (Some(key), Some(iv)) => Ok(Some(StoryContext::from_base64(key, iv)?)),
        _ => Ok(None),
    }
}

fn resolve_one(
    resolver: &Resolver,
    context: Option<&StoryContext>,
    ciphertext: bool,
    path: &Path,
) -> Result<Resolved, BlobError> {
    let data = std::fs::read(path)?;
    match context {
        Some(ctx) if ciphertext => resolver.decrypt(data, ctx),
        Some(ctx) => resolver.resolve_with_context(data, ctx),
        None => resolver.resolve_plain(data),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("blob")
        .to_string()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let t_total = std::time::Instant::now();

    if cli.ciphertext && cli.key.is_none() && cli.context.is_none() {
        anyhow::bail!("--ciphertext needs key material (--key/--iv or --context)");
    }

    let options = match &cli.options {
        Some(path) => ResolveOptions::load(path)
            .with_context(|| format!("loading options {}", path.display()))?,
        None => ResolveOptions::default(),
    };
    let context = load_context(&cli)?;
    let resolver = Resolver::new(options);

    // Stage 1: resolve every input in parallel (pure, in-memory)
    let pb = ProgressBar::new(cli.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} resolving")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let results: Vec<(PathBuf, Result<Resolved, BlobError>)> = cli
        .files
        .par_iter()
        .map(|path| {
            let result = resolve_one(&resolver, context.as_ref(), cli.ciphertext, path);
            pb.inc(1);
            (path.clone(), result)
        })
        .collect();
    pb.finish_and_clear();

    // Stage 2: write outputs (sequential naming, parallel writes per input)
    let mut writer = match (&cli.output, cli.dry_run) {
        (Some(dir), false) => Some(
            OutputWriter::new(dir, cli.force)
                .with_context(|| format!("creating {}", dir.display()))?,
        ),
        _ => None,
    };

    let mut report = Report::default();
    for (path, result) in results {
        let input = path.display().to_string();
        match result {
            Ok(resolved) => {
                let outputs = match writer.as_mut() {
                    Some(w) => w
                        .write(&file_stem(&path), &resolved)
                        .with_context(|| format!("writing output for {}", input))?,
                    None => Vec::new(),
                };
                let units = resolved.units().count();
                info!("{}: {} unit(s)", input, units);
                report.inputs.push(InputReport::resolved(input, &resolved, outputs));
            }
            Err(e) => {
                warn!("{}: {}", input, e);
                report.inputs.push(InputReport::failed(input, &e));
            }
        }
    }

    if let Some(path) = &cli.report {
        report
            .save(path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    let failed = report.failed();
    info!(
        "Done! {} input(s), {} failed, {} unit(s) ({:.2}s)",
        report.inputs.len(),
        failed,
        report.unit_count(),
        t_total.elapsed().as_secs_f64()
    );

    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, report.inputs.len());
    }
    Ok(())
}
