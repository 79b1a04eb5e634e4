//! Batch import command for many NF-e XML files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use nfe_core::invoice::NfeExtractor;
use nfe_core::models::invoice::ParsedInvoice;

use super::config::load;
use super::process::{build_extractor, file_name_of};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory; one `<access_key>.json` per imported invoice
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Stop at the first document that fails
    #[arg(long)]
    fail_fast: bool,

    /// Supplier config file for order references
    #[arg(long)]
    suppliers: Option<PathBuf>,
}

/// Outcome for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportStatus {
    Imported,
    Duplicate,
    Error,
}

impl ImportStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Imported => "imported",
            ImportStatus::Duplicate => "duplicate",
            ImportStatus::Error => "error",
        }
    }
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    status: ImportStatus,
    invoice: Option<ParsedInvoice>,
    error: Option<String>,
    processing_time_ms: u64,
}

/// Tracks access keys already imported, in this run or an earlier one.
struct DuplicateCheck {
    seen: HashSet<String>,
    output_dir: Option<PathBuf>,
}

impl DuplicateCheck {
    fn new(output_dir: Option<PathBuf>) -> Self {
        Self {
            seen: HashSet::new(),
            output_dir,
        }
    }

    fn record_path(&self, access_key: &str) -> Option<PathBuf> {
        self.output_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", access_key)))
    }

    /// Record `access_key`; `false` when it was already imported.
    fn claim(&mut self, access_key: &str) -> bool {
        if self.record_path(access_key).is_some_and(|path| path.exists()) {
            return false;
        }
        self.seen.insert(access_key.to_string())
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load(config_path)?;
    let fail_fast = args.fail_fast || config.batch.fail_fast;
    let output_dir = args.output_dir.clone().or_else(|| config.batch.output_dir.clone());

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            ext.eq_ignore_ascii_case("xml")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref dir) = output_dir {
        fs::create_dir_all(dir)?;
    }

    let extractor = build_extractor(&config, args.suppliers.as_deref()).await;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut duplicates = DuplicateCheck::new(output_dir.clone());
    let mut results = Vec::with_capacity(files.len());

    for path in files {
        let result = import_file(&path, &extractor, &mut duplicates).await;

        if result.status == ImportStatus::Error {
            let message = result.error.as_deref().unwrap_or("unknown error");
            if fail_fast {
                pb.abandon();
                error!("Failed to process {}: {}", path.display(), message);
                anyhow::bail!("Processing failed for {}: {}", path.display(), message);
            }
            warn!("Failed to process {}: {}", path.display(), message);
        }

        results.push(result);
        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if let Some(dir) = &output_dir {
        for result in &results {
            if let (ImportStatus::Imported, Some(invoice)) = (result.status, &result.invoice) {
                let output_path = dir.join(format!("{}.json", invoice.access_key));
                fs::write(&output_path, serde_json::to_string_pretty(invoice)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let count = |status: ImportStatus| results.iter().filter(|r| r.status == status).count();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} imported, {} duplicate, {} failed",
        style(count(ImportStatus::Imported)).green(),
        style(count(ImportStatus::Duplicate)).yellow(),
        style(count(ImportStatus::Error)).red()
    );

    let failed: Vec<_> = results
        .iter()
        .filter(|r| r.status == ImportStatus::Error)
        .collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn import_file(
    path: &Path,
    extractor: &NfeExtractor,
    duplicates: &mut DuplicateCheck,
) -> ProcessResult {
    let file_start = Instant::now();

    let outcome = match tokio::fs::read_to_string(path).await {
        Ok(xml) => extractor
            .extract_report(&xml, &file_name_of(path))
            .map_err(|e| e.to_string()),
        Err(e) => Err(format!("could not read file: {}", e)),
    };

    let (status, invoice, error) = match outcome {
        Ok(report) => {
            let status = if duplicates.claim(&report.invoice.access_key) {
                ImportStatus::Imported
            } else {
                debug!("Skipping duplicate {}", report.invoice.access_key);
                ImportStatus::Duplicate
            };
            (status, Some(report.invoice), None)
        }
        Err(message) => (ImportStatus::Error, None, Some(message)),
    };

    ProcessResult {
        path: path.to_path_buf(),
        status,
        invoice,
        error,
        processing_time_ms: file_start.elapsed().as_millis() as u64,
    }
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "access_key",
        "number",
        "issue_date",
        "seller_name",
        "seller_tax_id",
        "total_value",
        "order_reference",
        "item_count",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let time = result.processing_time_ms.to_string();

        match &result.invoice {
            Some(invoice) => wtr.write_record([
                filename,
                result.status.as_str(),
                &invoice.access_key,
                &invoice.number,
                &invoice.issue_date,
                &invoice.seller.name,
                invoice.seller.tax_id().unwrap_or_default(),
                &invoice.total_value.to_string(),
                invoice.order_reference.as_deref().unwrap_or_default(),
                &invoice.line_items.len().to_string(),
                &time,
                "",
            ])?,
            None => wtr.write_record([
                filename,
                result.status.as_str(),
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &time,
                result.error.as_deref().unwrap_or(""),
            ])?,
        }
    }

    wtr.flush()?;
    Ok(())
}
