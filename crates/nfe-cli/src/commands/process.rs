//! Process command - import a single NF-e XML file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::DateTime;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use nfe_core::invoice::NfeExtractor;
use nfe_core::invoice::rules::AccessKeyParts;
use nfe_core::models::config::NfeConfig;
use nfe_core::models::invoice::{ParsedInvoice, Party};
use nfe_core::resolver::OrderNumberResolver;

use super::config::load;
use super::suppliers::JsonFileConfigSource;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input NF-e XML file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Supplier config file for order references
    #[arg(long)]
    suppliers: Option<PathBuf>,

    /// Show processing time and access key details
    #[arg(long)]
    details: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per line item
    Csv,
    /// Plain text summary
    Text,
}

/// Build an extractor with supplier configs fetched once.
pub async fn build_extractor(config: &NfeConfig, suppliers: Option<&Path>) -> NfeExtractor {
    let source = JsonFileConfigSource::locate(suppliers, config);
    debug!("Supplier configs from {}", source.path().display());

    let resolver = OrderNumberResolver::from_source(&source)
        .await
        .with_settings(&config.resolver);

    NfeExtractor::new()
        .with_config(&config.extraction)
        .with_resolver(resolver)
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    pb.set_message("Loading supplier configs...");
    let extractor = build_extractor(&config, args.suppliers.as_deref()).await;

    pb.set_message("Reading XML...");
    let xml = tokio::fs::read_to_string(&args.input).await?;
    let file_name = file_name_of(&args.input);

    pb.set_message("Extracting invoice data...");
    let report = extractor.extract_report(&xml, &file_name);
    pb.finish_and_clear();
    let report = report?;

    if !report.warnings.is_empty() {
        eprintln!("{}", style("Validation issues:").yellow());
        for warning in &report.warnings {
            eprintln!("  - {}", warning);
        }
    }

    let output = format_invoice(&report.invoice, args.format)?;

    if let Some(output_path) = &args.output {
        tokio::fs::write(output_path, &output).await?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.details {
        println!();
        println!(
            "{} Access key found via {:?}",
            style("ℹ").blue(),
            report.access_key_source
        );
        if let Some(parts) = AccessKeyParts::parse(&report.invoice.access_key) {
            println!(
                "{} Model {} series {} number {} issued {} (UF {})",
                style("ℹ").blue(),
                parts.model,
                parts.series,
                parts.number,
                parts.year_month,
                parts.state_code
            );
        }
        println!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            report.processing_time_ms
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

pub fn format_invoice(invoice: &ParsedInvoice, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(invoice)?),
        OutputFormat::Csv => format_csv(invoice),
        OutputFormat::Text => Ok(format_text(invoice)),
    }
}

fn format_csv(invoice: &ParsedInvoice) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "access_key",
        "number",
        "issue_date",
        "seller_tax_id",
        "seller_name",
        "order_reference",
        "position",
        "product_code",
        "description",
        "quantity",
        "unit",
        "unit_price",
        "total",
        "box_barcode",
        "unit_barcode",
    ])?;

    for item in &invoice.line_items {
        wtr.write_record([
            invoice.access_key.as_str(),
            &invoice.number,
            &invoice.issue_date,
            invoice.seller.tax_id().unwrap_or_default(),
            &invoice.seller.name,
            invoice.order_reference.as_deref().unwrap_or_default(),
            &item.position.to_string(),
            &item.id,
            &item.description,
            &item.quantity.to_string(),
            &item.unit,
            &item.unit_price.to_string(),
            &item.total.to_string(),
            item.box_barcode.as_deref().unwrap_or_default(),
            item.unit_barcode.as_deref().unwrap_or_default(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(invoice: &ParsedInvoice) -> String {
    let mut output = String::new();

    output.push_str(&format!("NF-e {} / series {}\n", invoice.number, invoice.series));
    output.push_str(&format!("Access key: {}\n", invoice.access_key));
    output.push_str(&format!("Issued: {}\n", display_date(&invoice.issue_date)));
    if let Some(order) = &invoice.order_reference {
        output.push_str(&format!("Order: {}\n", order));
    }
    output.push('\n');

    push_party(&mut output, "Seller", &invoice.seller);
    push_party(&mut output, "Buyer", &invoice.buyer);

    output.push_str(&format!("Items ({}):\n", invoice.line_items.len()));
    for item in &invoice.line_items {
        output.push_str(&format!(
            "  {:>3}. {} - {} {} x {} = {}\n",
            item.position, item.description, item.quantity, item.unit, item.unit_price, item.total
        ));
    }
    output.push('\n');

    output.push_str("Totals:\n");
    output.push_str(&format!("  ICMS:   {}\n", invoice.tax_totals.icms));
    output.push_str(&format!("  IPI:    {}\n", invoice.tax_totals.ipi));
    output.push_str(&format!("  PIS:    {}\n", invoice.tax_totals.pis));
    output.push_str(&format!("  COFINS: {}\n", invoice.tax_totals.cofins));
    output.push_str(&format!("  Total:  {}\n", invoice.total_value));

    output
}

fn push_party(output: &mut String, label: &str, party: &Party) {
    output.push_str(&format!("{}:\n", label));
    output.push_str(&format!("  {}\n", party.name));
    if let Some(trade_name) = &party.trade_name {
        output.push_str(&format!("  ({})\n", trade_name));
    }
    if let Some(tax_id) = party.formatted_tax_id() {
        output.push_str(&format!("  {}\n", tax_id));
    }
    if !party.address.is_empty() {
        output.push_str(&format!("  {}\n", party.address.format()));
    }
    output.push('\n');
}

/// Render an RFC 3339 issue date as `dd/mm/yyyy HH:MM`, or as written.
fn display_date(value: &str) -> String {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|_| value.to_string())
}
