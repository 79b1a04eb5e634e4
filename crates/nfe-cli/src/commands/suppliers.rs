//! Suppliers command - manage per-supplier order-number configs.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use tracing::{debug, info};

use nfe_core::error::ConfigSourceError;
use nfe_core::invoice::rules::{digits_only, format_tax_id};
use nfe_core::models::config::NfeConfig;
use nfe_core::models::supplier::SupplierExtractionConfig;
use nfe_core::resolver::{PatternOutcome, SupplierConfigSource, fields, test_pattern};

use super::config::{config_dir, load};

/// Arguments for the suppliers command.
#[derive(Args)]
pub struct SuppliersArgs {
    /// Supplier config file (default: from config, then the config directory)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: SuppliersCommand,
}

#[derive(Subcommand)]
enum SuppliersCommand {
    /// List configured suppliers
    List {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a supplier config, replacing one with the same tax id
    Add(AddArgs),

    /// Remove configs by tax id or supplier name
    Remove {
        /// Tax id (punctuation ignored) or supplier name
        target: String,
    },

    /// Try a pattern against sample text
    Test {
        /// Regular expression; the first capture group is the order number
        pattern: String,

        /// Sample annotation text
        text: String,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Seller CNPJ/CPF; omit for the default config
    #[arg(long, default_value = "")]
    tax_id: String,

    /// Supplier display name
    #[arg(long)]
    name: String,

    /// Annotation field holding the order number
    #[arg(long, default_value = fields::COMPLEMENTARY_INFO)]
    field: String,

    /// Extraction pattern
    #[arg(long)]
    pattern: String,

    /// Free-form notes
    #[arg(long)]
    description: Option<String>,
}

/// Supplier configs stored as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileConfigSource {
    path: PathBuf,
}

impl JsonFileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the file from an explicit path, the app config, or the default location.
    pub fn locate(explicit: Option<&Path>, config: &NfeConfig) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| config.resolver.suppliers_file.clone())
            .unwrap_or_else(|| config_dir().join("suppliers.json"));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read configs synchronously; a missing file means no configs.
    pub fn load(&self) -> Result<Vec<SupplierExtractionConfig>, ConfigSourceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, configs: &[SupplierExtractionConfig]) -> Result<(), ConfigSourceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(configs)?)?;
        Ok(())
    }
}

impl SupplierConfigSource for JsonFileConfigSource {
    async fn fetch_configs(&self) -> Result<Vec<SupplierExtractionConfig>, ConfigSourceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No supplier config file at {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn run(args: SuppliersArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let source = JsonFileConfigSource::locate(args.file.as_deref(), &config);

    match args.command {
        SuppliersCommand::List { json } => list(&source, json),
        SuppliersCommand::Add(add_args) => add(&source, add_args),
        SuppliersCommand::Remove { target } => remove(&source, &target),
        SuppliersCommand::Test { pattern, text } => test(&pattern, &text),
    }
}

fn list(source: &JsonFileConfigSource, json: bool) -> anyhow::Result<()> {
    let configs = source.load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&configs)?);
        return Ok(());
    }

    if configs.is_empty() {
        println!(
            "{} No supplier configs in {}",
            style("ℹ").blue(),
            source.path().display()
        );
        return Ok(());
    }

    println!("Supplier configs ({}):\n", source.path().display());
    for config in &configs {
        let tax_id = if config.is_wildcard() {
            style("default".to_string()).cyan()
        } else {
            style(format_tax_id(&config.tax_id)).bold()
        };
        println!("  {} {}", tax_id, config.supplier_name);
        println!("      field:   {}", config.source_field);
        println!("      pattern: {}", config.extraction_pattern);
        if !config.description.is_empty() {
            println!("      {}", style(&config.description).dim());
        }
    }

    Ok(())
}

fn add(source: &JsonFileConfigSource, args: AddArgs) -> anyhow::Result<()> {
    if !fields::ALL.contains(&args.field.as_str()) {
        anyhow::bail!(
            "Unknown field '{}'. Expected one of: {}",
            args.field,
            fields::ALL.join(", ")
        );
    }

    if let PatternOutcome::InvalidPattern(reason) = test_pattern(&args.pattern, "") {
        anyhow::bail!("Invalid pattern: {}", reason);
    }

    let mut entry = SupplierExtractionConfig::new(
        digits_only(&args.tax_id),
        args.name,
        args.field,
        args.pattern,
    );
    if let Some(description) = args.description {
        entry = entry.with_description(description);
    }

    let mut configs = source.load()?;
    let replaced = upsert(&mut configs, entry.clone());
    source.save(&configs)?;

    info!("Saved {} supplier configs to {}", configs.len(), source.path().display());
    println!(
        "{} {} config for {}",
        style("✓").green(),
        if replaced { "Updated" } else { "Added" },
        entry.supplier_name
    );

    Ok(())
}

fn remove(source: &JsonFileConfigSource, target: &str) -> anyhow::Result<()> {
    let mut configs = source.load()?;
    let before = configs.len();
    configs.retain(|config| !matches_target(config, target));
    let removed = before - configs.len();

    if removed == 0 {
        anyhow::bail!("No supplier config matches '{}'", target);
    }

    source.save(&configs)?;
    println!(
        "{} Removed {} config(s)",
        style("✓").green(),
        removed
    );

    Ok(())
}

fn test(pattern: &str, text: &str) -> anyhow::Result<()> {
    match test_pattern(pattern, text) {
        PatternOutcome::Matched(value) => {
            println!("{} Match: {}", style("✓").green(), value);
            Ok(())
        }
        PatternOutcome::NoMatch => {
            println!("{} No match", style("✗").yellow());
            Ok(())
        }
        PatternOutcome::InvalidPattern(reason) => anyhow::bail!("Invalid pattern: {}", reason),
    }
}

/// Insert `entry`, replacing the config for the same tax id.
///
/// A default entry replaces the existing default, so there is at most one.
fn upsert(configs: &mut Vec<SupplierExtractionConfig>, entry: SupplierExtractionConfig) -> bool {
    let existing = configs.iter_mut().find(|config| {
        if entry.is_wildcard() {
            config.is_wildcard()
        } else {
            !config.is_wildcard() && digits_only(&config.tax_id) == digits_only(&entry.tax_id)
        }
    });

    match existing {
        Some(config) => {
            *config = entry;
            true
        }
        None => {
            configs.push(entry);
            false
        }
    }
}

fn matches_target(config: &SupplierExtractionConfig, target: &str) -> bool {
    let digits = digits_only(target);
    if !digits.is_empty() && digits_only(&config.tax_id) == digits {
        return true;
    }
    config.supplier_name.eq_ignore_ascii_case(target.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfe_core::resolver::{AnnotationFields, OrderNumberResolver, resolve_from_source};
    use tempfile::tempdir;

    fn sul() -> SupplierExtractionConfig {
        SupplierExtractionConfig::new("11222333000181", "Distribuidora Sul", "infCpl", r"DT\s*(\d+)")
    }

    #[test]
    fn test_upsert_replaces_same_tax_id() {
        let mut configs = vec![sul()];
        let updated = SupplierExtractionConfig::new("11222333000181", "Sul", "xPed", r"(\d+)");
        assert!(upsert(&mut configs, updated));
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].source_field, "xPed");

        let default = SupplierExtractionConfig::new("", "Padrão", "infCpl", r"(\d+)");
        assert!(!upsert(&mut configs, default));
        assert_eq!(configs.len(), 2);
    }

    #[test]
    fn test_upsert_replaces_default_config() {
        let mut configs = vec![sul()];
        upsert(
            &mut configs,
            SupplierExtractionConfig::new("", "Padrão", "infCpl", r"pedido (\d+)"),
        );
        assert!(upsert(
            &mut configs,
            SupplierExtractionConfig::new("", "Padrão", "infCpl", r"dt (\d+)"),
        ));

        let defaults: Vec<_> = configs.iter().filter(|c| c.is_wildcard()).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].extraction_pattern, r"dt (\d+)");

        let resolver = OrderNumberResolver::new(configs);
        let notes = AnnotationFields::new().with(fields::COMPLEMENTARY_INFO, "pedido 1 dt 2");
        assert_eq!(resolver.resolve(&notes, "99888777000166"), Some("2".to_string()));
    }

    #[test]
    fn test_matches_target_by_tax_id_or_name() {
        let config = sul();
        assert!(matches_target(&config, "11.222.333/0001-81"));
        assert!(matches_target(&config, "distribuidora sul"));
        assert!(!matches_target(&config, "99888777000166"));
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempdir().unwrap();
        let source = JsonFileConfigSource::new(dir.path().join("nested").join("suppliers.json"));
        assert!(source.load().unwrap().is_empty());

        source.save(&[sul()]).unwrap();
        assert_eq!(source.load().unwrap(), vec![sul()]);
    }

    #[tokio::test]
    async fn test_file_source_feeds_resolver() {
        let dir = tempdir().unwrap();
        let source = JsonFileConfigSource::new(dir.path().join("suppliers.json"));
        source.save(&[sul()]).unwrap();

        let notes = AnnotationFields::new().with(fields::COMPLEMENTARY_INFO, "Entrega DT 5521");
        assert_eq!(
            resolve_from_source(&source, &notes, "11222333000181").await,
            Some("5521".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_or_corrupt_file() {
        let dir = tempdir().unwrap();
        let source = JsonFileConfigSource::new(dir.path().join("absent.json"));
        assert!(source.fetch_configs().await.unwrap().is_empty());

        let path = dir.path().join("corrupt.json");
        fs::write(&path, "not json").unwrap();
        let source = JsonFileConfigSource::new(path);
        assert!(matches!(
            source.fetch_configs().await,
            Err(ConfigSourceError::Decode(_))
        ));
    }
}
