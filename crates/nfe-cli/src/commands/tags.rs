//! Tags command - list leaf tags of any XML file.
//!
//! Helps find which field a supplier writes its order number into.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use nfe_core::models::tag::XmlTagRecord;
use nfe_core::walker::{summarize_tags, walk};

/// Arguments for the tags command.
#[derive(Args)]
pub struct TagsArgs {
    /// Input XML file
    #[arg(required = true)]
    input: PathBuf,

    /// Group records by path
    #[arg(long)]
    summary: bool,

    /// Only show tags whose path or content contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: TagsFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum TagsFormat {
    /// JSON output
    Json,
    /// One line per tag
    Text,
}

pub async fn run(args: TagsArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let xml = tokio::fs::read_to_string(&args.input).await?;
    let records: Vec<XmlTagRecord> = walk(&xml)?
        .into_iter()
        .filter(|record| matches_filter(record, args.filter.as_deref()))
        .collect();

    info!("Found {} leaf tags in {}", records.len(), args.input.display());

    if args.summary {
        let summary = summarize_tags(&records);
        match args.format {
            TagsFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            TagsFormat::Text => {
                for entry in &summary {
                    println!(
                        "{} {} = {}",
                        style(&entry.path).cyan(),
                        style(format!("(x{})", entry.occurrences)).dim(),
                        entry.sample
                    );
                }
            }
        }
        return Ok(());
    }

    match args.format {
        TagsFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        TagsFormat::Text => {
            for record in &records {
                println!("{} = {}", style(&record.path).cyan(), record.content);
                if let Some(attributes) = &record.attributes {
                    for (name, value) in attributes {
                        println!("    @{}={}", name, value);
                    }
                }
            }
        }
    }

    Ok(())
}

fn matches_filter(record: &XmlTagRecord, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let filter = filter.to_lowercase();
    record.path.to_lowercase().contains(&filter) || record.content.to_lowercase().contains(&filter)
}
