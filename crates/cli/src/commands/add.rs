//! `fieldrag add`: ingest one document and re-encode.

use fieldrag_agent::RagPipeline;
use std::path::{Path, PathBuf};

pub async fn run(
    config_path: Option<&Path>,
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = match (text, file) {
        (Some(text), _) => text,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .map_err(|e| format!("Failed to read {}: {e}", file.display()))?,
        (None, None) => return Err("Provide --text or --file".into()),
    };

    let config = super::load_config(config_path)?;
    let pipeline = RagPipeline::from_config(&config)?;
    let report = pipeline.add_document(&content).await?;

    println!("✅ Added {}", report.path.display());
    println!(
        "   Re-encoded {} documents into {} chunks (generation {})",
        report.encode.documents, report.encode.chunks, report.encode.generation
    );

    Ok(())
}
