//! `fieldrag status`: show configuration and artifact state.

use fieldrag_memory::artifact::read_artifact;
use fieldrag_memory::KnowledgeBase;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let config_file = super::config_file(config_path);
    let location = config.artifact_location();

    println!("📚 FieldRAG Status");
    println!("=================");
    println!("  Config:        {}", config_file.display());
    println!("  Model:         {}", config.model);
    println!("  Transport:     {}", config.inference.transport);
    println!("  Ollama URL:    {}", config.inference.base_url);
    println!("  Retrieval k:   {}", config.memory.retrieval_k);
    println!("  Knowledge base: {}", config.kb_dir().display());
    println!("  Artifacts:     {}", location.dir().display());

    match KnowledgeBase::new(config.kb_dir()).document_paths() {
        Ok(paths) => println!("  Documents:     {}", paths.len()),
        Err(e) => println!("  Documents:     unavailable ({e})"),
    }

    match read_artifact(&location) {
        Ok((payload, descriptor)) => {
            println!("\n  ✅ Artifact generation {}", descriptor.generation);
            println!("     Encoded:  {}", descriptor.created_at.to_rfc3339());
            println!("     Chunks:   {} from {} documents", payload.chunks.len(), descriptor.documents);
        }
        Err(e) => println!("\n  ⚠️  {e}"),
    }

    if !config_file.exists() {
        println!("\n  ⚠️  No config file; run `fieldrag onboard` first");
    }

    Ok(())
}
