//! `fieldrag encode`: rebuild the memory artifact from the knowledge base.

use fieldrag_agent::{encode_knowledge_base, encoder_from_config};
use fieldrag_memory::KnowledgeBase;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let knowledge_base = KnowledgeBase::new(config.kb_dir());
    let encoder = Arc::new(encoder_from_config(&config));

    println!("📚 Encoding knowledge base: {}", config.kb_dir().display());
    let report = encode_knowledge_base(knowledge_base, encoder).await?;

    if report.used_placeholder {
        println!("  ⚠️  No documents found; encoded a placeholder so the assistant can start");
    }
    println!("  ✅ Generation: {}", report.generation);
    println!("     Documents:  {}", report.documents);
    println!("     Chunks:     {}", report.chunks);
    println!("     Payload:    {}", report.payload_path.display());
    println!("     Index:      {}", report.index_path.display());

    Ok(())
}
