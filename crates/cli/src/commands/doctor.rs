//! `fieldrag doctor`: diagnose the installation.

use fieldrag_config::AppConfig;
use fieldrag_memory::artifact::read_artifact;
use fieldrag_memory::KnowledgeBase;
use fieldrag_providers::{InferenceClient, Transport};
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 FieldRAG Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    // Config
    let config_file = super::config_file(config_path);
    if !config_file.exists() {
        println!("  ⚠️  No config file at {}; using defaults (run `fieldrag onboard`)", config_file.display());
        issues += 1;
    }
    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    // Knowledge base
    let kb = KnowledgeBase::new(config.kb_dir());
    if kb.dir().is_dir() {
        match kb.document_paths() {
            Ok(paths) if paths.is_empty() => {
                println!("  ⚠️  Knowledge base is empty: {}", kb.dir().display());
                issues += 1;
            }
            Ok(paths) => println!("  ✅ Knowledge base: {} documents", paths.len()),
            Err(e) => {
                println!("  ❌ Knowledge base unreadable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No knowledge-base directory at {}", kb.dir().display());
        issues += 1;
    }

    // Artifact
    match read_artifact(&config.artifact_location()) {
        Ok((payload, descriptor)) => println!(
            "  ✅ Memory artifact consistent (generation {}, {} chunks)",
            descriptor.generation,
            payload.chunks.len()
        ),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    // Inference backend
    issues += check_inference(&config).await;

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

async fn check_inference(config: &AppConfig) -> usize {
    let client = match InferenceClient::from_config(config) {
        Ok(client) => client,
        Err(e) => {
            println!("  ❌ Inference transport: {e}");
            return 1;
        }
    };

    let Transport::Http(http) = client.transport() else {
        println!("  ✅ In-process model selected ({})", config.model);
        return 0;
    };

    match client.health_check().await {
        Ok(true) => println!("  ✅ Ollama reachable at {}", http.base_url()),
        Ok(false) | Err(_) => {
            println!("  ❌ Ollama not reachable at {}; start it with `ollama serve`", http.base_url());
            return 1;
        }
    }

    match client.list_models().await {
        Ok(models) if models.iter().any(|m| m == &config.model) => {
            println!("  ✅ Model available: {}", config.model);
            0
        }
        Ok(_) => {
            println!("  ⚠️  Model {} not pulled; run `ollama pull {}`", config.model, config.model);
            1
        }
        Err(e) => {
            println!("  ⚠️  Could not list models: {e}");
            1
        }
    }
}
