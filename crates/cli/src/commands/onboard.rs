//! `fieldrag onboard`: first-time setup.

use fieldrag_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_file = super::config_file(config_path);

    println!("📚 FieldRAG: First-Time Setup");
    println!("=============================\n");

    if let Some(parent) = config_file.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir(parent, "data directory")?;
    }

    // Existing config wins, so its directories are the ones created
    let config = if config_file.exists() {
        super::load_config(config_path)?
    } else {
        AppConfig::default()
    };
    create_dir(&config.kb_dir(), "knowledge-base directory")?;
    create_dir(&config.artifact_dir(), "artifact directory")?;

    if config_file.exists() {
        println!("\n⚠️  Config already exists at: {}", config_file.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_file, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_file.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Copy your .txt documents into {}", config.kb_dir().display());
    println!("   2. Run: fieldrag encode");
    println!("   3. Run: fieldrag ask \"your question\"\n");

    Ok(())
}

fn create_dir(dir: &Path, label: &str) -> std::io::Result<()> {
    if dir.exists() {
        println!("  {label} exists: {}", dir.display());
    } else {
        std::fs::create_dir_all(dir)?;
        println!("✅ Created {label}: {}", dir.display());
    }
    Ok(())
}
