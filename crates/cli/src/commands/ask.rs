//! `fieldrag ask`: single-question or interactive mode.

use fieldrag_agent::RagPipeline;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>, question: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let pipeline = RagPipeline::from_config(&config)?;

    // Fail fast on a missing or corrupt artifact
    pipeline.ensure_session().await?;

    if let Some(question) = question {
        eprint!("  Thinking...");
        let answer = pipeline.answer(&question).await?;
        eprint!("\r              \r");
        println!("{answer}");
        return Ok(());
    }

    println!();
    println!("  FieldRAG: Interactive Mode");
    println!("  Model:      {}", config.model);
    println!("  Transport:  {}", pipeline.inference().transport().name());
    println!("  Generation: {}", pipeline.session_generation().await.unwrap_or_default());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let answer = pipeline.answer(question).await;
        eprint!("\r     \r");
        match answer {
            Ok(answer) => {
                println!();
                for line in answer.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}
