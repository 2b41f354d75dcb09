//! Intent compilation and retrieval commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use assetrag_core::IntentResult;
use assetrag_graph::{Retriever, Settings};

use crate::output;

#[derive(Args)]
pub struct CompileArgs {
    /// Classifier output: {"intent": "31", "slots": [...]}
    pub intent: PathBuf,

    /// Print the template as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct AskArgs {
    /// Classifier output: {"intent": "31", "slots": [...]}
    pub intent: PathBuf,

    /// Original user question, passed through to the generator input
    #[arg(short, long)]
    pub query: Option<String>,

    /// Give up on retrieval after this many seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

fn read_intent(path: &Path) -> Result<IntentResult> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read intent file {}", path.display()))?;
    Ok(IntentResult::from_json_str(&payload))
}

pub fn compile(args: CompileArgs) -> Result<()> {
    let intent = read_intent(&args.intent)?;
    let template = assetrag_core::compile(intent.intent, &intent.slots)
        .with_context(|| format!("Cannot compile intent {}", intent.intent))?;

    match template {
        None => println!(
            "{} {}",
            intent.intent.display_name().cyan(),
            "(answered without graph context)".dimmed()
        ),
        Some(template) if args.json => println!("{}", serde_json::to_string_pretty(&template)?),
        Some(template) => output::print_template(&template),
    }
    Ok(())
}

pub async fn ask(args: AskArgs, settings: &Settings) -> Result<()> {
    let intent = read_intent(&args.intent)?;
    let client = super::connect(settings).await?;
    let retriever = Retriever::new(client);

    let query_text = args.query.unwrap_or_default();
    let input = tokio::time::timeout(
        Duration::from_secs(args.timeout),
        retriever.retrieve(&query_text, &intent),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Retrieval timed out after {}s", args.timeout))?;

    println!("{}", serde_json::to_string_pretty(&input)?);
    Ok(())
}
