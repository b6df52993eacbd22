use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use db_sync::db::executor::failed_results;
use db_sync::utils::logging::init_logging;
use db_sync::{config, Difference, ExecutionSummary, SyncClient, TracingLog};

#[derive(Parser)]
#[command(name = "db_sync")]
#[command(about = "Bring a target MySQL database in line with a source database", long_about = None)]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Answer yes to every prompt
    #[arg(long)]
    yes: bool,

    /// Print the statements and stop
    #[arg(long)]
    dry_run: bool,

    /// Print the difference as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run ended in a consistent target
async fn run(cli: Cli) -> Result<bool> {
    let config = config::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    let client = SyncClient::new(config)
        .await
        .context("Failed to connect to databases")?;

    let difference = client.compare().await.context("Comparison failed")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&difference)?);
    } else {
        print_summary(&difference);
    }

    if difference.is_empty() {
        println!("Databases are already in sync.");
        client.close().await;
        return Ok(true);
    }

    if !cli.yes && !confirm("Generate SQL statements?")? {
        client.close().await;
        return Ok(true);
    }

    let statements = client
        .generate_statements(&difference)
        .await
        .context("Statement generation failed")?;

    println!("\n{} statement(s) to execute:", statements.len());
    for statement in &statements {
        println!("  {}", statement);
    }

    if cli.dry_run {
        client.close().await;
        return Ok(true);
    }

    if !cli.yes && !confirm("Execute these statements against the target?")? {
        client.close().await;
        return Ok(true);
    }

    let results = client.apply_statements(&statements, &TracingLog).await;
    let summary = ExecutionSummary::from_results(&results);
    println!(
        "\nExecuted {} statement(s): {} succeeded, {} failed",
        summary.total, summary.succeeded, summary.failed
    );
    for failed in failed_results(&results) {
        println!(
            "  FAILED: {}\n    {}",
            failed.statement,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }

    let verification = client.verify().await.context("Verification failed")?;
    println!("\n{}", verification.message);

    client.close().await;
    Ok(verification.passed)
}

fn print_summary(difference: &Difference) {
    println!("Structure differences: {}", difference.structure_differences.len());
    for structure in &difference.structure_differences {
        if structure.is_new_table {
            println!("  {} (new table)", structure.table_name);
        } else {
            println!(
                "  {}: +{} -{} ~{} columns, +{} -{} indexes",
                structure.table_name,
                structure.columns_added.len(),
                structure.columns_deleted.len(),
                structure.columns_modified.len(),
                structure.indexes_added.len(),
                structure.indexes_deleted.len()
            );
        }
    }

    println!("Data differences: {}", difference.data_differences.len());
    for data in difference.data_differences.values() {
        println!(
            "  {}: {} insert(s), {} update(s), {} delete(s)",
            data.table_name,
            data.rows_to_insert.len(),
            data.rows_to_update.len(),
            data.rows_to_delete.len()
        );
    }

    println!("View differences: {}", difference.view_differences.len());
    for view in &difference.view_differences {
        println!("  {} ({})", view.view_name, view.operation);
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("\n{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
