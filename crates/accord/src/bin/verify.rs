//! Accord Provider Verifier CLI Tool
//!
//! Loads one or more contract files and replays their interactions
//! against a running provider, reporting per-interaction results.
//!
//! Usage:
//!   accord-verify --provider-url http://localhost:8080 \
//!       --pact-file pacts/order_consumer-address_provider.json
//!
//! Features:
//! - Verifies any number of contract files in one run
//! - Posts provider states to a configurable state endpoint
//! - Prints per-interaction pass/fail with rule-level mismatches
//! - Exits non-zero when any interaction fails

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use accord::{ContractStore, InteractionOutcome, VerificationRunner};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Accord Provider Verifier - Honor your consumer contracts
#[derive(Parser, Debug)]
#[command(name = "accord-verify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the provider under verification
    #[arg(short, long)]
    provider_url: String,

    /// Endpoint receiving provider state callbacks (POST {"state": "..."})
    #[arg(short = 's', long)]
    provider_states_url: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Contract file(s) to verify
    #[arg(short = 'f', long = "pact-file", required = true, num_args = 1..)]
    contracts: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    println!("{BOLD}{CYAN}Accord Provider Verifier{RESET}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Provider URL: {}", args.provider_url);
    println!();

    let mut runner =
        VerificationRunner::new(&args.provider_url).timeout(Duration::from_secs(args.timeout));
    if let Some(url) = &args.provider_states_url {
        runner = runner.provider_states(url);
    }

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;

    for path in &args.contracts {
        let contract = ContractStore::load_file(path)?;
        println!(
            "{}Contract:{} {} -> {} {DIM}({}){RESET}",
            BOLD,
            RESET,
            contract.consumer,
            contract.provider,
            path.display()
        );

        let report = runner.verify(&contract).await?;
        for result in &report.results {
            match &result.outcome {
                InteractionOutcome::Passed => {
                    passed += 1;
                    println!("   {GREEN}✓{RESET} {}", result.id);
                }
                InteractionOutcome::Failed(failures) => {
                    failed += 1;
                    println!("   {RED}✗{RESET} {}", result.id);
                    for failure in failures {
                        println!("      {DIM}{failure}{RESET}");
                    }
                }
                InteractionOutcome::StateSetupFailed(reason) => {
                    failed += 1;
                    println!("   {RED}✗{RESET} {} {DIM}(state setup: {reason}){RESET}", result.id);
                }
                InteractionOutcome::TransportFailed(reason) => {
                    failed += 1;
                    println!("   {RED}✗{RESET} {} {DIM}(transport: {reason}){RESET}", result.id);
                }
            }
        }
        if report.skipped > 0 {
            skipped += report.skipped;
            println!(
                "   {YELLOW}!{RESET} {} interaction(s) skipped after state failure",
                report.skipped
            );
        }
        println!();
    }

    println!("{BOLD}Summary{RESET}");
    println!("  {GREEN}Passed:  {passed}{RESET}");
    println!("  {RED}Failed:  {failed}{RESET}");
    println!("  {YELLOW}Skipped: {skipped}{RESET}");

    if failed > 0 || skipped > 0 {
        std::process::exit(1);
    }
    Ok(())
}
