use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use voxroute::api::ApiClient;
use voxroute::config::Config;
use voxroute::context::TerminalContextTracker;
use voxroute::host::WorkspaceHost;
use voxroute::router::{RouteOutcome, Router, RouterOptions, UnhandledReason};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voxroute=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn describe(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Handled { tool, turns, .. } => {
            format!("handled ({tool}, {turns} turn(s))")
        }
        RouteOutcome::Unhandled {
            reason: UnhandledReason::NoToolCall,
            ..
        } => "unhandled (no tool call)".to_string(),
        RouteOutcome::Unhandled {
            reason: UnhandledReason::TurnBudgetExhausted,
            turns,
        } => format!("unhandled (turn budget of {turns} exhausted)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load()?;
    config.validate()?;

    let transport = Arc::new(ApiClient::new(&config)?);
    let host = Arc::new(WorkspaceHost::new(
        config.working_dir.clone(),
        config.handoff.clone(),
    ));
    let terminals = Arc::new(TerminalContextTracker::new());
    let router = Router::new(
        transport,
        host.clone(),
        terminals.clone(),
        config.handoff.clone(),
        RouterOptions::from_config(&config),
    );

    let utterance = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !utterance.trim().is_empty() {
        let outcome = router.route(utterance.trim()).await?;
        println!("{}", describe(&outcome));
        if !outcome.is_handled() {
            std::process::exit(2);
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        // `$ <command>` runs a shell command so later requests can see its output.
        if let Some(command_line) = utterance.strip_prefix('$') {
            match host.run_in_terminal(&terminals, command_line.trim()) {
                Ok(capture) => capture.join().await,
                Err(error) => eprintln!("error: {error:#}"),
            }
            continue;
        }
        match router.route(utterance).await {
            Ok(outcome) => println!("{}", describe(&outcome)),
            Err(error) => eprintln!("error: {error}"),
        }
    }

    Ok(())
}
