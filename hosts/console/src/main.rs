use std::{env, io::Write, sync::Arc};

use farmacia_client::{ClientConfig, HttpBackend};
use farmacia_domain::{Error, RejectReason};
use tokio::io::{AsyncBufReadExt, BufReader};

mod commands;
mod render;
mod screens;

use commands::ConsoleCommand;
use screens::AnyScreen;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = ClientConfig::from_env();
    let workflow = env::var("FARMACIA_WORKFLOW").unwrap_or("entrada".to_string());
    let backend = Arc::new(HttpBackend::new(&config)?);

    let mut screen = match workflow.as_str() {
        "entrada" => AnyScreen::entry(backend.clone(), config.timeout),
        "salida" => AnyScreen::dispense(backend.clone(), config.timeout),
        "carga" => AnyScreen::bulk(backend.clone(), config.timeout),
        other => anyhow::bail!("Unknown FARMACIA_WORKFLOW {}, expected entrada, salida or carga", other),
    };

    tracing::info!("Pharmacy console ({}) against {}", workflow, backend.base_url());
    if config.csrf_token.is_none() {
        tracing::warn!("FARMACIA_CSRF_TOKEN is not set, saves will likely be refused");
    }
    println!("{}", commands::help());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&workflow);

    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = screen.run(command).await {
                    println!("Error: {}", describe(&e));
                }
            }
            // Usage errors and `help` output alike
            Err(e) => print!("{}", e),
        }
        prompt(&workflow);
    }

    Ok(())
}

fn prompt(workflow: &str) {
    print!("{}> ", workflow);
    let _ = std::io::stdout().flush();
}

/// Operator-facing text: backend messages verbatim, validation as-is.
fn describe(e: &anyhow::Error) -> String {
    if let Some(err) = e.downcast_ref::<Error>() {
        return err.operator_message();
    }
    if let Some(reason) = e.downcast_ref::<RejectReason>() {
        return reason.to_string();
    }
    format!("{:#}", e)
}
