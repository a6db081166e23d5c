//! Headless receipt scanner
//!
//! Loads the model, scans the image given on the command line and prints the
//! model's answer.

use std::process::ExitCode;

use recibos::inference::{LoadOutcome, LocalVlmProvider, ProcessOutcome};
use recibos::storage::settings::load_settings;
use recibos::ReceiptScanner;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> ExitCode {
    recibos::init_tracing();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("uso: recibos <imagen-del-recibo>");
        return ExitCode::FAILURE;
    };

    let settings = load_settings();
    let provider = match LocalVlmProvider::new(&settings) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let scanner = ReceiptScanner::new(provider, settings.scan_config());

    // Stand-in for the UI: render every progress change
    let mut changes = scanner.subscribe();
    let observer = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(state) if !state.loading_progress.is_empty() && !state.load_failed => {
                    tracing::info!("Downloading model… {}", state.loading_progress);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Observer skipped {} state changes", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let image = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Cannot read {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    if settings.auto_load_model {
        if let LoadOutcome::Failed(message) = scanner.load_model().await {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    } else {
        tracing::warn!("auto_load_model is disabled; {} was not loaded", scanner.model_id());
    }

    // Same gate a UI applies to its "analyse" button
    if !scanner.state().can_process() {
        eprintln!("El modelo no está listo");
        return ExitCode::FAILURE;
    }

    let outcome = scanner.process_receipt(image).await;
    observer.abort();

    match outcome {
        ProcessOutcome::Completed(result) => {
            println!("{}", result.text());
            if result.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        ProcessOutcome::NotReady | ProcessOutcome::Busy => {
            eprintln!("No se pudo iniciar el análisis");
            ExitCode::FAILURE
        }
    }
}
