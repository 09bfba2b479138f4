use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::time::sleep;

use cachebox::config::app_config::{ProbeTarget, load_config};
use cachebox::format::ReportPrinter;
use cachebox::mimir::{client::send_to_mimir, create_report_metrics};
use cachebox::prelude::*;

enum TargetOutcome {
    Passed,
    Failed,
    /// A one-shot run stopped by Ctrl-C before every case was sent.
    Interrupted,
    Misconfigured,
}

const INTERRUPTED_EXIT: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app_config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::from(2);
        }
    };

    let metrics_client = match Client::builder()
        .timeout(Duration::from_secs(5))
        .user_agent(concat!("cachebox/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("fatal: failed to create metrics client: {e}");
            return ExitCode::from(2);
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel_tx = Arc::new(cancel_tx);
    {
        let cancel_tx = Arc::clone(&cancel_tx);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::info!("Interrupted, cancelling remaining probes");
                    cancel_tx.send_replace(true);
                }
                Err(e) => log::warn!("Cannot listen for Ctrl-C: {e}"),
            }
        });
    }

    let mut handles = vec![];
    for target in app_config.targets {
        let width = app_config.max_target_width;
        let mimir_endpoint = app_config.mimir_endpoint.clone();
        let metrics_client = metrics_client.clone();
        let cancel = cancel_rx.clone();

        handles.push(tokio::spawn(async move {
            run_target(target, width, mimir_endpoint, metrics_client, cancel).await
        }));
    }

    let mut failed = false;
    let mut misconfigured = false;
    let mut interrupted = false;
    for handle in handles {
        match handle.await {
            Ok(TargetOutcome::Passed) => {}
            Ok(TargetOutcome::Failed) => failed = true,
            Ok(TargetOutcome::Interrupted) => interrupted = true,
            Ok(TargetOutcome::Misconfigured) => misconfigured = true,
            Err(e) => {
                log::error!("Probe task failed: {e}");
                failed = true;
            }
        }
    }
    drop(cancel_tx);

    if misconfigured {
        ExitCode::from(2)
    } else if failed {
        ExitCode::FAILURE
    } else if interrupted {
        ExitCode::from(INTERRUPTED_EXIT)
    } else {
        ExitCode::SUCCESS
    }
}

/// Probes one target once, or on its polling interval until cancelled.
async fn run_target(
    target: ProbeTarget,
    width: usize,
    mimir_endpoint: Option<String>,
    metrics_client: Client,
    mut cancel: watch::Receiver<bool>,
) -> TargetOutcome {
    let runner = CacheProbeRunner::new(target.options.clone());
    let printer = ReportPrinter::new(&target.name, width, runner.options().numeric_field.as_ref());
    let mut history = EtagHistory::default();

    loop {
        let report = match runner
            .run_until_cancelled(&target.endpoint, &target.cases, cancel.clone())
            .await
        {
            Ok(report) => report,
            Err(e) => {
                println!("[{}] ❌ Probe error for {}: {e}", target.name, target.endpoint);
                return TargetOutcome::Misconfigured;
            }
        };
        let summary = runner.summarize_with_history(&report, &mut history);
        print!("{}", printer.render(&report, &summary));

        if let Some(mimir) = &mimir_endpoint {
            let metrics = create_report_metrics(&target.name, &report, &summary);
            if let Err(e) = send_to_mimir(
                &metrics_client,
                mimir,
                target.organisation_id.as_deref(),
                metrics,
            )
            .await
            {
                log::error!("[{}] Failed to send metrics: {e}", target.name);
            }
        }

        let Some(interval) = target.polling_interval else {
            return if report.cancelled() {
                TargetOutcome::Interrupted
            } else if summary.passed() {
                TargetOutcome::Passed
            } else {
                TargetOutcome::Failed
            };
        };
        // stopping a watch loop is the normal way out
        if report.cancelled() {
            return TargetOutcome::Passed;
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = cancel.wait_for(|cancelled| *cancelled) => return TargetOutcome::Passed,
        }
    }
}
