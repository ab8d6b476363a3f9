use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use sinuscheck_common::Error;
use sinuscheck_core::{ControlPlaneClient, Ts3PresenceProbe, Verifier};

mod args;
use args::Args;

const EXIT_FAILED: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sinuscheck=info"));
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("Could not start verification: {}", e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, Error> {
    let config = args.verifier_config();
    config.validate()?;
    let credentials = args.credentials()?;

    info!(
        "Verifying control plane {} against {}:{} (nickname {:?})",
        config.control_plane.base_url,
        config.voice_server.host,
        config.voice_server.query_port,
        config.instance.nickname
    );

    let verifier = Verifier::new(
        ControlPlaneClient::new(&config.control_plane),
        Ts3PresenceProbe::new(config.voice_server.clone()),
        credentials,
        &config,
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            return;
        }
        info!("Ctrl-C detected; cancelling verification...");
        trigger.cancel();
    });

    match verifier.run(&shutdown).await {
        Ok(report) => {
            info!(
                "All checks passed: instance {} of bot {} is on the voice server as {:?}",
                report.instance, report.bot_id, report.matched_nickname
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) if failure.is_cancelled() => {
            error!("Verification cancelled during {}", failure.stage);
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(failure) => {
            error!("Failed at {}: {}", failure.stage, failure);
            Ok(ExitCode::from(EXIT_FAILED))
        }
    }
}
