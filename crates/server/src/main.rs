//! `micro-echo` command line server
//!
//! Parses the command line, installs the log subscriber and runs the accept loop
//! on a single-threaded runtime until interrupted.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use micro_echo_http::server::{Server, ServerConfig};
use micro_echo_http::transport::ListenAddr;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(cli.log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(cause = %e, "invalid arguments");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(cause = %e, "failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(serve(&config));
    remove_socket_file(&config);
    code
}

async fn serve(config: &ServerConfig) -> ExitCode {
    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        () = server.run() => ExitCode::SUCCESS,
        () = shutdown_signal() => {
            info!("shutting down");
            ExitCode::SUCCESS
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!(cause = %e, "failed to install SIGTERM handler");
            wait_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        () = wait_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(cause = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn remove_socket_file(config: &ServerConfig) {
    if let ListenAddr::Unix(path) = &config.listen
        && let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        error!(cause = %e, path = %path.display(), "failed to remove socket file");
    }
}
