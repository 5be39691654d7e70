use clap::Parser;
use tokio::signal;
use tracing::info;

use edgewatch::cli::{self, Cli};
use edgewatch::core::service::ShutdownController;
use edgewatch::error::Error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let controller = ShutdownController::new();
    let shutdown = controller.signal();

    let exit_code = tokio::select! {
        result = cli::execute(cli, shutdown) => match result {
            Ok(()) => 0,
            Err(Error::Cancelled) => 0,
            Err(e) => {
                eprintln!("error: {e}");
                e.exit_code()
            }
        },
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
            controller.trigger();
            // Give components a moment to unwind at their next suspension
            // point before the process exits.
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            0
        }
    };

    std::process::exit(exit_code);
}
