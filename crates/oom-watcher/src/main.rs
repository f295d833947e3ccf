use anyhow::Result;
use clap::Parser;
use oom_watcher::app::Application;
use oom_watcher::config::Cli;
use oom_watcher::config::Commands;
use oom_watcher::config::DaemonArgs;
use oom_watcher::logging;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard = logging::init();

    tracing::info!("Starting oom-watcher daemon {}", env!("CARGO_PKG_VERSION"));

    let app = Application::new(daemon_args);
    tracing::debug!(args = ?app.daemon_args(), "Daemon configuration");
    app.run().await
}
