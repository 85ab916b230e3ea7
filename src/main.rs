mod cli;

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use log::{debug, info, LevelFilter};

use bgp_reconciler::api::{serve_inspect_api, UpdateService};
use bgp_reconciler::config::{ConfigTreeWriter, FileConfigWriter, ServerConfig};
use bgp_reconciler::daemon::JsonRpcDaemonClient;
use bgp_reconciler::fib::MemoryFib;
use bgp_reconciler::ownership::{InboundService, StaticOwnership};
use bgp_reconciler::{Collaborators, ReconciliationEngine};

use cli::{query_reconciler, Args, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (reconciler_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("bgp_reconciler"), reconciler_level)
        .filter(None, other_level)
        .init();

    match &args.cmd {
        Command::Run(options) => run(&options.config_path).await,
        Command::Show(_) => {
            query_reconciler(&args).await;
            Ok(())
        }
    }
}

async fn run(config_path: &str) -> Result<(), Box<dyn Error>> {
    info!("Logging at levels {}", log::max_level());
    let config = ServerConfig::from_file(config_path)?;
    debug!(
        "Found {} peers and {} VRFs in {}",
        config.bgp.peers.len(),
        config.bgp.vrfs.len(),
        config_path
    );
    let settings = config.settings.clone();

    let fib = Arc::new(MemoryFib::new());
    let config_writer = settings.status_path.as_deref().map(|path| {
        info!("Publishing replay status to {}", path);
        Arc::new(FileConfigWriter::new(path)) as Arc<dyn ConfigTreeWriter>
    });
    let collaborators = Collaborators {
        daemon: Arc::new(JsonRpcDaemonClient::new(settings.rpc_timeout)),
        fib: fib.clone(),
        overlay: fib,
        ownership: Arc::new(StaticOwnership::new(settings.standalone_owner)),
        config_writer,
    };
    let engine = Arc::new(ReconciliationEngine::new(
        settings.clone(),
        config.bgp,
        collaborators,
    ));

    let inspect = serve_inspect_api(engine.clone(), settings.inspect_listen).await?;
    let updates: Arc<dyn InboundService> =
        Arc::new(UpdateService::new(engine.clone(), settings.update_listen));
    let watcher = engine.clone().watch_ownership(Some(updates.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Stopping reconciler...");
    watcher.abort();
    updates.stop().await;
    engine.shutdown().await;
    if let Ok(handle) = inspect.stop() {
        handle.await.ok();
    }
    Ok(())
}
