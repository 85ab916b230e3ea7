//! # Reconciler CLI
//!
//! The same binary runs the reconciler and queries a running instance through its
//! inspection API (default `127.0.0.1:8080`). Use `--host` and `--port` to point at a
//! remote instance.
//!
//! ```sh
//! $ bgp-reconciler run ./conf/reconciler.toml
//! $ bgp-reconciler show replays
//!  Started              Duration  State                 Succeeded  Stale  Cleared
//! ---------------------+----------+---------------------+-----------+-------+---------
//!  2026-03-02 10:41:07  00:02:01  Done                  yes        12     3
//! $ bgp-reconciler show history --limit 20
//! $ bgp-reconciler show stale
//! $ bgp-reconciler show state
//! ```
mod display;
mod table;

use clap::{Parser, Subcommand};
use colored::*;
use itertools::Itertools;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};

use bgp_reconciler::api::InspectApiClient;

use display::{ReplaySummaryRow, StaleRouteRow, UpdateEntryRow};
use table::OutputTable;

#[derive(Parser, Debug)]
#[clap(name = "bgp-reconciler", rename_all = "kebab-case")]
/// Reconcile BGP daemon state after restarts and ownership changes
pub struct Args {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Host address of a running reconciler
    #[clap(short, long, default_value = "127.0.0.1", global = true)]
    pub host: String,
    /// Port of the inspection API
    #[clap(short, long, default_value = "8080", global = true)]
    pub port: u16,
    /// Show debug logs (additional v adds trace logging)
    #[clap(short, parse(from_occurrences), global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the reconciler
    Run(RunOptions),
    /// View details of a running reconciler
    #[clap(subcommand)]
    Show(Show),
}

#[derive(Parser, Debug)]
pub struct RunOptions {
    /// Path to the reconciler config file
    pub config_path: String,
}

#[derive(Subcommand, Debug)]
pub enum Show {
    /// Completed replay jobs, oldest first
    Replays,
    /// Recently received route updates
    History(HistoryOptions),
    /// Routes still awaiting refresh after the last replay
    Stale,
    /// Current replay state and connection status
    State,
}

#[derive(Parser, Debug)]
pub struct HistoryOptions {
    /// Only show the most recent N updates
    #[clap(short, long)]
    pub limit: Option<usize>,
}

pub async fn query_reconciler(args: &Args) {
    let base_url = format!("http://{}:{}/", args.host, args.port);
    let client = match HttpClientBuilder::default().build(&base_url) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{}", format!("Cannot create client for {}: {}", base_url, err).red());
            return;
        }
    };
    if let Err(err) = run_cmd(&client, &args.cmd).await {
        eprintln!("{}", format!("Error querying {}: {}", base_url, err).red());
    }
}

async fn run_cmd(client: &HttpClient, cmd: &Command) -> Result<(), jsonrpsee::core::Error> {
    let show = match cmd {
        Command::Show(show) => show,
        Command::Run(_) => return Ok(()),
    };
    match show {
        Show::Replays => {
            let replays = client.show_replays().await?;
            if replays.is_empty() {
                println!("No replays have completed yet");
                return Ok(());
            }
            OutputTable::from_rows(replays.into_iter().map(ReplaySummaryRow)).print();
        }
        Show::History(options) => {
            let updates = client.show_update_history(options.limit).await?;
            if updates.is_empty() {
                println!("No updates received");
                return Ok(());
            }
            for (rd, entries) in updates
                .into_iter()
                .sorted_by(|a, b| a.rd.cmp(&b.rd))
                .group_by(|update| update.rd.clone())
                .into_iter()
            {
                OutputTable::from_rows(entries.map(UpdateEntryRow)).print_section(&rd);
            }
        }
        Show::Stale => {
            let routes = client.show_stale_routes().await?;
            if routes.is_empty() {
                println!("No stale routes");
                return Ok(());
            }
            for (rd, routes) in routes
                .into_iter()
                .group_by(|route| route.rd.clone())
                .into_iter()
            {
                OutputTable::from_rows(routes.map(StaleRouteRow)).print_section(&rd);
            }
        }
        Show::State => {
            let status = client.show_replay_state().await?;
            let owner = if status.owner {
                "owner".green()
            } else {
                "standby".yellow()
            };
            let connected = if status.connected {
                "connected".green()
            } else {
                "disconnected".red()
            };
            println!("Reconciler is {}, daemon {}", owner, connected);
            println!(
                "  Replay state: {}",
                status.state.as_deref().unwrap_or("Idle")
            );
            if status.cleanup_pending {
                println!(
                    "  Stale cleanup pending for {} routes",
                    status.stale_routes
                );
            } else {
                println!("  Stale routes: {}", status.stale_routes);
            }
            match status.last_succeeded {
                Some(true) => println!("  Last replay {}", "succeeded".green()),
                Some(false) => println!("  Last replay {}", "failed".red()),
                None => println!("  No replay has completed yet"),
            }
        }
    }
    Ok(())
}
