use std::time::Duration;

use clap::{Parser, Subcommand};

mod cli;
mod mcp;
mod render;

use crate::cli::{ScanArgs, init_tracing_cli, init_tracing_server, run_list, run_watch};
use crate::mcp::run_server;

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan once and print every TODO grouped by file
    List {
        #[command(flatten)]
        scan: ScanArgs,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep scanning: reprint the list whenever files change
    Watch {
        #[command(flatten)]
        scan: ScanArgs,
        /// Print each tree as JSON
        #[arg(long)]
        json: bool,
        /// Quiet period after a file event before rescanning, in milliseconds
        #[arg(long = "settle-ms", default_value_t = 500)]
        settle_ms: u64,
    },
    /// Run MCP server over stdio
    Server {
        #[command(flatten)]
        scan: ScanArgs,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "todos",
    about = "todo_tracker: live list of // TODO: comments, grouped by file",
    version,
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::List { scan, json } => {
            init_tracing_cli();
            run_list(scan, json).await?;
        }
        Command::Watch {
            scan,
            json,
            settle_ms,
        } => {
            init_tracing_cli();
            run_watch(scan, Duration::from_millis(settle_ms), json).await?;
        }
        Command::Server { scan } => {
            // For MCP server, never log to stdout; optionally log to a file
            // if TODO_TRACKER_LOG_PATH is set.
            init_tracing_server();
            run_server(scan).await?;
        }
    }

    Ok(())
}
