// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! `jobsworth`: a small reference binary built against the `jobsworth-*`
//! crates — runs a demo server, seeds or inspects jobs against it.

mod commands;
mod config;
mod demo;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::ServerConfig;

#[derive(Parser)]
#[command(name = "jobsworth")]
#[command(about = "A distributed background-job processor")]
#[command(version)]
struct Cli {
    /// Log level passed to `tracing_subscriber`'s `EnvFilter` (e.g. "debug",
    /// "jobsworth_server=trace,info").
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a `BackgroundJobServer` in the foreground until interrupted.
    Serve {
        #[command(flatten)]
        server: ServerConfig,

        /// Enqueue a demo greeting job for `name` at startup.
        #[arg(long)]
        seed: Option<String>,
    },
    /// Enqueue a single demo job against a fresh in-memory store.
    EnqueueDemo {
        /// Name to greet.
        name: String,
    },
    /// Print a job-count breakdown against a fresh in-memory store.
    Status {
        /// Emit machine-readable JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(cli.log_level).init();

    match cli.command {
        Commands::Serve { server, seed } => commands::serve::run(server, seed).await,
        Commands::EnqueueDemo { name } => commands::enqueue_demo::run(&name).await,
        Commands::Status { json } => commands::status::run(json).await,
    }
}
