// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::disallowed_macros)]

use clap::{Parser, Subcommand};
use logyard_cli::{add_drain, delete_drain, list_drains, merge_uri_params, run_stream};

fn default_server() -> String {
    std::env::var("LOGYARD_AGENT_URL").unwrap_or_else(|_| "http://127.0.0.1:4510".to_string())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Logyard drain management CLI", long_about = None)]
struct Cli {
    /// Agent control API base URL
    #[arg(long, global = true, default_value_t = default_server())]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a drain
    Add {
        /// Drain name
        name: String,
        /// Drain URI, e.g. tcp://host:514
        #[arg(long = "uri")]
        uri: String,
        /// Topic filter prefix (repeatable)
        #[arg(long = "filter")]
        filter: Vec<String>,
        /// Extra drain parameter as key=value (repeatable)
        #[arg(short = 'o')]
        opt: Vec<String>,
    },
    /// Remove a drain
    Delete {
        /// Drain name
        name: String,
    },
    /// List registered drains
    List,
    /// Stream matching messages to this terminal until interrupted
    Stream {
        /// Print raw message bodies instead of a rendered, colorized line
        #[arg(long)]
        raw: bool,
        /// Topic filter prefixes to subscribe to (none means everything)
        filter: Vec<String>,
    },
}

fn parse_opt(raw: &str) -> anyhow::Result<(String, String)> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| anyhow::anyhow!("invalid -o value {raw:?}, expected key=value"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Add { name, uri, filter, opt } => {
            let params = opt.iter().map(|s| parse_opt(s)).collect::<anyhow::Result<Vec<_>>>()?;
            let merged_uri = merge_uri_params(&uri, &filter, &params);
            if let Err(e) = add_drain(&cli.server, &name, &merged_uri).await {
                eprintln!("failed to add drain {name}: {e}");
                std::process::exit(1);
            }
            println!("added drain {name}");
        },
        Commands::Delete { name } => {
            if let Err(e) = delete_drain(&cli.server, &name).await {
                eprintln!("failed to delete drain {name}: {e}");
                std::process::exit(1);
            }
            println!("deleted drain {name}");
        },
        Commands::List => {
            let drains = match list_drains(&cli.server).await {
                Ok(drains) => drains,
                Err(e) => {
                    eprintln!("failed to list drains: {e}");
                    std::process::exit(1);
                },
            };
            for drain in drains {
                println!("{}\t{}", drain.name, drain.uri);
            }
        },
        Commands::Stream { raw, filter } => {
            if let Err(e) = run_stream(&cli.server, &filter, raw).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
