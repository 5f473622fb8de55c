use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use adiwiyata_core_sdk::{
    client::{Conversation, RelayClient},
    config::{self, RelayConfig, ServerConfig},
    server, telemetry,
};

/**
 * \brief CLI entry: runs the chat relay or talks to one from the terminal.
 */
#[derive(Parser, Debug)]
#[command(name = "adiwiyata", version, about = "Adiwiyata chat relay")]
struct Cli {
    /** \brief Emit logs as JSON lines. */
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief Start the relay HTTP server. Flags override RELAY_* environment variables.
     */
    Serve {
        #[arg(long)]
        addr: Option<String>,
        /** \brief Built web app to serve next to the API. */
        #[arg(long)]
        static_dir: Option<PathBuf>,
        #[arg(long)]
        upstream_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /**
     * \brief Chat through a running relay; falls back to canned replies when it fails.
     */
    Chat {
        #[arg(long, default_value = "http://127.0.0.1:3000/api/groq-chat")]
        relay_url: String,
        /** \brief One-shot prompt; without it lines are read from stdin. */
        #[arg(long)]
        prompt: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs);

    match cli.command {
        Commands::Serve {
            addr,
            static_dir,
            upstream_url,
            model,
            timeout_secs,
        } => {
            let mut relay = RelayConfig::from_env().context("load relay config failed")?;
            if let Some(url) = upstream_url {
                relay.upstream_url = url;
            }
            if let Some(model) = model {
                relay.default_model = model;
            }
            if let Some(secs) = timeout_secs {
                relay.timeout = Duration::from_secs(secs);
            }

            let mut server_cfg = ServerConfig::from_env();
            if let Some(addr) = addr {
                server_cfg.addr = addr;
            }
            if static_dir.is_some() {
                server_cfg.static_dir = static_dir;
            }

            server::run(&server_cfg, relay).await?;
        }
        Commands::Chat { relay_url, prompt } => {
            let client = RelayClient::new(
                relay_url,
                Duration::from_secs(config::DEFAULT_TIMEOUT_SECS * 2),
            )
            .context("create relay client failed")?;
            let mut conversation = Conversation::new();

            match prompt {
                Some(prompt) => {
                    if let Some(turn) = client.send_turn(&mut conversation, &prompt).await {
                        println!("{}", turn.reply);
                    }
                }
                None => {
                    println!("{}", conversation.messages()[0].content);
                    let mut lines = BufReader::new(tokio::io::stdin()).lines();
                    while let Some(line) = lines.next_line().await.context("read stdin failed")? {
                        if line.trim() == "/clear" {
                            conversation.clear();
                            println!("{}", conversation.messages()[0].content);
                            continue;
                        }
                        if let Some(turn) = client.send_turn(&mut conversation, &line).await {
                            let marker = if turn.fallback { " (demo)" } else { "" };
                            println!("\nAI{}: {}\n", marker, turn.reply);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
