//! Terminal front end for the relay: one line in, one streamed reply out.
use std::{io::Write, time::Duration};

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use support_relay::client::{ClientError, Conversation, RelayClient};

#[derive(Parser, Debug)]
#[command(name = "support-chat", about = "Chat with the support relay from a terminal")]
struct Cli {
    /// Relay origin
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Send the whole conversation with every turn
    #[arg(long)]
    history: bool,

    /// Give up on a reply after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let mut client = RelayClient::new(&cli.url).with_history(cli.history);
    if let Some(secs) = cli.timeout {
        client = client.with_timeout(Duration::from_secs(secs))?;
    }

    let mut conversation = Conversation::new();
    if let Some(greeting) = conversation.last() {
        println!("assistant> {}", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(mut input) = lines.next_line().await? else {
            break;
        };
        if input.trim().is_empty() {
            continue;
        }

        let mut printed = 0;
        print!("assistant> ");
        let result = client
            .send(&mut conversation, &mut input, |conv| {
                // Print only what arrived since the last update.
                if let Some(reply) = conv.last() {
                    if reply.content.len() > printed {
                        print!("{}", &reply.content[printed..]);
                        let _ = std::io::stdout().flush();
                        printed = reply.content.len();
                    }
                }
            })
            .await;
        println!();

        match result {
            Ok(()) => {}
            Err(ClientError::Interrupted(reason)) => eprintln!("[reply cut short: {reason}]"),
            Err(e) => eprintln!("[error: {e}]"),
        }
    }

    Ok(())
}
