//! chanrelay - terminal client for the chanrelay daemon
//!
//! Connects to a relay server, prints everything the server sends, and
//! forwards each line typed on stdin. `/exit` or Ctrl+D ends the session.
//!
//! # Usage
//!
//! ```text
//! chanrelay                       # prompt for a username, connect to 127.0.0.1:6667
//! chanrelay alice --addr 10.0.0.5:6667
//! chanrelay alice --legacy-username-frame
//! ```

use std::io::Write;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chanrelay_client::client::DEFAULT_ADDR;
use chanrelay_client::{ChatClient, ClientConfig, ClientError, SessionEnd};
use chanrelay_core::Username;
use chanrelay_protocol::UsernameFraming;

/// chanrelay - channel chat client
#[derive(Parser, Debug)]
#[command(name = "chanrelay", version, about)]
struct Args {
    /// Username to connect as (prompted for if omitted)
    username: Option<String>,

    /// Relay server address
    #[arg(short, long, default_value_t = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Send the username as a fixed 32-byte NUL-padded frame
    #[arg(long)]
    legacy_username_frame: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let result = runtime.block_on(run(args));
    // A pending stdin read holds a blocking thread that would never finish.
    runtime.shutdown_background();
    result
}

async fn run(args: Args) -> Result<()> {
    // stdout belongs to the chat; logs go to stderr and stay quiet by default.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut stdin = BufReader::new(tokio::io::stdin());

    let raw = match args.username {
        Some(name) => name,
        None => prompt_username(&mut stdin).await?,
    };

    let username = Username::parse(&raw).map_err(ClientError::from)?;

    let config = ClientConfig {
        addr: args.addr,
        framing: if args.legacy_username_frame {
            UsernameFraming::Fixed
        } else {
            UsernameFraming::Line
        },
    };

    let client = ChatClient::new(config);
    let session = client.run(&username, stdin, tokio::io::stdout());

    let end = tokio::select! {
        result = session => result?,
        _ = tokio::signal::ctrl_c() => {
            debug!("Interrupted");
            return Ok(());
        }
    };

    if end == SessionEnd::ServerClosed {
        eprintln!("Connection closed by server.");
    }

    Ok(())
}

async fn prompt_username<R>(stdin: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    print!("Enter your username: ");
    std::io::stdout().flush().context("Failed to write prompt")?;

    let mut line = String::new();
    stdin
        .read_line(&mut line)
        .await
        .context("Failed to read username")?;
    Ok(line)
}
