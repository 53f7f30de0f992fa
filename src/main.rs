//! chatops-dispatch - console front-end
//!
//! Reads lines from stdin as one chat user, feeds them to the dispatcher and
//! prints batched replies. Lines must start with an invocation keyword
//! (`bot status`, `/бот бэкап`) unless they answer a pending prompt.

use chatops_dispatch::command::catalog::{demo_tree, BackupJobs};
use chatops_dispatch::command::CommandRegistry;
use chatops_dispatch::core::error::Result;
use chatops_dispatch::core::{DispatchConfig, UserId};
use chatops_dispatch::dispatcher::{Dispatcher, Engine};
use chatops_dispatch::io::{ConsoleTransport, Transport, WebhookTransport};
use chatops_dispatch::session::StaticPermissions;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Conversational command dispatcher over stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "chatops-dispatch")]
#[command(about = "Resolve and run chat commands from stdin")]
struct Args {
    /// TOML config file (defaults are used when absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat user the console speaks as
    #[arg(long, default_value = "console")]
    user: String,

    /// Permission group granted to the console user (repeatable)
    #[arg(long = "group")]
    groups: Vec<String>,

    /// Post replies to this webhook instead of printing them
    #[arg(long)]
    webhook: Option<String>,

    /// Print the compiled command registry as JSON and exit
    #[arg(long)]
    dump_registry: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatops_dispatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DispatchConfig::load(path)?,
        None => DispatchConfig::new(),
    };
    let registry = CommandRegistry::compile(demo_tree(Arc::new(BackupJobs::new())))?;

    if args.dump_registry {
        println!("{}", serde_json::to_string_pretty(&registry.summary())?);
        return Ok(());
    }

    tracing::info!(
        paths = registry.paths().len(),
        user = %args.user,
        groups = ?args.groups,
        "chatops-dispatch starting"
    );

    let user = UserId::new(args.user.clone());
    let permissions = StaticPermissions::new().grant(user.clone(), args.groups.iter().cloned());
    let engine = Engine::new(registry, config, Arc::new(permissions))?;

    let transport: Arc<dyn Transport> = match &args.webhook {
        Some(url) => Arc::new(WebhookTransport::new(url.clone())),
        None => Arc::new(ConsoleTransport),
    };

    let rt = Runtime::new()?;
    rt.block_on(run(Dispatcher::new(Arc::new(engine), transport), user))
}

async fn run(dispatcher: Dispatcher, user: UserId) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        dispatcher.inbound(&user, line);
    }

    dispatcher.shutdown().await;
    Ok(())
}
