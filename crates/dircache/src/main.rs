//! dircache - Inspect a directory server's schema and object listings

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dircache_core::dircache_types::{MessageKind, TypeId};
use dircache_core::{
    AsyncReader, ClientConfig, ClientContext, DataEvent, HandleFilter, ReaderExit,
    SnapshotSession,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dircache",
    version,
    about = "Inspect a directory server's schema and object listings",
    long_about = "Loads the type schema and object listings of a directory through the\n\
                  client-side cache, the same way an interactive client would.\n\
                  \n\
                  Examples:\n\
                    dircache --snapshot dir.json types          # List object types\n\
                    dircache --snapshot dir.json fields User    # Field templates of a type\n\
                    dircache --snapshot dir.json objects 3 --all --inactive\n\
                    dircache --snapshot dir.json messages       # Replay server messages\n\
                  \n\
                  Environment Variables:\n\
                    DIRCACHE_SNAPSHOT                # Default snapshot file\n\
                    DIRCACHE_FORMAT                  # Force output format: json|table\n\
                    DIRCACHE_NO_COLOR                # Disable ANSI colors\n\
                    RUST_LOG                         # Log filter (default: warn)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory snapshot file (JSON)
    #[arg(long, env = "DIRCACHE_SNAPSHOT")]
    snapshot: PathBuf,

    /// Seconds to wait for any single remote call
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Force output format (json|table)
    #[arg(long, env = "DIRCACHE_FORMAT", value_parser = ["json", "table"])]
    format: Option<String>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "DIRCACHE_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List object types, sorted by name
    Types,
    /// Show the field templates of a type
    Fields {
        /// Type name or numeric id
        type_name: String,
    },
    /// Show the cached listing of a type
    Objects {
        /// Type name or numeric id
        type_name: String,
        /// Include objects this session cannot edit
        #[arg(long)]
        all: bool,
        /// Include inactive objects
        #[arg(long)]
        inactive: bool,
    },
    /// Print server-push messages until the channel closes
    Messages,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.format.as_deref() == Some("json");
    let no_color = cli.no_color;

    let config = ClientConfig::new().with_remote_timeout(Duration::from_secs(cli.timeout_secs));
    let context = connect(&cli.snapshot, config).await?;

    let result = match cli.command {
        Command::Types => run_types(&context, json, no_color).await,
        Command::Fields { type_name } => run_fields(&context, &type_name, json, no_color).await,
        Command::Objects {
            type_name,
            all,
            inactive,
        } => run_objects(&context, &type_name, all, inactive, json, no_color).await,
        Command::Messages => run_messages(&context, json).await,
    };

    context.shutdown();
    result
}

/// Open the snapshot and wait for the schema, with a spinner
async fn connect(snapshot: &Path, config: ClientConfig) -> Result<ClientContext> {
    let start = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(80));

    spinner.set_message("Opening directory snapshot...");
    let session = SnapshotSession::from_file(snapshot)
        .await
        .with_context(|| format!("Failed to open snapshot {}", snapshot.display()))?;

    spinner.set_message("Loading schema...");
    let context = ClientContext::new(Arc::new(session), config);
    let types = match context.loader().type_list().await {
        Ok(types) => types,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).context("Schema load failed");
        }
    };

    spinner.finish_and_clear();
    tracing::info!(
        types = types.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Schema ready"
    );

    Ok(context)
}

async fn run_types(context: &ClientContext, json: bool, no_color: bool) -> Result<()> {
    let types = context.loader().type_list().await?;
    println!("{}", cli::format_type_table(&types, json, no_color));
    Ok(())
}

async fn run_fields(
    context: &ClientContext,
    query: &str,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let types = context.loader().type_list().await?;
    let descriptor = cli::resolve_type(&types, query)?;
    let templates = context.loader().field_templates(descriptor.id).await?;
    let names = context.loader().type_name_map().await?;

    let type_name = |id: TypeId| {
        names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| dircache_core::UNKNOWN_TYPE_NAME.to_string())
    };
    println!(
        "{}",
        cli::format_field_table(descriptor, &templates, type_name, json, no_color)
    );
    Ok(())
}

async fn run_objects(
    context: &ClientContext,
    query: &str,
    all: bool,
    inactive: bool,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let types = context.loader().type_list().await?;
    let descriptor = cli::resolve_type(&types, query)?;

    let listing = context.object_listing(descriptor.id, all).await?;
    let filter = HandleFilter::editable_active()
        .with_non_editable(all)
        .with_inactive(inactive);

    let handles = listing.handles(filter);
    println!("{}", cli::format_handle_table(&handles, json, no_color));
    Ok(())
}

async fn run_messages(context: &ClientContext, json: bool) -> Result<()> {
    let mut rx = context.event_bus().subscribe();
    if !context.start_async_reader() {
        println!("Session has no async channel.");
        return Ok(());
    }

    let reader = context
        .take_async_reader()
        .context("Async reader was not started")?;
    let (log, exit) = collect_messages(&mut rx, reader).await;

    let disconnect = match &exit {
        ReaderExit::ForcedDisconnect(reason) => Some(reason.as_str()),
        ReaderExit::Failed(message) => anyhow::bail!("Async channel failed: {}", message),
        ReaderExit::Closed | ReaderExit::Stopped => None,
    };

    if json {
        let value = serde_json::json!({
            "messages": log
                .messages
                .iter()
                .map(|(kind, text)| serde_json::json!({ "kind": kind, "text": text }))
                .collect::<Vec<_>>(),
            "dropped": log.dropped,
            "disconnect": disconnect,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "{}",
            cli::format_messages(&log.messages, log.dropped, disconnect)
        );
    }
    Ok(())
}

/// Server messages seen on the event bus
#[derive(Debug, Default)]
struct MessageLog {
    messages: Vec<(MessageKind, String)>,
    dropped: u64,
}

impl MessageLog {
    fn record(&mut self, event: DataEvent) {
        if let DataEvent::ServerMessage { kind, text } = event {
            self.messages.push((kind, text));
        }
    }

    fn lagged(&mut self, skipped: u64) {
        tracing::warn!(skipped, "Fell behind the event bus, messages dropped");
        self.dropped += skipped;
    }
}

/// Drain the bus while the reader runs, then pick up what it left behind
async fn collect_messages(
    rx: &mut broadcast::Receiver<DataEvent>,
    reader: AsyncReader,
) -> (MessageLog, ReaderExit) {
    let mut log = MessageLog::default();
    let join = reader.join();
    tokio::pin!(join);

    let exit = loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Ok(event) => log.record(event),
                Err(RecvError::Lagged(skipped)) => log.lagged(skipped),
                Err(RecvError::Closed) => break (&mut join).await,
            },
            exit = &mut join => break exit,
        }
    };

    loop {
        match rx.try_recv() {
            Ok(event) => log.record(event),
            Err(TryRecvError::Lagged(skipped)) => log.lagged(skipped),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    (log, exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dircache_core::dircache_types::AsyncMessage;
    use dircache_core::{EventBus, SnapshotPort};

    fn build_status(num: usize) -> AsyncMessage {
        AsyncMessage::Message {
            kind: MessageKind::BuildStatus,
            text: format!("step {}", num),
        }
    }

    #[tokio::test]
    async fn test_collects_more_messages_than_bus_capacity() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let port = SnapshotPort::new((0..300).map(build_status));

        let reader = AsyncReader::start(Arc::new(port), bus.clone());
        let (log, exit) = collect_messages(&mut rx, reader).await;

        assert_eq!(exit, ReaderExit::Closed);
        assert_eq!(log.dropped, 0);
        assert_eq!(log.messages.len(), 300);
        assert_eq!(log.messages[0].1, "step 0");
        assert_eq!(log.messages[299].1, "step 299");
    }

    #[tokio::test]
    async fn test_collects_messages_before_disconnect() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let mut messages: Vec<_> = (0..10).map(build_status).collect();
        messages.push(AsyncMessage::Shutdown {
            reason: "maintenance".to_string(),
        });

        let reader = AsyncReader::start(Arc::new(SnapshotPort::new(messages)), bus.clone());
        let (log, exit) = collect_messages(&mut rx, reader).await;

        assert_eq!(exit, ReaderExit::ForcedDisconnect("maintenance".to_string()));
        assert_eq!(log.messages.len(), 10);
    }

    #[tokio::test]
    async fn test_lagged_receiver_counts_dropped() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        for num in 0..10 {
            bus.publish(DataEvent::ServerMessage {
                kind: MessageKind::BuildStatus,
                text: format!("step {}", num),
            });
        }

        // Reader that ends immediately, leaving only the backlog
        let reader = AsyncReader::start(Arc::new(SnapshotPort::new(Vec::new())), bus.clone());
        let (log, _) = collect_messages(&mut rx, reader).await;

        assert_eq!(log.dropped, 6);
        let texts: Vec<_> = log.messages.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(texts, vec!["step 6", "step 7", "step 8", "step 9"]);
    }
}
