//! basil: operator console for several Sensu backends.
//!
//! Run: `basil --demo` (interactive), `basil --demo list events`,
//! `basil connections`, `basil connections add prod --url ... --api-key ...`.
//!
//! The binary ships the in-process demo backend only. Commands that query
//! backends refuse to run without `--demo`; embedders supply a real
//! [`ResourceClient`](basil::client::ResourceClient) through the library.

use anyhow::{bail, Context, Result};
use basil::aggregate::{Aggregate, FetchOutcome};
use basil::client::{DemoBehaviour, DemoClient, ResourceClient};
use basil::collection::{PreprocessParams, SortStableCollection};
use basil::config::{Config, ConnectionEntry};
use basil::connection::ConnectionSet;
use basil::context::AppContext;
use basil::fetcher::Fetcher;
use basil::logging::{self, LogTarget};
use basil::resource::ResourceKind;
use basil::ui::App;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code when every connection failed.
const EXIT_TOTAL_FAILURE: i32 = 2;

/// Exit code when `connections test` gets no usable answer.
const EXIT_CONNECTION_FAILED: i32 = 3;

/// basil: operator console for several Sensu backends
#[derive(Parser, Debug)]
#[command(name = "basil")]
#[command(version)]
#[command(about = "Unified console over several Sensu backends", long_about = None)]
struct Cli {
    /// Config file path (defaults to $BASIL_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use built-in demo backends instead of the configured connections
    #[arg(long, global = true)]
    demo: bool,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Log file for the interactive console
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive console (default)
    Tui,
    /// Print one resource kind from every connection and exit
    List {
        /// events, entities, checks or silences
        kind: String,
    },
    /// Show or edit the configured connections
    Connections {
        #[command(subcommand)]
        action: Option<ConnectionsCommand>,
    },
}

#[derive(Subcommand, Debug)]
enum ConnectionsCommand {
    /// Print the configured connections (default)
    List,
    /// Add a connection to the config file
    Add(EntryArgs),
    /// Replace the settings of an existing connection
    Edit(EntryArgs),
    /// Remove a connection from the config file
    Remove {
        /// Connection name
        name: String,
    },
    /// Query one connection and report whether it answers
    Test {
        /// Connection name
        name: String,
    },
}

#[derive(Args, Debug)]
struct EntryArgs {
    /// Connection name
    name: String,
    /// Backend URL
    #[arg(long)]
    url: String,
    /// Username for password authentication
    #[arg(long)]
    username: Option<String>,
    /// Password for password authentication
    #[arg(long)]
    password: Option<String>,
    /// API key
    #[arg(long)]
    api_key: Option<String>,
    /// Namespace (defaults to "default")
    #[arg(long)]
    namespace: Option<String>,
}

impl From<EntryArgs> for ConnectionEntry {
    fn from(args: EntryArgs) -> Self {
        Self {
            name: Some(args.name),
            url: Some(args.url),
            username: args.username,
            password: args.password,
            api_key: args.api_key,
            namespace: args.namespace,
        }
    }
}

/// A connection edit applied to the config file.
#[derive(Debug)]
enum Edit {
    Add(ConnectionEntry),
    Update(ConnectionEntry),
    Remove(String),
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Command::Tui);

    let config_path = Config::resolve_path(cli.config.as_deref());
    let mut config = match &config_path {
        Some(path) if path.exists() => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        Some(path) if cli.config.is_some() => {
            bail!("configuration file not found: {}", path.display())
        }
        _ => Config::default(),
    };

    let target = match command {
        Command::Tui => cli
            .log_file
            .clone()
            .or_else(|| config.global.log_file.clone())
            .or_else(logging::default_log_file)
            .map(LogTarget::File),
        Command::List { .. } | Command::Connections { .. } => Some(LogTarget::Stderr),
    };
    if let Some(target) = target {
        logging::init(&target, cli.debug)?;
    }

    let action = match command {
        Command::Connections { action } => {
            let edit = match action.unwrap_or(ConnectionsCommand::List) {
                ConnectionsCommand::List => {
                    print_connections(&ConnectionSet::build(&config.connections)?);
                    return Ok(());
                }
                ConnectionsCommand::Add(args) => Edit::Add(args.into()),
                ConnectionsCommand::Edit(args) => Edit::Update(args.into()),
                ConnectionsCommand::Remove { name } => Edit::Remove(name),
                ConnectionsCommand::Test { name } => {
                    return run_backend(&cli, config, config_path, Run::Test(name));
                }
            };
            let Some(path) = config_path else {
                bail!("no configuration path; pass --config or set BASIL_CONFIG");
            };
            let summary = apply_edit(&mut config, edit)?;
            config.save(&path).with_context(|| format!("saving {}", path.display()))?;
            println!("{summary} ({})", path.display());
            return Ok(());
        }
        Command::Tui => Run::Tui,
        Command::List { kind } => {
            let Some(kind) = ResourceKind::parse(&kind) else {
                bail!(
                    "unknown resource kind '{kind}' \
                     (expected events, entities, checks or silences)"
                );
            };
            Run::List(kind)
        }
    };

    run_backend(&cli, config, config_path, action)
}

/// Commands that query backends.
enum Run {
    Tui,
    List(ResourceKind),
    Test(String),
}

fn run_backend(cli: &Cli, mut config: Config, path: Option<PathBuf>, run: Run) -> Result<()> {
    let client = backend(cli.demo)?;
    if cli.demo {
        config.connections = demo_connections();
    }

    let ctx = AppContext::from_entries(&config.connections, client, config.global.clone())?;
    let ctx = Arc::new(ctx);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let code = match run {
        Run::Tui => {
            if ctx.snapshot().is_empty() {
                bail!("no connections configured; add some with `basil connections add`");
            }
            let _guard = runtime.enter();
            let mut app = App::new(Arc::clone(&ctx));
            // The demo set is not the file's, so a reload would swap it out.
            if let Some(path) = path.filter(|_| !cli.demo) {
                app = app.with_config_path(path);
            }
            app.run()?;
            0
        }
        Run::List(kind) => runtime.block_on(list(&ctx, kind)),
        Run::Test(name) => runtime.block_on(check_connection(&ctx, &name))?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// The backend client for commands that query connections.
fn backend(demo: bool) -> Result<Arc<dyn ResourceClient>> {
    if !demo {
        bail!(
            "no backend client is available in this build; \
             run with --demo for the built-in demo backends"
        );
    }
    Ok(Arc::new(demo_client()))
}

/// Applies one edit and checks that the result still builds into a
/// connection set, so a broken entry is never written.
fn apply_edit(config: &mut Config, edit: Edit) -> Result<String> {
    let summary = match edit {
        Edit::Add(entry) => {
            let name = entry.name.clone().unwrap_or_default();
            config.add_connection(entry)?;
            format!("added connection '{name}'")
        }
        Edit::Update(entry) => {
            let name = entry.name.clone().unwrap_or_default();
            config.update_connection(entry)?;
            format!("updated connection '{name}'")
        }
        Edit::Remove(name) => {
            if !config.remove_connection(&name) {
                bail!("no connection named '{name}'");
            }
            format!("removed connection '{name}'")
        }
    };
    ConnectionSet::build(&config.connections)?;
    Ok(summary)
}

async fn check_connection(ctx: &AppContext, name: &str) -> Result<i32> {
    let set = ctx.snapshot();
    let Some(connection) = set.get(name) else {
        bail!("no connection named '{name}'");
    };

    let fetcher = Fetcher::new(ctx.client());
    let started = Instant::now();
    let timeout = ctx.load_timeout();
    let outcome =
        tokio::time::timeout(timeout, fetcher.fetch(Arc::clone(connection), ResourceKind::Event))
            .await;

    match outcome {
        Ok(FetchOutcome::Success(items)) => {
            println!(
                "{name}: ok ({} events from {} in {} ms)",
                items.len(),
                connection.endpoint,
                started.elapsed().as_millis()
            );
            Ok(0)
        }
        Ok(FetchOutcome::Failure(err)) => {
            eprintln!("{name}: connection failed: {err}");
            Ok(EXIT_CONNECTION_FAILED)
        }
        Err(_) => {
            eprintln!("{name}: no answer within {} ms", timeout.as_millis());
            Ok(EXIT_CONNECTION_FAILED)
        }
    }
}

async fn list(ctx: &AppContext, kind: ResourceKind) -> i32 {
    let set = ctx.snapshot();
    let aggregate = set.fetch_all(ctx.client(), kind).await;

    if let Aggregate::TotalFailure(signal) = &aggregate {
        for (name, err) in &signal.errors {
            eprintln!("{name}: {err}");
        }
        eprintln!("every connection failed");
        return EXIT_TOTAL_FAILURE;
    }
    if let Some(degraded) = aggregate.degraded() {
        eprintln!("warning: no data from {}", degraded.failed_connections.join(", "));
    }

    // Entity check counts come from the sibling events.
    let events = if kind == ResourceKind::Entity {
        set.fetch_all(ctx.client(), ResourceKind::Event).await.into_resources()
    } else {
        Vec::new()
    };
    let params = PreprocessParams {
        events: (kind == ResourceKind::Entity).then_some(events.as_slice()),
    };

    let mut collection = SortStableCollection::new(kind);
    collection.reload(aggregate.into_resources(), &params);

    let header: Vec<String> = collection.columns().iter().map(|c| c.title.to_string()).collect();
    print_table(&header, &collection.rows());
    0
}

fn print_connections(set: &ConnectionSet) {
    let header = ["Name", "URL", "Namespace", "Auth"].map(String::from);
    let rows: Vec<Vec<String>> = set
        .all()
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.endpoint.to_string(),
                c.namespace.clone(),
                c.credential.label().to_string(),
            ]
        })
        .collect();
    print_table(&header, &rows);
}

fn print_table(header: &[String], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(header));
    for row in rows {
        println!("{}", line(row.as_slice()));
    }
}

fn demo_connections() -> Vec<ConnectionEntry> {
    vec![
        ConnectionEntry::with_password("prod", "https://sensu.prod.example.com", "admin", "demo"),
        ConnectionEntry::with_api_key("staging", "https://sensu.staging.example.com:8443", "demo")
            .namespace("ops"),
        ConnectionEntry::with_api_key("dev", "sensu.dev.example.com", "demo"),
        ConnectionEntry::with_api_key("lab", "http://10.0.0.12:8080", "demo"),
    ]
}

fn demo_client() -> DemoClient {
    DemoClient::new()
        .with_default_latency(Duration::from_millis(80))
        .with_latency("staging", Duration::from_millis(900))
        .with_latency("lab", Duration::from_secs(12))
        .with_behaviour(
            "dev",
            DemoBehaviour::Fail("connection refused (os error 111)".to_string()),
        )
}
