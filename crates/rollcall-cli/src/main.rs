//! rollcall: signs one user in, keeps their presence record live, and
//! signs out gracefully on Ctrl-C.

mod cli;
mod wiring;

use std::sync::Arc;

use rollcall_common::{Event, EventBus, RollcallError};
use rollcall_config::{toml_loader, LogLevel, RollcallConfig};
use rollcall_presence::{Identity, PresenceRuntime};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::wiring::Backend;

const DEFAULT_DIRECTIVE: &str = "rollcall=info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber. `RUST_LOG` wins over `--log-level`, which wins
/// over the config file level applied later by [`apply_config_level`].
fn init_logging(log_level: Option<&str>) -> FilterHandle {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = log_level.map_or(DEFAULT_DIRECTIVE.to_string(), |level| {
                format!("rollcall={level}")
            });
            EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
        }
    };
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

fn apply_config_level(handle: &FilterHandle, level: LogLevel, args: &cli::Args) {
    if args.log_level.is_some() || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    let directive = format!("rollcall={}", level.as_directive());
    if let Err(e) = handle.modify(|filter| *filter = EnvFilter::new(&directive)) {
        warn!(error = %e, "failed to apply configured log level");
    }
}

fn load(args: &cli::Args) -> Result<RollcallConfig, RollcallError> {
    let config = match &args.config {
        Some(path) => toml_loader::load_from_path(path)?,
        None => rollcall_config::load_config()?,
    };
    Ok(config)
}

/// Log bus topics until the bus closes.
async fn log_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event::PresenceChanged { is_online }) => info!(is_online, "presence changed"),
            Ok(Event::Shutdown) => break,
            Ok(event) => info!(?event, "presence event"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run(args: cli::Args, log: FilterHandle) -> Result<(), RollcallError> {
    let config = load(&args)?;
    apply_config_level(&log, config.logging.level, &args);
    debug!(config = %rollcall_config::config_to_json(&config), "effective config");

    let settings = wiring::presence_settings(&config.presence);
    let reachability = Arc::new(wiring::reachability(
        &config.reachability,
        settings.probe_timeout,
    ));
    let token = args.token.as_deref();
    let backend = Backend::open(&config.realtime, args.url.as_deref(), token);
    info!(backend = backend.name(), "presence store ready");

    let display_name = args.display_name.clone().unwrap_or_else(|| args.user_id.clone());
    let mut identity = Identity::new(args.user_id.clone(), display_name);
    if let Some(token) = token {
        identity = identity.with_access_token(token);
    }

    let bus = EventBus::default();
    let logger = tokio::spawn(log_events(bus.subscribe()));
    let (auth, auth_rx) = watch::channel(Some(identity));
    let runtime = PresenceRuntime::start(backend.store(), reachability, auth_rx, settings, bus);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    auth.send_replace(None);
    runtime.shutdown().await;
    backend.shutdown();
    if let Err(e) = logger.await {
        warn!(error = %e, "event logger failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = cli::parse();
    let log = init_logging(args.log_level.as_deref());

    match run(args, log).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "rollcall exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}
