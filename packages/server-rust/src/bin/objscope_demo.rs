//! `objscope-demo`: serves the built-in demo catalog over HTTP.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use objscope_core::{ObjectRegistry, Value};
use objscope_server::demo::{self, Counter};
use objscope_server::network::{NetworkConfig, NetworkModule};
use objscope_server::service::{
    AffinityDelegate, BackgroundWorker, ConsoleConfig, ConsoleService, ExecutionDelegate,
    InlineDelegate, RegistrySweeper,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "objscope-demo")]
#[command(about = "Live object console over HTTP")]
#[command(version)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "OBJSCOPE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, env = "OBJSCOPE_PORT", default_value_t = 8014)]
    port: u16,

    /// Type shown at `/`
    #[arg(long, env = "OBJSCOPE_ROOT", default_value = demo::SYSTEM)]
    root: String,

    /// Run every call on one designated thread
    #[arg(long, env = "OBJSCOPE_AFFINITY")]
    affinity: bool,

    /// Queue capacity in front of the designated thread
    #[arg(long, env = "OBJSCOPE_AFFINITY_CAPACITY", default_value_t = 64)]
    affinity_capacity: usize,

    /// Seconds between registry sweeps
    #[arg(long, default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Log output format
    #[arg(long, env = "OBJSCOPE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

type DelegateHandle = (Arc<dyn ExecutionDelegate>, Option<JoinHandle<()>>);

fn build_delegate(config: &ConsoleConfig) -> Result<DelegateHandle> {
    if config.affinity {
        let (delegate, handle) =
            AffinityDelegate::spawn_thread("objscope-affinity", config.affinity_queue_capacity)?;
        info!(capacity = config.affinity_queue_capacity, "calls run on designated thread");
        Ok((Arc::new(delegate), Some(handle)))
    } else {
        Ok((Arc::new(InlineDelegate), None))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let console_config = ConsoleConfig {
        root_type: cli.root,
        sweep_interval_ms: cli.sweep_interval_secs.saturating_mul(1000),
        affinity: cli.affinity,
        affinity_queue_capacity: cli.affinity_capacity,
    };

    let registry = Arc::new(ObjectRegistry::new());
    let seed = registry.add(Value::object(Counter::new(0)));
    registry.promote(&seed, "main")?;

    let (delegate, affinity_thread) = build_delegate(&console_config)?;
    let console = ConsoleService::with_registry(
        &console_config,
        Arc::new(demo::catalog()),
        Arc::clone(&registry),
        delegate,
    );

    let mut sweeper = BackgroundWorker::start(
        RegistrySweeper::new(Arc::clone(&registry)),
        console_config.sweep_interval_ms,
    );

    let network_config = NetworkConfig {
        host: cli.host,
        port: cli.port,
        ..NetworkConfig::default()
    };
    let mut network = NetworkModule::new(network_config, console);
    network.start().await?;
    network
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await?;

    sweeper.stop().await;
    if let Some(handle) = affinity_thread {
        // The router held the last delegate handle; the thread exits once
        // its queue drains.
        tokio::task::spawn_blocking(move || handle.join())
            .await?
            .map_err(|_| anyhow::anyhow!("affinity thread panicked"))?;
    }
    Ok(())
}
