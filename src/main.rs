//! Standby memory cleaner CLI
//!
//! Thin command surface over the monitor core. The background service
//! itself lives in the companion `standby-cleaner-service` binary; this
//! binary installs it, inspects memory, and can run the monitor loop in
//! the foreground.

#[cfg(windows)]
use clap::{Parser, Subcommand};
#[cfg(windows)]
use std::sync::Arc;
#[cfg(windows)]
use tracing::{info, Level};
#[cfg(windows)]
use tracing_subscriber::FmtSubscriber;

#[cfg(windows)]
use standby_cleaner::core::config::{
    ConfigStore, MemoryConfigStore, PolicyConfig, CHECK_INTERVAL_KEY, MIN_FREE_MB_KEY,
};
#[cfg(windows)]
use standby_cleaner::core::memlist::{probe, MemoryListOps};
#[cfg(windows)]
use standby_cleaner::core::monitor::{MonitorContext, StandbyMonitor};
#[cfg(windows)]
use standby_cleaner::core::sink::{EventSink, TracingSink};
#[cfg(windows)]
use standby_cleaner::service::{self, SERVICE_NAME};
#[cfg(windows)]
use standby_cleaner::windows::eventlog::WindowsEventLog;
#[cfg(windows)]
use standby_cleaner::windows::ntapi::NtMemoryOps;
#[cfg(windows)]
use standby_cleaner::windows::registry::RegistryConfigStore;
#[cfg(windows)]
use standby_cleaner::windows::system::{page_size, system_overview};

#[cfg(windows)]
#[derive(Parser)]
#[command(name = "standby-cleaner")]
#[command(about = "Purges the Windows standby list when free memory runs low", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(windows)]
#[derive(Subcommand)]
enum Commands {
    /// Show current memory accounting
    Status,

    /// Purge the standby list once (requires elevation)
    Purge,

    /// Run the monitor loop in the foreground (Ctrl-C to stop)
    Run {
        /// Override the minimum-free threshold in MB
        #[arg(long)]
        min_free: Option<u32>,

        /// Override the check interval in seconds
        #[arg(long)]
        interval: Option<u32>,
    },

    /// Show the effective configuration
    Config,

    /// Register and start the background service
    Install,

    /// Stop and remove the background service
    Uninstall,
}

#[cfg(windows)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let ops = NtMemoryOps::resolve()?;
            let snapshot = probe(&ops, page_size())?;
            let overview = system_overview();

            println!("Memory Status:");
            println!("  OS:        {} {}", overview.os_name, overview.kernel_version);
            println!("  Total:     {} MB", overview.total_memory_mb);
            println!("  Available: {} MB", overview.available_memory_mb);
            println!("  Free:      {:.0} MB", snapshot.free_mb());
            println!("  Standby:   {:.0} MB", snapshot.standby_mb());
        }

        Commands::Purge => {
            let ops = NtMemoryOps::resolve()?;
            let before = probe(&ops, page_size())?;
            ops.purge_standby_list()?;
            let after = probe(&ops, page_size())?;

            println!("Standby list purged:");
            println!("  Standby before: {:.0} MB", before.standby_mb());
            println!("  Free before:    {:.0} MB", before.free_mb());
            println!("  Free after:     {:.0} MB", after.free_mb());
        }

        Commands::Run { min_free, interval } => {
            let ops = NtMemoryOps::resolve()?;

            // Command-line overrides bypass the registry for this run.
            let store: Box<dyn ConfigStore> = if min_free.is_some() || interval.is_some() {
                let store = MemoryConfigStore::new();
                if let Some(value) = min_free {
                    store.set(MIN_FREE_MB_KEY, value);
                }
                if let Some(value) = interval {
                    store.set(CHECK_INTERVAL_KEY, value);
                }
                Box::new(store)
            } else {
                Box::new(RegistryConfigStore::new())
            };

            let config = PolicyConfig::load(store.as_ref());
            let monitor =
                StandbyMonitor::new(Box::new(ops), store, Box::new(TracingSink), page_size());
            monitor.check_privileges()?;

            info!(
                "Starting standby monitor (threshold {} MB, interval {}s); Ctrl-C to stop",
                config.min_free_mb, config.interval_secs
            );

            let ctx = Arc::new(MonitorContext::new());
            let loop_ctx = Arc::clone(&ctx);
            let worker = tokio::task::spawn_blocking(move || monitor.run(&loop_ctx));

            tokio::signal::ctrl_c().await?;
            info!("Stop requested; waiting for the current cycle to finish");
            ctx.request_stop();
            worker.await?;
        }

        Commands::Config => {
            let config = PolicyConfig::load(&RegistryConfigStore::new());
            println!("Current Configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Install => match service::install() {
            Ok(()) => {
                WindowsEventLog::new(SERVICE_NAME)
                    .info("Standby memory cleaner service installed and started.");
                println!("Service installed and started.");
            }
            Err(e) => {
                eprintln!("Failed to install service: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Uninstall => match service::uninstall() {
            Ok(()) => {
                WindowsEventLog::new(SERVICE_NAME)
                    .info("Standby memory cleaner service stopped and uninstalled.");
                println!("Service uninstalled.");
            }
            Err(e) => {
                eprintln!("Failed to uninstall service: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

// Stub main for non-Windows platforms
#[cfg(not(windows))]
fn main() {
    eprintln!("This binary is Windows-only.");
    std::process::exit(1);
}
