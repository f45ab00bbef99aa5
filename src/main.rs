//! # Axiom Shell
//!
//! Runs the shell core headless: outputs are created from the command line,
//! plugins from the configuration, and a tokio interval drives the timer
//! clock until SIGINT/SIGTERM or the exit binding stops it.

use anyhow::Result;
use clap::Parser;
use log::{debug, error, info};
use std::time::Instant;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};

use axiom_shell::{Core, HeadlessBackend, Rectangle, ShellConfig};

/// Frame interval driving the timer clock
const TICK: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "axiom-shell")]
#[command(about = "Plugin arbitration and focus routing core of the Axiom shell")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/axiom/shell.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Number of headless outputs to create
    #[arg(long, default_value_t = 1)]
    outputs: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting Axiom Shell");
    info!("📄 Version: {}", axiom_shell::VERSION);
    if let Some(commit) = option_env!("GIT_COMMIT") {
        debug!(
            "Built from {} on {} for {}",
            commit,
            env!("BUILD_DATE"),
            env!("TARGET_TRIPLE")
        );
    }

    // Load configuration
    let config = match ShellConfig::load(&cli.config) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            ShellConfig::default()
        }
    };

    let mut core = Core::new(config, Box::new(HeadlessBackend::new()));
    for i in 0..cli.outputs {
        let x = i32::try_from(i * 1920).unwrap_or(i32::MAX);
        let output = core.add_output(&format!("HEADLESS-{}", i + 1), Rectangle::new(x, 0, 1920, 1080));
        let plugins = core.load_configured_plugins(output);
        info!("🔌 {} plugin(s) loaded on {}", plugins.len(), output);
    }

    info!("✨ Axiom Shell is ready");
    run(&mut core).await?;

    core.teardown();
    info!("👋 Axiom Shell shutting down");
    Ok(())
}

/// Drive the core until a signal arrives or it terminates itself
async fn run(core: &mut Core) -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

    let start = Instant::now();
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while core.is_running() {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("📨 Received SIGTERM, shutting down gracefully");
                core.terminate();
            }
            _ = sigint.recv() => {
                info!("📨 Received SIGINT (Ctrl+C), shutting down gracefully");
                core.terminate();
            }
            _ = ticker.tick() => {
                let now = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                core.advance_to(now);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["axiom-shell"]).unwrap();
        assert!(!cli.debug);
        assert_eq!(cli.outputs, 1);
        assert_eq!(cli.config, "~/.config/axiom/shell.toml");
    }

    #[test]
    fn test_cli_flags() {
        let cli =
            Cli::try_parse_from(["axiom-shell", "--debug", "--outputs", "2", "-c", "/tmp/shell.toml"])
                .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.outputs, 2);
        assert_eq!(cli.config, "/tmp/shell.toml");
    }
}
