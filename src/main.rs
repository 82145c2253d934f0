mod config;
mod heartbeat;
mod monitor;
mod report;
mod runner;
mod watchdog;

use clap::Parser;
use std::path::PathBuf;

/// Run a configured test suite under a per-test deadline watchdog:
/// any single test that exceeds the timeout aborts the whole run with
/// stack diagnostics and exit status 2, instead of hanging CI forever.
#[derive(Parser, Debug)]
#[command(name = "hangcheck", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "hangcheck.toml")]
    config: PathBuf,

    /// Override per-test timeout in seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (heartbeats, monitor wake-ups)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .init();

    let mut config = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "could not load configuration");
            std::process::exit(1);
        }
    };
    if let Some(timeout) = cli.timeout {
        config.watchdog.timeout_secs = timeout;
        if !(timeout > 0.0) || !timeout.is_finite() {
            tracing::error!(timeout, "--timeout must be positive");
            std::process::exit(1);
        }
    }

    if cli.dry_run {
        println!("hangcheck v{}", env!("CARGO_PKG_VERSION"));
        println!("config: {}", cli.config.display());
        println!("per-test timeout: {}s", config.watchdog.timeout_secs);
        println!("native stack dump: {}", config.watchdog.native_stack_dump);
        println!("shell: {}", config.suite.shell);
        println!("tests: {}", config.suite.tests.len());
        for test in &config.suite.tests {
            println!("  {} -> {}", test.name, test.command);
        }
        return;
    }

    if config.suite.tests.is_empty() {
        tracing::warn!("no tests configured, nothing to do");
        return;
    }

    let timeout = config.watchdog.timeout();
    let reporter = report::AlarmReporter::from_config(&config.watchdog);
    let mut watchdog = watchdog::Watchdog::arm(timeout, reporter);

    let result = runner::run_suite(&config.suite, &watchdog).await;

    // Join the monitor before reporting our own exit status, so no
    // background activity outlives the run.
    watchdog.disarm().await;

    match result {
        Ok(summary) => {
            for outcome in summary.outcomes.iter().filter(|o| !o.passed()) {
                tracing::warn!(
                    name = %outcome.name,
                    exit_code = ?outcome.exit_code,
                    duration_ms = outcome.duration.as_millis() as u64,
                    "failed test"
                );
            }
            tracing::info!(
                total = summary.total(),
                failed = summary.failed(),
                "suite finished"
            );
            if !summary.all_passed() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "suite aborted");
            std::process::exit(1);
        }
    }
}
