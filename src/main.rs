use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use usagegate::config::UsageGateConfig;
use usagegate::store::{Context, CounterStore};
use usagegate::usage::{Clock, CounterStatus, GateRegistry, ManualClock, SystemClock};

const EXIT_OK: u8 = 0;
/// Exit code reported when a gate is closed.
const EXIT_LIMIT_REACHED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "usagegate", version, about = "Calendar-bucketed usage gates")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "usagegate.yaml")]
    config: PathBuf,

    /// Override the counter file location
    #[arg(long)]
    store: Option<PathBuf>,

    /// Evaluate at this RFC 3339 instant instead of the current time
    #[arg(long)]
    now: Option<String>,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report whether a gate is currently closed
    Check { gate: String },
    /// Record one occurrence of the gated action
    Hit { gate: String },
    /// Reset a gate, honouring reset rules unless forced
    Reset {
        gate: String,
        #[arg(long)]
        force: bool,
    },
    /// Show leaf counter status for a gate, or for every counter
    Status { gate: Option<String> },
    /// Remove every stored value of a context
    Clear {
        #[arg(long)]
        context: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute one command, returning the process exit code.
fn run(cli: Cli) -> anyhow::Result<u8> {
    let mut config = UsageGateConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(path) = cli.store {
        config.store.path = path;
    }

    let clock: Arc<dyn Clock> = match cli.now.as_deref() {
        Some(at) => Arc::new(ManualClock::parse_rfc3339(at)?),
        None => Arc::new(SystemClock::new()),
    };
    debug!(now = %clock.now(), "Clock ready");

    let store = config.store.open().context("opening counter store")?;
    let registry = GateRegistry::build(
        &config.rules,
        store.clone(),
        clock,
        config.calendar.utc_offset()?,
    )?;

    match cli.command {
        Command::Check { gate } => {
            let reached = registry.require(&gate)?.is_limit_reached()?;
            report_gate(&gate, reached, cli.json)?;
            Ok(gate_exit_code(reached))
        }
        Command::Hit { gate } => {
            let reached = registry.require(&gate)?.record()?;
            info!(gate = %gate, reached = reached, "Recorded usage");
            report_gate(&gate, reached, cli.json)?;
            Ok(gate_exit_code(reached))
        }
        Command::Reset { gate, force } => {
            registry.require(&gate)?.reset_with(force)?;
            info!(gate = %gate, force = force, "Reset gate");
            print_statuses(&registry.statuses(&gate)?, cli.json)?;
            Ok(EXIT_OK)
        }
        Command::Status { gate } => {
            let statuses = match gate {
                Some(gate) => registry.statuses(&gate)?,
                None => registry.all_statuses()?,
            };
            print_statuses(&statuses, cli.json)?;
            Ok(EXIT_OK)
        }
        Command::Clear { context } => {
            let context = context
                .map(Context::from)
                .unwrap_or_else(|| config.rules.context.clone());
            store.clear(&context)?;
            info!(context = %context, "Cleared context");
            Ok(EXIT_OK)
        }
    }
}

fn gate_exit_code(reached: bool) -> u8 {
    if reached {
        EXIT_LIMIT_REACHED
    } else {
        EXIT_OK
    }
}

fn report_gate(gate: &str, reached: bool, json: bool) -> anyhow::Result<()> {
    if json {
        let body = serde_json::json!({ "gate": gate, "limit_reached": reached });
        println!("{}", serde_json::to_string(&body)?);
    } else if reached {
        println!("{}: limit reached", gate);
    } else {
        println!("{}: allowed", gate);
    }
    Ok(())
}

fn print_statuses(statuses: &[CounterStatus], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    for status in statuses {
        println!(
            "{}/{} {} {}/{}{} (bucket {}, resets in {}s)",
            status.context,
            status.name,
            status.unit,
            status.usages,
            status.limit,
            if status.limit_reached { " reached" } else { "" },
            status.bucket,
            status.resets_in_secs,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use usagegate::store::JsonFileStore;

    const CONFIG: &str = r#"
rules:
  context: ads
  counters:
    daily: { unit: day, limit: 1 }
  gates:
    interstitial: { rule: any, members: [daily] }
"#;

    fn cli(config: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["usagegate".to_string(), "--config".to_string()];
        argv.push(config.display().to_string());
        argv.extend(args.iter().map(|arg| arg.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_gate_exit_code() {
        assert_eq!(gate_exit_code(false), 0);
        assert_eq!(gate_exit_code(true), 2);
    }

    #[test]
    fn test_log_format_flag() {
        let parsed = Cli::try_parse_from(["usagegate", "--log-format", "json", "status"]).unwrap();
        assert_eq!(parsed.log_format, LogFormat::Json);

        let parsed = Cli::try_parse_from(["usagegate", "status"]).unwrap();
        assert_eq!(parsed.log_format, LogFormat::Text);
        assert!(Cli::try_parse_from(["usagegate", "--log-format", "xml", "status"]).is_err());
    }

    #[test]
    fn test_hit_until_closed_with_store_and_now_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("usagegate.yaml");
        let store = dir.path().join("state").join("counters.json");
        std::fs::write(&config, CONFIG).unwrap();
        let store_arg = store.display().to_string();

        let at = |now: &str, args: &[&str]| {
            let mut full = vec!["--store", store_arg.as_str(), "--now", now];
            full.extend_from_slice(args);
            run(cli(&config, &full)).unwrap()
        };

        assert_eq!(at("2016-04-14T12:00:00Z", &["hit", "interstitial"]), 0);
        assert_eq!(at("2016-04-14T13:00:00Z", &["hit", "interstitial"]), 2);
        assert_eq!(at("2016-04-14T23:59:59Z", &["check", "interstitial"]), 2);
        assert_eq!(at("2016-04-15T00:00:00Z", &["check", "interstitial"]), 0);

        let entries: BTreeMap<String, u64> = JsonFileStore::open(&store)
            .unwrap()
            .entries(&Context::new("ads"))
            .unwrap();
        assert_eq!(entries.get("daily_D_2016105"), Some(&2));
        assert!(!dir.path().join("usage_counters.json").exists());
    }

    #[test]
    fn test_unknown_gate_and_bad_instant_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("usagegate.yaml");
        std::fs::write(&config, CONFIG).unwrap();
        let store = dir.path().join("counters.json").display().to_string();

        assert!(run(cli(&config, &["--store", store.as_str(), "check", "missing"])).is_err());
        assert!(run(cli(&config, &["--store", store.as_str(), "--now", "yesterday", "status"])).is_err());
    }
}
