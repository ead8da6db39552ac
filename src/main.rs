use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use trailmail::config::{window_length, Config};
use trailmail::events::decode_events;
use trailmail::pipeline::{transport_from_config, Pipeline};

/// Command-line arguments for the audit-trail notifier
#[derive(Parser)]
#[command(
    name = "trailmail",
    about = "CloudTrail audit events to email notifications",
    long_about = "Runs CloudTrail events through the registered modules and emails an \
                  HTML notification for every event a detail module claims."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Event source
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "-",
        help = "Events file: a logs payload, a JSON array or JSON lines ('-' reads stdin)"
    )]
    events: PathBuf,

    /// Window start (RFC 3339)
    #[arg(long, value_name = "TIME")]
    start: Option<DateTime<Utc>>,

    /// Window end (RFC 3339), defaults to now
    #[arg(long, value_name = "TIME")]
    end: Option<DateTime<Utc>>,

    /// Window length used when no start is given
    #[arg(long, value_name = "MINUTES")]
    window_minutes: Option<i64>,

    /// Print the query descriptors for the window as JSON and exit
    #[arg(long)]
    print_queries: bool,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
        }

        if let Some(minutes) = self.window_minutes {
            window_length(minutes).map_err(|e| e.to_string())?;
        }

        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(format!("Window start {} is not before end {}", start, end));
            }
        }

        if !self.print_queries && !is_stdin(&self.events) && !self.events.is_file() {
            return Err(format!("Events file not found: {}", self.events.display()));
        }

        Ok(())
    }

    /// Resolve the polling window `[start, end)`
    fn window(
        &self,
        default_minutes: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
        let end = self.end.unwrap_or(now);
        let start = match self.start {
            Some(start) => start,
            None => {
                let length = window_length(self.window_minutes.unwrap_or(default_minutes))?;
                end.checked_sub_signed(length).with_context(|| {
                    format!("Window of {} minutes before {} is out of range", length.num_minutes(), end)
                })?
            }
        };
        Ok((start, end))
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Load configuration, falling back to defaults when the file is missing
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) if path.exists() => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        Some(path) => {
            warn!(
                "Configuration file not found: {}, using defaults",
                path.display()
            );
            Config::default()
        }
        None => Config::default(),
    };

    Ok(config)
}

fn read_events(path: &Path) -> anyhow::Result<String> {
    if is_stdin(path) {
        let mut data = String::new();
        std::io::stdin()
            .read_to_string(&mut data)
            .context("Failed to read events from stdin")?;
        return Ok(data);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events from {}", path.display()))
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;

    let (start, end) = cli.window(config.query.window_minutes, Utc::now())?;

    let transport = transport_from_config(&config);
    let mut pipeline = Pipeline::from_config(&config, transport);
    info!(
        "Registered modules: {}",
        pipeline.registry().names().join(", ")
    );

    if cli.print_queries {
        let queries = pipeline.queries(start, end);
        let json = serde_json::to_string_pretty(&queries).context("Failed to encode queries")?;
        println!("{}", json);
        return Ok(());
    }

    let data = read_events(&cli.events)?;
    let summary = pipeline.run(decode_events(&data)).context("Run aborted")?;

    if !summary.is_clean() {
        warn!(
            "Run completed with {} decode failure(s) and {} process error(s)",
            summary.decode_failures,
            summary.process_errors.len()
        );
    }

    if let Some(e) = summary.end_error {
        bail!("Run did not finish cleanly: {}", e);
    }

    Ok(())
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
