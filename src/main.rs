//! Stream Clusters CLI
//!
//! Groups, compresses and tracks multivariate time series.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_clusters::{
    config::{BoringDataMode, Config, RawSettings, Settings},
    core::{cluster_over_time, highlights_by_group, ClusterSession, RowBuffer, SessionUpdate},
    source::{load_dataset, save_dataset, GeneratorConfig, GeneratorMode, RowGenerator},
    stats::create_shared_stats_with_persistence,
    worker::{ClusteringWorker, Job, JobOutcome},
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stream-clusters")]
#[command(version = VERSION)]
#[command(about = "Group, compress and track multivariate time series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the stored clustering settings.
#[derive(Args, Debug, Clone, Default)]
struct SettingsArgs {
    /// Split dimensions into this many groups (replaces eps)
    #[arg(long)]
    cluster_count: Option<u32>,

    /// Density threshold (replaces cluster count)
    #[arg(long)]
    eps: Option<f64>,

    /// Number of most recent rows to analyse
    #[arg(long)]
    data_ticks: Option<usize>,

    /// Suppress stretches where every group is flat
    #[arg(long)]
    compress: bool,

    /// Relative range below which a window counts as flat
    #[arg(long)]
    mean_range: Option<f64>,

    /// Local window size for flatness checks
    #[arg(long)]
    tick_range: Option<usize>,

    /// Collapse each run of suppressed rows into a single blank row
    #[arg(long)]
    save_screen_space: bool,

    /// Number of earlier passes inspected for highlighting
    #[arg(long)]
    history_depth: Option<usize>,
}

impl SettingsArgs {
    fn apply(&self, mut raw: RawSettings) -> RawSettings {
        match (self.cluster_count, self.eps) {
            (Some(count), None) => {
                raw.cluster_count = Some(count);
                raw.eps = None;
            }
            (None, Some(eps)) => {
                raw.eps = Some(eps);
                raw.cluster_count = None;
            }
            (Some(count), Some(eps)) => {
                raw.cluster_count = Some(count);
                raw.eps = Some(eps);
            }
            (None, None) => {}
        }
        if let Some(ticks) = self.data_ticks {
            raw.data_ticks = Some(ticks);
        }
        if self.compress {
            raw.ignore_boring_data_mode = BoringDataMode::Standard;
        }
        if let Some(mean_range) = self.mean_range {
            raw.mean_range = Some(mean_range);
        }
        if let Some(tick_range) = self.tick_range {
            raw.tick_range = Some(tick_range);
        }
        if self.save_screen_space {
            raw.save_screen_space = true;
        }
        if let Some(depth) = self.history_depth {
            raw.cluster_assignment_history_depth = depth;
        }
        raw
    }

    fn resolve(&self, config: &Config) -> anyhow::Result<Settings> {
        let raw = self.apply(config.settings.clone());
        let settings = Settings::try_from(raw).context("Invalid clustering settings")?;
        if self.compress && settings.active_compression().is_none() {
            bail!("--compress needs a non-zero --mean-range and --tick-range");
        }
        Ok(settings)
    }
}

/// Output encoding for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// One compact JSON document per line
    Jsonl,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one clustering pass over a JSON dataset
    Aggregate {
        /// Dataset file (JSON array of rows)
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Keep inconsistent groupings instead of falling back to one group
        #[arg(long)]
        no_fallback: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Compute group assignments over time for a JSON dataset
    Timeline {
        /// Dataset file (JSON array of rows)
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Rows per sliding window (defaults to data ticks)
        #[arg(long)]
        context_window: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Generate a synthetic dataset
    Generate {
        /// Shape of the generated series
        #[arg(long, value_enum, default_value_t = GeneratorMode::Random)]
        mode: GeneratorMode,

        /// Number of dimensions
        #[arg(long, default_value = "8")]
        dimensions: usize,

        /// Number of rows
        #[arg(long, default_value = "100")]
        rows: usize,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Output file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Stream synthetic rows and cluster them continuously
    Stream {
        /// Shape of the generated series
        #[arg(long, value_enum, default_value_t = GeneratorMode::Random)]
        mode: GeneratorMode,

        /// Number of dimensions
        #[arg(long, default_value = "8")]
        dimensions: usize,

        /// Rows generated before streaming starts
        #[arg(long, default_value = "50")]
        initial_rows: usize,

        /// Milliseconds between new rows
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Maximum number of rows kept in the buffer
        #[arg(long, default_value = "1000")]
        buffer: usize,

        /// Stop after this many streamed rows
        #[arg(long)]
        max_rows: Option<u64>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Show cumulative processing statistics
    Status,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            input,
            settings,
            no_fallback,
            format,
            output,
        } => cmd_aggregate(&input, &settings, no_fallback, format, output.as_deref()),
        Commands::Timeline {
            input,
            settings,
            context_window,
            format,
            output,
        } => cmd_timeline(&input, &settings, context_window, format, output.as_deref()),
        Commands::Generate {
            mode,
            dimensions,
            rows,
            seed,
            output,
        } => cmd_generate(mode, dimensions, rows, seed, &output),
        Commands::Stream {
            mode,
            dimensions,
            initial_rows,
            interval_ms,
            buffer,
            max_rows,
            seed,
            settings,
        } => cmd_stream(StreamOptions {
            mode,
            dimensions,
            initial_rows,
            interval: Duration::from_millis(interval_ms.max(1)),
            buffer,
            max_rows,
            seed,
            settings,
        }),
        Commands::Config { init } => cmd_config(init),
        Commands::Status => cmd_status(),
    }
}

fn cmd_aggregate(
    input: &Path,
    args: &SettingsArgs,
    no_fallback: bool,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let settings = args.resolve(&config)?;
    let dataset = load_dataset(input)?;

    let mut session = ClusterSession::new(settings, config.history_bound)
        .with_fallback(config.fallback_to_single_group && !no_fallback);
    let update = session.process(&dataset.rows, &dataset.dimensions);

    if let Some(ref anomaly) = update.view.anomaly {
        eprintln!(
            "Warning: grouping covered {} of {} dimensions{}",
            anomaly.assigned,
            anomaly.expected,
            if update.view.fell_back {
                ", using a single group"
            } else {
                ""
            }
        );
    }

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&update)?,
        OutputFormat::Jsonl => serde_json::to_string(&update)?,
    };
    write_output(&text, output)
}

fn cmd_timeline(
    input: &Path,
    args: &SettingsArgs,
    context_window: Option<usize>,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let settings = args.resolve(&config)?;
    let dataset = load_dataset(input)?;

    let views = cluster_over_time(&dataset.rows, &dataset.dimensions, &settings, context_window);
    if views.is_empty() {
        eprintln!(
            "Warning: dataset has {} rows, not enough for a timeline",
            dataset.len()
        );
    }

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&views)?,
        OutputFormat::Jsonl => views
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
    };
    write_output(&text, output)
}

fn cmd_generate(
    mode: GeneratorMode,
    dimensions: usize,
    rows: usize,
    seed: Option<u64>,
    output: &Path,
) -> anyhow::Result<()> {
    if dimensions == 0 {
        bail!("At least one dimension is required");
    }

    let mut generator = RowGenerator::new(GeneratorConfig {
        mode,
        dimensions,
        seed,
        ..GeneratorConfig::default()
    });
    let generated = generator.take_rows(rows);
    save_dataset(output, generator.dimensions(), &generated)?;

    println!(
        "Wrote {} rows x {} dimensions to {:?}",
        generated.len(),
        dimensions,
        output
    );
    Ok(())
}

struct StreamOptions {
    mode: GeneratorMode,
    dimensions: usize,
    initial_rows: usize,
    interval: Duration,
    buffer: usize,
    max_rows: Option<u64>,
    seed: Option<u64>,
    settings: SettingsArgs,
}

fn cmd_stream(options: StreamOptions) -> anyhow::Result<()> {
    if options.dimensions == 0 {
        bail!("At least one dimension is required");
    }

    println!("Stream Clusters v{VERSION}");
    println!();

    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let settings = options.settings.resolve(&config)?;

    println!("Streaming {:?} data...", options.mode);
    println!("  Dimensions: {}", options.dimensions);
    println!("  Grouping: {:?}", settings.grouping);
    println!(
        "  Compression: {}",
        if settings.active_compression().is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Throttle: {}ms", config.throttle_interval.as_millis());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let stats = create_shared_stats_with_persistence(config.data_path.join("stats.json"));

    let mut generator = RowGenerator::new(GeneratorConfig {
        mode: options.mode,
        dimensions: options.dimensions,
        seed: options.seed,
        ..GeneratorConfig::default()
    });
    let mut buffer = RowBuffer::with_capacity(options.buffer.max(1));
    buffer.set_dimensions(generator.dimensions().to_vec());
    buffer.extend(generator.take_rows(options.initial_rows))?;

    let mut session = ClusterSession::new(settings.clone(), config.history_bound)
        .with_fallback(config.fallback_to_single_group);

    let mut worker = ClusteringWorker::new(stats.clone());
    worker.start()?;
    println!("Worker ID: {}", worker.instance_id());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let throttle = config.throttle_interval;
    let timeline_interval = config.timeline_interval();
    // Force a pass on the first iteration.
    let mut last_pass: Option<Instant> = None;
    let mut last_timeline: Option<Instant> = None;
    let mut last_row = Instant::now();
    let mut streamed: u64 = 0;

    while running.load(Ordering::SeqCst) {
        if last_row.elapsed() >= options.interval {
            buffer.push(generator.next_row())?;
            last_row = Instant::now();
            streamed += 1;
            if options.max_rows.is_some_and(|max| streamed >= max) {
                running.store(false, Ordering::SeqCst);
            }
        }

        if last_pass.map_or(true, |t| t.elapsed() >= throttle) {
            worker.submit(Job::Aggregate {
                rows: Arc::from(buffer.rows()),
                dimensions: Arc::from(buffer.dimensions()),
                settings: settings.clone(),
                fallback: session.fallback_enabled(),
            })?;
            last_pass = Some(Instant::now());
        }

        if last_timeline.map_or(true, |t| t.elapsed() >= timeline_interval) {
            worker.submit(Job::Timeline {
                rows: Arc::from(buffer.rows()),
                dimensions: Arc::from(buffer.dimensions()),
                settings: settings.clone(),
                context_window: None,
            })?;
            last_timeline = Some(Instant::now());
        }

        while let Some(response) = worker.recv_timeout(Duration::from_millis(50))? {
            match response.outcome {
                JobOutcome::Aggregated(view) => {
                    let update = session.apply(view);
                    print_update(&update);
                }
                JobOutcome::Timeline(views) => {
                    let changes = views
                        .windows(2)
                        .filter(|pair| pair[0].assignment != pair[1].assignment)
                        .count();
                    println!(
                        "[timeline] {} positions, {} assignment changes",
                        views.len(),
                        changes
                    );
                }
            }
        }
    }

    println!();
    println!("Stopping stream...");
    worker.stop();

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save processing stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn print_update(update: &SessionUpdate) {
    let view = &update.view;
    let time = view
        .last_timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let groups: Vec<String> = view
        .groups
        .iter()
        .zip(highlights_by_group(&view.groups, &update.highlights))
        .map(|(group, highlights)| {
            let moved: Vec<String> = highlights
                .iter()
                .map(|h| format!("{}*{:.1}", h.dimension, h.opacity))
                .collect();
            if moved.is_empty() {
                format!("[{}]", group.dimensions.join(", "))
            } else {
                format!("[{}] moved: {}", group.dimensions.join(", "), moved.join(" "))
            }
        })
        .collect();

    println!(
        "[{}] {} groups, {} suppressed ticks{} | {}",
        time,
        view.groups.len(),
        view.boring_timestamps.len(),
        if view.fell_back { " (fallback)" } else { "" },
        groups.join(" | ")
    );
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    if init {
        config.save().context("Error saving config")?;
        println!("Wrote configuration to {:?}", Config::config_path());
        println!();
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(e) = config.settings() {
        eprintln!();
        eprintln!("Warning: stored settings are invalid: {e}");
    }
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Stream Clusters Status");
    println!("======================");
    println!();
    println!("Configuration:");
    match config.settings() {
        Ok(settings) => {
            println!("  Grouping: {:?}", settings.grouping);
            println!(
                "  Data ticks: {}",
                settings
                    .data_ticks
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "all".to_string())
            );
            println!(
                "  Compression: {}",
                if settings.active_compression().is_some() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!("  History depth: {}", settings.cluster_assignment_history_depth);
        }
        Err(e) => println!("  Invalid settings: {e}"),
    }
    println!("  Throttle: {}ms", config.throttle_interval.as_millis());
    println!();

    let stats_path = config.data_path.join("stats.json");
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)
            .with_context(|| format!("Could not read {stats_path:?}"))?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for (key, label) in [
            ("aggregation_passes", "Clustering passes"),
            ("timeline_passes", "Timeline passes"),
            ("anomalies", "Inconsistent groupings"),
            ("fallbacks", "Single-group fallbacks"),
            ("superseded", "Superseded requests"),
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {label}: {value}");
            }
        }
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

/// Write command output to a file or stdout.
fn write_output(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Could not write {path:?}"))?;
            println!("Wrote {path:?}");
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
