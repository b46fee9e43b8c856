mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cl_core::config::Config;
use cl_player::{ClockDecoderFactory, Player};
use cl_probe::{default_prober, DurationResolver, ProbeOutcome, ProgressEvent};
use cl_timeline::SegmentRegistry;
use clap::Parser;
use cli::{Cli, Commands};
use clipline::report::{self, ProbeRow, TimelineReport};
use clipline::segments::build_segments;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::StreamExt;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipline=trace,cl_player=trace,cl_probe=debug,cl_timeline=debug,cl_core=debug"
                .to_string()
        } else {
            "clipline=info,cl_player=info,cl_probe=info,cl_timeline=warn,cl_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { sources, json } => {
            let config = Config::load_or_default(cli.config.as_deref());
            block_on(probe_sources(&config, &sources, json))
        }
        Commands::Timeline {
            sources,
            declared,
            json,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            block_on(show_timeline(&config, &sources, &declared, json))
        }
        Commands::Play {
            sources,
            declared,
            seek,
            speed,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            block_on(play(&config, &sources, &declared, seek, speed))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

fn resolver(config: &Config) -> Result<DurationResolver> {
    let prober = default_prober(&config.probe)?;
    Ok(DurationResolver::from_config(
        Arc::new(prober),
        &config.probe,
    ))
}

async fn probe_sources(config: &Config, sources: &[String], json: bool) -> Result<()> {
    let segments = build_segments(sources, &[])?;
    let resolver = resolver(config)?;

    let mut events: Vec<ProgressEvent> = resolver.resolve_all(&segments).collect().await;
    events.sort_by_key(|e| e.index);

    let rows: Vec<ProbeRow> = events
        .iter()
        .map(|e| {
            let source = sources.get(e.index).map(String::as_str).unwrap_or("?");
            ProbeRow::new(source, &e.outcome)
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!("{}", row.render());
        }
    }

    Ok(())
}

async fn show_timeline(
    config: &Config,
    sources: &[String],
    declared: &[f64],
    json: bool,
) -> Result<()> {
    let segments = build_segments(sources, declared)?;
    let mut registry = SegmentRegistry::register(segments.clone())?;
    let resolver = resolver(config)?;

    tracing::info!(segments = segments.len(), "resolving durations");
    let mut progress = resolver.resolve_all(&segments);
    while let Some(event) = progress.next().await {
        eprintln!("{}", report::progress_line(&event));
        if let ProbeOutcome::Resolved { seconds } = &event.outcome {
            registry.update_resolved_duration(&event.segment_id, *seconds);
        }
    }

    let timeline = registry.timeline().clone();
    let report = TimelineReport::new(&timeline, registry.segments());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Timeline ({} segments):", report.segments.len());
        print!("{}", report.render());
    }

    Ok(())
}

async fn play(
    config: &Config,
    sources: &[String],
    declared: &[f64],
    seek: Option<f64>,
    speed: f64,
) -> Result<()> {
    if !(speed.is_finite() && speed > 0.0) {
        anyhow::bail!("--speed must be a positive number, got {speed}");
    }

    let segments = build_segments(sources, declared)?;
    let factory = Arc::new(ClockDecoderFactory::new(&config.clock).with_rate(speed));
    let player = Player::new(segments, factory, &config.player)?;

    let resolver = resolver(config)?;
    let mut progress = player.resolve_durations(&resolver);
    while let Some(event) = progress.next().await {
        eprintln!("{}", report::progress_line(&event));
    }
    print!(
        "{}",
        TimelineReport::new(&player.timeline(), &player.segments()).render()
    );

    let transport = player.transport();
    let mut events = transport.subscribe();
    if let Some(target) = seek {
        player.seek(target)?;
    }
    player.play()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let last = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break transport.snapshot();
            }
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", report::transport_line(&event));
                    if event.snapshot.status.is_settled() {
                        break event.snapshot;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "transport output lagged");
                }
                Err(RecvError::Closed) => break transport.snapshot(),
            },
        }
    };

    player.shutdown().await;

    if let Some(error) = last.last_error {
        anyhow::bail!("playback failed: {error}");
    }
    println!(
        "Stopped at {} of {} ({})",
        report::format_seconds(last.global_time),
        report::format_seconds(last.total_duration),
        last.status
    );
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p).with_context(|| format!("failed to load {}", p.display()))?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    println!("✓ Configuration is valid");
    println!(
        "  Player: {} event buffer, {} recent events",
        config.player.event_capacity, config.player.recent_events
    );
    println!(
        "  Probe: concurrency {}, timeout {}",
        config.probe.concurrency,
        config
            .probe
            .timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  Clock: {}ms tick", config.clock.tick_millis);
    for warning in &warnings {
        println!("  warning: {warning}");
    }

    Ok(())
}
