//! Demonstration of streaming clustering with a background worker.
//!
//! This example shows how to:
//! 1. Generate peak-shaped synthetic rows
//! 2. Hand clustering passes to a worker thread
//! 3. Apply results to a session and read highlights
//! 4. Run a timeline pass over the whole buffer
//!
//! Run with: cargo run --example stream_demo

use std::sync::Arc;
use std::time::Duration;

use stream_clusters::{
    config::{CompressionConfig, GroupingStrategy, Settings},
    core::{ClusterSession, RowBuffer},
    source::{GeneratorConfig, GeneratorMode, RowGenerator},
    stats::create_shared_stats,
    worker::{ClusteringWorker, Job, JobOutcome},
};

fn main() {
    println!("Stream Clusters - Stream Demo");
    println!("=============================");
    println!();

    let settings = Settings::new(GroupingStrategy::Count(3))
        .with_data_ticks(Some(30))
        .with_compression(CompressionConfig {
            mean_range: 0.01,
            tick_range: 5,
            save_screen_space: false,
        });

    let mut generator = RowGenerator::new(GeneratorConfig {
        mode: GeneratorMode::Peaks,
        dimensions: 6,
        seed: Some(42),
        ..GeneratorConfig::default()
    });
    let mut buffer = RowBuffer::with_capacity(200);
    buffer.set_dimensions(generator.dimensions().to_vec());

    let stats = create_shared_stats();
    let mut session = ClusterSession::new(settings.clone(), 20);
    let mut worker = ClusteringWorker::new(stats.clone());

    if let Err(e) = worker.start() {
        eprintln!("Error starting worker: {e}");
        return;
    }

    for tick in 0..60 {
        if let Err(e) = buffer.push(generator.next_row()) {
            eprintln!("Rejected row: {e}");
            break;
        }

        // Every fifth tick stands in for the throttle interval.
        if tick % 5 != 4 {
            continue;
        }

        let submitted = worker.submit(Job::Aggregate {
            rows: Arc::from(buffer.rows()),
            dimensions: Arc::from(buffer.dimensions()),
            settings: settings.clone(),
            fallback: true,
        });
        if let Err(e) = submitted {
            eprintln!("Error submitting pass: {e}");
            break;
        }

        match worker.recv_timeout(Duration::from_secs(5)) {
            Ok(Some(response)) => {
                if let JobOutcome::Aggregated(view) = response.outcome {
                    let update = session.apply(view);
                    let groups: Vec<String> = update
                        .view
                        .groups
                        .iter()
                        .map(|g| g.dimensions.join("+"))
                        .collect();
                    println!(
                        "tick {:>2}: {} | suppressed {} | moved {:?}",
                        tick,
                        groups.join("  "),
                        update.view.boring_timestamps.len(),
                        update
                            .highlights
                            .iter()
                            .map(|h| (h.dimension.as_str(), h.opacity))
                            .collect::<Vec<_>>()
                    );
                }
            }
            Ok(None) => println!("tick {tick:>2}: no result yet"),
            Err(e) => {
                eprintln!("Worker error: {e}");
                break;
            }
        }
    }

    println!();
    println!("Running timeline over {} rows...", buffer.len());
    let submitted = worker.submit(Job::Timeline {
        rows: Arc::from(buffer.rows()),
        dimensions: Arc::from(buffer.dimensions()),
        settings,
        context_window: Some(10),
    });
    if submitted.is_ok() {
        if let Ok(Some(response)) = worker.recv_timeout(Duration::from_secs(5)) {
            if let JobOutcome::Timeline(views) = response.outcome {
                println!("Timeline positions: {}", views.len());
            }
        }
    }

    worker.stop();
    println!();
    println!("{}", stats.summary());
}
