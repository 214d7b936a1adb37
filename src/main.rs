//! Demo replay: a spliced video recording and a whiteboard replay kept in
//! sync on simulated engines. Log level is taken from `RUST_LOG`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use syncplay::adapter::{MediaEngine, SegmentedVideoTrack, WhiteboardTrack};
use syncplay::core::time::format_time;
use syncplay::core::{Segment, SegmentList, Track};
use syncplay::playback::{ReplayEvent, ReplaySession};
use syncplay::sim::{SimSettings, SimulatedEngine};
use syncplay::SyncConfig;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BOARD_SOURCE: &str = "board";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncplay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SyncConfig::from_env()?;
    info!(?config, "starting demo replay");

    let video_engine = SimulatedEngine::spawn(
        "video",
        SimSettings::default()
            .with_duration("part1.m3u8", 6_000)
            .with_duration("part2.m3u8", 8_000),
    )?;
    let segments = SegmentList::from_segments([
        Segment::new(0, 6_000, "part1.m3u8"),
        Segment::new(9_000, 17_000, "part2.m3u8"),
    ])?;
    let video = SegmentedVideoTrack::new("video", Arc::clone(&video_engine), segments);

    let board_engine = SimulatedEngine::spawn(
        "board",
        SimSettings::default().with_duration(BOARD_SOURCE, 18_000),
    )?;
    let board = WhiteboardTrack::new("board", Arc::clone(&board_engine));
    board_engine.load(BOARD_SOURCE);

    // The whiteboard is the longest track and serves as the clock
    let tracks: Vec<Arc<dyn Track>> = vec![video, board];
    let session = ReplaySession::start(tracks, 1, config)?;
    let printer = spawn_printer(&session)?;

    session.play()?;
    thread::sleep(Duration::from_secs(2));

    info!("injecting a video stall");
    video_engine.stall(1_500);
    thread::sleep(Duration::from_secs(3));

    session.seek(10_000)?;
    thread::sleep(Duration::from_secs(2));

    session.set_playback_speed(1.5)?;
    thread::sleep(Duration::from_secs(3));

    info!(position = %format_time(session.current_time()), "closing");
    session.close()?;
    if printer.join().is_err() {
        tracing::error!("event printer panicked");
    }
    Ok(())
}

/// Print session events on a small async runtime until the session closes
fn spawn_printer(session: &ReplaySession) -> std::io::Result<thread::JoinHandle<()>> {
    let mut events = session.subscribe();
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    match events.recv().await {
                        Ok(ReplayEvent::Closed) | Err(RecvError::Closed) => break,
                        Ok(ReplayEvent::Position { time_ms, duration_ms }) => {
                            info!("{} / {}", format_time(time_ms), format_time(duration_ms));
                        }
                        Ok(event) => info!(?event, "replay event"),
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "event printer lagging");
                        }
                    }
                }
            })
        })
}
