use std::time::Instant;

use anyhow::Context;
use scanout::{config::Config, Surface};

fn main() -> anyhow::Result<()> {
    let _guard = setup_tracing();
    let config = Config::setup()?;

    let mut surface = Surface::open(config.card)
        .with_context(|| format!("failed to take over card{}", config.card))?;

    let (w, h) = (surface.width(), surface.height());
    tracing::info!("scanning out at {w}x{h}");

    let colors: [u32; 3] = [0x00cc4444, 0x0044cc44, 0x004444cc];
    let bar = (w / 8).max(1);

    let mut frame: u32 = 0;
    loop {
        let started = Instant::now();
        surface.fill_rect(0, 0, w, h, colors[frame as usize % colors.len()])?;
        let x0 = (frame * bar) % w;
        let x1 = (x0 + bar).min(w);
        surface.fill_rect(x0, 0, x1, h, 0x00ffffff)?;
        tracing::debug!(frame, elapsed = ?started.elapsed(), "draw");

        let started = Instant::now();
        surface.swap().context("page flip failed")?;
        tracing::debug!(frame, elapsed = ?started.elapsed(), "swap");

        frame = frame.wrapping_add(1);
        std::thread::sleep(config.frame_interval);
    }
}

fn setup_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_appender::{non_blocking, rolling::never};
    // the display belongs to us while this runs, so logs go to a file
    std::fs::remove_file(".log").ok();
    let (log, guard) = non_blocking(never(".", ".log"));
    tracing_subscriber::fmt()
        .with_writer(log)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    guard
}
