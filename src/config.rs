use std::time::Duration;

use anyhow::Result;

pub struct Config {
    /// adapter minor, `/dev/dri/card<N>`
    pub card: u32,
    pub frame_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            card: env("SCANOUT_CARD").unwrap_or(0) as u32,
            frame_interval: Duration::from_millis(env("SCANOUT_INTERVAL_MS").unwrap_or(1000)),
        }
    }
}

impl Config {
    pub fn setup() -> Result<Config> {
        Ok(Config::default())
    }
}

fn env(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}
