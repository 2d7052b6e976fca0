//! Randomized delays between browser actions.

use std::time::Duration;

use rand::Rng;

/// A delay window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pause {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Pause {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }
}

/// After opening a listing.
pub const AFTER_AD_NAVIGATION: Pause = Pause::new(0.8, 1.2);
/// Before retrying a failed listing.
pub const BEFORE_RETRY: Pause = Pause::new(1.5, 2.5);
/// After opening or refreshing a feed.
pub const AFTER_FEED_LOAD: Pause = Pause::new(2.0, 3.5);
/// Between processed listings on a feed.
pub const BETWEEN_ADS: Pause = Pause::new(0.5, 1.0);
/// Between scans of the same feed.
pub const BETWEEN_PASSES: Pause = Pause::new(1.0, 2.0);
/// While the price filter input is being edited.
pub const FILTER_INPUT: Pause = Pause::new(0.3, 0.7);
/// After the price filter was applied and the feed reloads.
pub const AFTER_FILTER_CHANGE: Pause = Pause::new(3.0, 5.0);
/// Between cities.
pub const BETWEEN_CITIES: Pause = Pause::new(2.0, 4.0);

/// Largest accepted scale; larger (or non-finite) values are capped.
pub const MAX_SCALE: f64 = 100.0;

/// Scales every pause; a scale of zero disables pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    scale: f64,
}

impl Pacing {
    pub fn new(scale: f64) -> Self {
        // `max`/`min` also map NaN to a bound.
        Self {
            scale: scale.max(0.0).min(MAX_SCALE),
        }
    }

    pub fn none() -> Self {
        Self::new(0.0)
    }

    /// A random duration inside `pause`, scaled.
    pub fn duration(&self, pause: Pause) -> Duration {
        if self.scale == 0.0 || pause.max_secs <= 0.0 {
            return Duration::ZERO;
        }
        let secs = if pause.max_secs > pause.min_secs {
            rand::thread_rng().gen_range(pause.min_secs..pause.max_secs)
        } else {
            pause.max_secs
        };
        Duration::try_from_secs_f64(secs * self.scale).unwrap_or(Duration::ZERO)
    }

    pub async fn pause(&self, pause: Pause) {
        let delay = self.duration(pause);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(1.0)
    }
}
