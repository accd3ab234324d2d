//! Rolling history of the colors sent to the bulb, one series per channel

use std::time::{Duration, Instant};

use strum::IntoEnumIterator;

use crate::{
    color::{Channel, Hsbk},
    history::RollingHistory,
    models::ChartConfig,
};

#[derive(Debug)]
pub struct ChartModel {
    hue: RollingHistory<f64>,
    saturation: RollingHistory<f64>,
    brightness: RollingHistory<f64>,
    kelvin: RollingHistory<f64>,
    redraw: Duration,
    last_push: Option<Instant>,
}

impl ChartModel {
    /// Create a chart with every point set to zero, then `seed` as the newest point
    pub fn new(config: &ChartConfig, seed: Hsbk) -> Self {
        let len = config.history_len;

        let mut model = Self {
            hue: RollingHistory::filled(len, 0.0),
            saturation: RollingHistory::filled(len, 0.0),
            brightness: RollingHistory::filled(len, 0.0),
            kelvin: RollingHistory::filled(len, 0.0),
            redraw: Duration::from_millis(config.redraw_ms),
            last_push: None,
        };

        model.push(seed);
        model
    }

    fn history(&self, channel: Channel) -> &RollingHistory<f64> {
        match channel {
            Channel::Hue => &self.hue,
            Channel::Saturation => &self.saturation,
            Channel::Brightness => &self.brightness,
            Channel::Kelvin => &self.kelvin,
        }
    }

    fn history_mut(&mut self, channel: Channel) -> &mut RollingHistory<f64> {
        match channel {
            Channel::Hue => &mut self.hue,
            Channel::Saturation => &mut self.saturation,
            Channel::Brightness => &mut self.brightness,
            Channel::Kelvin => &mut self.kelvin,
        }
    }

    /// Append a point to every series
    pub fn push(&mut self, color: Hsbk) {
        for channel in Channel::iter() {
            self.history_mut(channel)
                .put(f64::from(color.channel(channel)));
        }
    }

    /// Append `latest` if the redraw period elapsed since the previous tick
    ///
    /// Returns true if a point was added.
    pub fn tick(&mut self, now: Instant, latest: Hsbk) -> bool {
        if self.until_next_redraw(now) > Duration::ZERO {
            return false;
        }

        self.push(latest);
        self.last_push = Some(now);
        true
    }

    /// Time left before the next point is due
    pub fn until_next_redraw(&self, now: Instant) -> Duration {
        match self.last_push {
            Some(last) => (last + self.redraw).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Points of a series, oldest first, as `[x, y]` pairs
    pub fn series(&self, channel: Channel) -> Vec<[f64; 2]> {
        self.history(channel)
            .iter()
            .rev()
            .enumerate()
            .map(|(x, y)| [x as f64, *y])
            .collect()
    }

    /// Most recent value of a series
    pub fn latest(&self, channel: Channel) -> f64 {
        self.history(channel).latest().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.hue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hue.is_empty()
    }

    /// Vertical extent of a series
    pub fn y_range(channel: Channel) -> (f64, f64) {
        (0., f64::from(channel.max_value()))
    }
}
