//! Background color matching loop
//!
//! A [`MatchRunner`] owns the grabber, the sampler and the bulb. Every start spawns a task that
//! captures the screen, reduces it to a single color and sends it to the bulb, then reports what
//! happened to the observer through a bounded [`MatchEvent`] channel. Only one task drives the
//! bulb at a time: the parts live behind an async mutex that a new task must acquire first.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    runtime::Handle,
    select,
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    bulb::{self, Bulb, BulbError},
    color::{rgb_to_hsbk, Hsbk},
    grabber::{CaptureError, Grabber},
    image::Sampler,
    models::MatchConfig,
};

mod backoff;
pub use backoff::Backoff;

/// Notification sent by the match loop to its observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// A match loop acquired the bulb
    Started,
    /// A color was sent to the bulb
    Sample(Hsbk),
    /// A transient device error, the loop keeps going
    DeviceError(String),
    /// The loop finished normally (one-shot pass or stop request)
    Stopped,
    /// The loop ended because of an unrecoverable error
    Failed(String),
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("bulb error: {0}")]
    Bulb(#[from] BulbError),
    #[error("match task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchRunnerError {
    #[error("the match loop is already running")]
    AlreadyRunning,
}

/// Timing parameters of the match loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSettings {
    pub period: Duration,
    pub instant_threshold: Duration,
    pub continuous: bool,
    pub call_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl MatchSettings {
    /// Fade duration of each color change
    ///
    /// Short periods cut instantly to the new color, longer ones fade over the whole period.
    pub fn transition(&self) -> Duration {
        if self.period < self.instant_threshold {
            Duration::ZERO
        } else {
            self.period
        }
    }

    /// Acknowledgements are only requested at interactive update rates
    pub fn wait_for_ack(&self) -> bool {
        self.period < Duration::from_secs(1)
    }
}

impl From<&MatchConfig> for MatchSettings {
    fn from(config: &MatchConfig) -> Self {
        Self {
            period: Duration::from_millis(config.period_ms),
            instant_threshold: Duration::from_millis(config.instant_threshold_ms),
            continuous: config.continuous,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::from(&MatchConfig::default())
    }
}

/// Devices used by the match loop
pub struct MatchParts {
    pub grabber: Box<dyn Grabber>,
    pub sampler: Sampler,
    pub bulb: Box<dyn Bulb>,
}

struct MatchTask {
    token: CancellationToken,
    handle: JoinHandle<Result<(), MatchError>>,
}

pub struct MatchRunner {
    runtime: Handle,
    parts: Arc<Mutex<MatchParts>>,
    settings: MatchSettings,
    events: mpsc::Sender<MatchEvent>,
    label: String,
    task: Option<MatchTask>,
}

impl MatchRunner {
    pub async fn new(
        runtime: Handle,
        mut parts: MatchParts,
        settings: MatchSettings,
        events: mpsc::Sender<MatchEvent>,
    ) -> Self {
        let label = bulb::label_or_placeholder(parts.bulb.as_mut()).await;

        info!(
            bulb = %label,
            continuous = settings.continuous,
            period = ?settings.period,
            "initialized color match"
        );

        Self {
            runtime,
            parts: Arc::new(Mutex::new(parts)),
            settings,
            events,
            label,
            task: None,
        }
    }

    /// Label of the bulb, as read when the runner was created
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// true if a match task is running and has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.token.is_cancelled() && !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start matching colors, continuously or once depending on the settings
    pub fn start(&mut self, seed: Hsbk) -> Result<(), MatchRunnerError> {
        self.spawn(seed, self.settings.continuous)
    }

    /// Match a single color and stop
    pub fn start_once(&mut self, seed: Hsbk) -> Result<(), MatchRunnerError> {
        self.spawn(seed, false)
    }

    fn spawn(&mut self, seed: Hsbk, continuous: bool) -> Result<(), MatchRunnerError> {
        if self.is_running() {
            warn!("tried to start the color match again");
            return Err(MatchRunnerError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let settings = MatchSettings {
            continuous,
            ..self.settings.clone()
        };

        let handle = self.runtime.spawn(run(
            self.parts.clone(),
            settings,
            seed,
            token.clone(),
            self.events.clone(),
        ));

        // A previous task, if any, was cancelled or has finished
        self.task = Some(MatchTask { token, handle });
        Ok(())
    }

    /// Request the running task to stop, without waiting for it
    pub fn stop(&mut self) {
        if let Some(task) = &self.task {
            task.token.cancel();
        }
    }

    /// Wait for the current task to complete
    pub async fn wait(&mut self) -> Result<(), MatchError> {
        match self.task.take() {
            Some(task) => task.handle.await?,
            None => Ok(()),
        }
    }

    pub async fn stop_and_wait(&mut self) -> Result<(), MatchError> {
        self.stop();
        self.wait().await
    }
}

impl Drop for MatchRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[instrument(skip_all)]
async fn run(
    parts: Arc<Mutex<MatchParts>>,
    settings: MatchSettings,
    seed: Hsbk,
    token: CancellationToken,
    events: mpsc::Sender<MatchEvent>,
) -> Result<(), MatchError> {
    let mut parts = select! {
        parts = parts.lock_owned() => parts,
        _ = token.cancelled() => {
            events.send(MatchEvent::Stopped).await.ok();
            return Ok(());
        }
    };

    events.send(MatchEvent::Started).await.ok();
    debug!(continuous = settings.continuous, "color match started");

    let result = match_loop(&mut parts, &settings, seed, &token, &events).await;

    match &result {
        Ok(()) => {
            debug!("color match stopped");
            events.send(MatchEvent::Stopped).await.ok();
        }
        Err(error) => {
            error!(error = %error, "color match failed");
            events.send(MatchEvent::Failed(error.to_string())).await.ok();
        }
    }

    result
}

async fn match_loop(
    parts: &mut MatchParts,
    settings: &MatchSettings,
    seed: Hsbk,
    token: &CancellationToken,
    events: &mpsc::Sender<MatchEvent>,
) -> Result<(), MatchError> {
    let transition = settings.transition();
    let wait_for_ack = settings.wait_for_ack();
    let mut backoff = Backoff::new(settings.backoff_initial, settings.backoff_max);
    let mut previous = seed;

    while !token.is_cancelled() {
        let started = Instant::now();

        let image = parts.grabber.grab().await?;
        let rgb = parts.sampler.sample(&image)?;
        let color = rgb_to_hsbk(rgb, previous.kelvin);

        let sent = tokio::time::timeout(
            settings.call_timeout,
            parts.bulb.set_color(color, transition, wait_for_ack),
        )
        .await
        .unwrap_or_else(|_| Err(BulbError::Timeout(settings.call_timeout)));

        if let Err(error) = sent {
            if !error.is_transient() {
                return Err(error.into());
            }

            let delay = backoff.next_delay();
            warn!(error = %error, delay = ?delay, "device error, retrying");
            events.try_send(MatchEvent::DeviceError(error.to_string())).ok();

            select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => continue,
            }
        }

        backoff.reset();
        previous = color;
        trace!(color = ?color, "sent color");

        if let Err(mpsc::error::TrySendError::Full(_)) = events.try_send(MatchEvent::Sample(color))
        {
            trace!("observer is lagging, dropped sample");
        }

        if !settings.continuous {
            break;
        }

        select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep_until(started + settings.period) => {}
        }
    }

    Ok(())
}
