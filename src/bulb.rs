use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    color::Hsbk,
    models::{BulbConfig, BulbKind},
};

// Bulb implementation modules

mod dummy;
pub use dummy::DummyBulb;

mod lifx;
pub use lifx::{parse_serial, LifxBulb};

/// Label reported for bulbs whose label cannot be read
pub const LABEL_PLACEHOLDER: &str = "<LABEL-ERR>";

#[derive(Debug, Error)]
pub enum BulbError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply after {0:?}")]
    Timeout(Duration),
    #[error("protocol error: {0}")]
    Protocol(#[from] lifx_core::Error),
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("invalid serial number: {0}")]
    InvalidSerial(String),
    #[error("could not resolve address: {0}")]
    Resolve(String),
}

impl BulbError {
    /// true if retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_))
    }
}

#[async_trait]
pub trait Bulb: Send {
    /// Change the color of the bulb
    ///
    /// # Parameters
    ///
    /// * `color`: new color
    /// * `transition`: duration of the fade from the current color
    /// * `wait_for_ack`: wait for the device to acknowledge the command
    async fn set_color(
        &mut self,
        color: Hsbk,
        transition: Duration,
        wait_for_ack: bool,
    ) -> Result<(), BulbError>;

    /// Read the label of the bulb
    async fn label(&mut self) -> Result<String, BulbError>;
}

/// Read the label of the bulb, or a placeholder if it fails
pub async fn label_or_placeholder(bulb: &mut dyn Bulb) -> String {
    match bulb.label().await {
        Ok(label) => label,
        Err(error) => {
            debug!(error = %error, "failed to read bulb label");
            LABEL_PLACEHOLDER.to_owned()
        }
    }
}

/// Create the bulb described by `config`
#[instrument(skip(config))]
pub async fn from_config(config: &BulbConfig) -> Result<Box<dyn Bulb>, BulbError> {
    let bulb: Box<dyn Bulb> = match config.kind {
        BulbKind::Lifx => Box::new(LifxBulb::new(config).await?),
        BulbKind::Dummy => Box::new(DummyBulb::new(config.dummy_mode)),
    };

    Ok(bulb)
}
