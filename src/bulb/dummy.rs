use std::{fmt::Write, time::Duration};

use async_trait::async_trait;

use super::{Bulb, BulbError};
use crate::{
    color::{hsbk_to_rgb, Hsbk},
    models::DummyBulbMode,
};

/// Bulb that only logs the colors it receives
pub struct DummyBulb {
    mode: DummyBulbMode,
    ansi_buf: String,
    last_color: Option<Hsbk>,
}

impl DummyBulb {
    pub fn new(mode: DummyBulbMode) -> Self {
        Self {
            mode,
            ansi_buf: String::new(),
            last_color: None,
        }
    }

    pub fn last_color(&self) -> Option<Hsbk> {
        self.last_color
    }
}

#[async_trait]
impl Bulb for DummyBulb {
    async fn set_color(
        &mut self,
        color: Hsbk,
        transition: Duration,
        _wait_for_ack: bool,
    ) -> Result<(), BulbError> {
        self.last_color = Some(color);

        match self.mode {
            DummyBulbMode::Text => {
                info!(
                    hue = %format_args!("{:5}", color.hue),
                    saturation = %format_args!("{:5}", color.saturation),
                    brightness = %format_args!("{:5}", color.brightness),
                    kelvin = %format_args!("{:4}", color.kelvin),
                    transition = ?transition,
                );
            }

            DummyBulbMode::Ansi => {
                let rgb = hsbk_to_rgb(color);

                // Build a truecolor ANSI swatch
                self.ansi_buf.clear();
                write!(
                    &mut self.ansi_buf,
                    "\x1B[38;2;{red};{green};{blue}m████\x1B[0m",
                    red = rgb.red,
                    green = rgb.green,
                    blue = rgb.blue
                )
                .expect("failed to format escape sequence");

                info!("{}", &self.ansi_buf);
            }
        }

        Ok(())
    }

    async fn label(&mut self) -> Result<String, BulbError> {
        Ok("dummy".to_owned())
    }
}
