//! HSBK color representation and conversions

use palette::{FromColor, Hsv, Srgb};
use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumIter, IntoStaticStr};

use crate::models::Color;

/// Lowest color temperature accepted by the bulbs, in Kelvin
pub const KELVIN_MIN: u16 = 1500;
/// Highest color temperature accepted by the bulbs, in Kelvin
pub const KELVIN_MAX: u16 = 9000;
/// Default color temperature, in Kelvin
pub const KELVIN_DEFAULT: u16 = 3500;

/// Hue, saturation, brightness and color temperature
///
/// Hue, saturation and brightness span the full 16-bit range. The temperature is in Kelvin and
/// only matters for unsaturated colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl Hsbk {
    pub const fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    pub fn channel(&self, channel: Channel) -> u16 {
        match channel {
            Channel::Hue => self.hue,
            Channel::Saturation => self.saturation,
            Channel::Brightness => self.brightness,
            Channel::Kelvin => self.kelvin,
        }
    }

    pub fn set_channel(&mut self, channel: Channel, value: u16) {
        match channel {
            Channel::Hue => self.hue = value,
            Channel::Saturation => self.saturation = value,
            Channel::Brightness => self.brightness = value,
            Channel::Kelvin => self.kelvin = clamp_kelvin(value),
        }
    }
}

impl Default for Hsbk {
    fn default() -> Self {
        Self::new(0, 0, u16::MAX, KELVIN_DEFAULT)
    }
}

/// One of the four HSBK channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Hue,
    Saturation,
    Brightness,
    Kelvin,
}

impl Channel {
    /// Upper bound of the values this channel takes
    pub fn max_value(self) -> u16 {
        match self {
            Channel::Kelvin => KELVIN_MAX,
            _ => u16::MAX,
        }
    }
}

pub fn clamp_kelvin(kelvin: u16) -> u16 {
    kelvin.clamp(KELVIN_MIN, KELVIN_MAX)
}

fn to_u16(x: f32) -> u16 {
    // Truncated, like the LIFX reference conversion
    (x.clamp(0.0, 1.0) * u16::MAX as f32) as u16
}

fn from_u16(x: u16) -> f32 {
    x as f32 / u16::MAX as f32
}

/// Convert an RGB color to HSBK
///
/// RGB alone does not say anything about the color temperature, so the given `kelvin` value is
/// carried over (within the device bounds).
pub fn rgb_to_hsbk(rgb: Color, kelvin: u16) -> Hsbk {
    let hsv: Hsv = Hsv::from_color(rgb.into_format::<f32>());

    Hsbk {
        hue: to_u16(hsv.hue.into_positive_degrees() / 360.0),
        saturation: to_u16(hsv.saturation),
        brightness: to_u16(hsv.value),
        kelvin: clamp_kelvin(kelvin),
    }
}

/// Approximate the RGB color a bulb displays for the given HSBK value
///
/// Unsaturated colors are tinted by the whitepoint of their temperature.
pub fn hsbk_to_rgb(color: Hsbk) -> Color {
    let saturation = from_u16(color.saturation);
    let hsv: Hsv = Hsv::new(
        from_u16(color.hue) * 360.0,
        saturation,
        from_u16(color.brightness),
    );
    let rgb: Srgb = Srgb::from_color(hsv);
    let (r, g, b) = rgb.into_components();
    let (wr, wg, wb) = kelvin_to_rgbf32(color.kelvin as f32);

    let tint = |c: f32, w: f32| c * (saturation + (1.0 - saturation) * w);
    Srgb::new(tint(r, wr), tint(g, wg), tint(b, wb)).into_format()
}

/// Return the whitepoint for a given color temperature
///
/// # Parameters
///
/// * `t`: temperature in Kelvin
fn kelvin_to_rgbf32(t: f32) -> (f32, f32, f32) {
    // http://www.tannerhelland.com/4435/convert-temperature-rgb-algorithm-code/
    let t = f64::from(t).clamp(1000.0, 40000.0) / 100.0;

    let r = if t <= 66.0 {
        255.0
    } else {
        329.698_727_446 * (t - 60.0).powf(-0.133_204_759_2)
    };

    let g = if t <= 66.0 {
        99.470_802_586_1 * t.ln() - 161.119_568_166_1
    } else {
        288.122_169_528_3 * (t - 60.0).powf(-0.075_514_849_2)
    };

    let b = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        138.517_731_223_1 * (t - 10.0).ln() - 305.044_792_730_7
    };

    let scale = |x: f64| (x.clamp(0.0, 255.0) / 255.0) as f32;
    (scale(r), scale(g), scale(b))
}
