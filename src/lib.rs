//! `lightmatch` mirrors the color of a computer display onto a networked smart bulb.
//!
//! # Structure
//!
//! A match loop ([worker]) repeatedly grabs the screen ([grabber]), reduces it to a single color
//! ([image]), converts it to the HSBK representation used by the bulb ([color]) and sends it
//! over the network ([bulb]). Every color sent is published as a [worker::MatchEvent], which the
//! strip-chart view ([chart], and the `gui` window when enabled) keeps in rolling histories
//! ([history]).
//!
//! # License
//!
//! This source code is released under the [MIT-License](https://opensource.org/licenses/MIT)

#[macro_use]
extern crate tracing;

pub mod bulb;
pub mod chart;
pub mod color;
pub mod grabber;
#[cfg(feature = "gui")]
pub mod gui;
pub mod history;
pub mod image;
pub mod models;
pub mod serde;
pub mod worker;
