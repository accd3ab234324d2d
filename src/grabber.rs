use async_trait::async_trait;
use image::{imageops, RgbaImage};
use thiserror::Error;

use crate::models::CaptureTarget;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture not supported: {0}")]
    NotSupported(&'static str),
    #[error("no display available")]
    NoDisplay,
    #[error("display {index} does not exist ({count} available)")]
    InvalidDisplay { index: usize, count: usize },
    #[error("capture region {0} does not cover any display")]
    EmptyRegion(CaptureTarget),
    #[error("captured image is empty")]
    EmptyImage,
    #[cfg(feature = "screen")]
    #[error("capture backend error: {0}")]
    Backend(#[from] xcap::XCapError),
    #[error("capture task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Position and size of a display on the virtual desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl DisplayRect {
    /// Build a rectangle from its corners, `None` if it is empty
    pub fn from_corners(left: i32, top: i32, right: i32, bottom: i32) -> Option<Self> {
        if right <= left || bottom <= top {
            return None;
        }

        Some(Self {
            left,
            top,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }

    pub fn intersects(&self, other: &DisplayRect) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    pub fn union(&self, other: &DisplayRect) -> DisplayRect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);

        DisplayRect {
            left,
            top,
            width: (self.right().max(other.right()) - left) as u32,
            height: (self.bottom().max(other.bottom()) - top) as u32,
        }
    }
}

/// Resolve the region of the virtual desktop covered by `target`
pub fn capture_region(
    target: CaptureTarget,
    displays: &[DisplayRect],
) -> Result<DisplayRect, CaptureError> {
    match target {
        CaptureTarget::All => displays
            .iter()
            .copied()
            .reduce(|a, b| a.union(&b))
            .ok_or(CaptureError::NoDisplay),
        CaptureTarget::Monitor(index) => {
            displays
                .get(index)
                .copied()
                .ok_or(CaptureError::InvalidDisplay {
                    index,
                    count: displays.len(),
                })
        }
        CaptureTarget::Rect {
            left,
            top,
            right,
            bottom,
        } => {
            let rect = DisplayRect::from_corners(left, top, right, bottom)
                .ok_or(CaptureError::EmptyRegion(target))?;

            if displays.iter().any(|display| display.intersects(&rect)) {
                Ok(rect)
            } else {
                Err(CaptureError::EmptyRegion(target))
            }
        }
    }
}

/// Paste display captures onto an image covering `region`
///
/// Areas not covered by any capture are left black.
pub fn compose(
    region: DisplayRect,
    captures: impl IntoIterator<Item = (DisplayRect, RgbaImage)>,
) -> RgbaImage {
    let mut canvas = RgbaImage::new(region.width, region.height);

    for (rect, image) in captures {
        imageops::replace(
            &mut canvas,
            &image,
            (rect.left - region.left) as i64,
            (rect.top - region.top) as i64,
        );
    }

    canvas
}

#[async_trait]
pub trait Grabber: Send {
    /// Capture the current content of the screen
    async fn grab(&mut self) -> Result<RgbaImage, CaptureError>;

    /// List the available displays
    async fn displays(&mut self) -> Result<Vec<DisplayRect>, CaptureError>;
}

/// Grabber for the physical displays
pub struct ScreenGrabber {
    target: CaptureTarget,
}

impl ScreenGrabber {
    pub fn new(target: CaptureTarget) -> Result<Self, CaptureError> {
        if cfg!(feature = "screen") {
            Ok(Self { target })
        } else {
            Err(CaptureError::NotSupported(
                "lightmatch was built without the `screen` feature",
            ))
        }
    }
}

#[async_trait]
impl Grabber for ScreenGrabber {
    async fn grab(&mut self) -> Result<RgbaImage, CaptureError> {
        let target = self.target;
        tokio::task::spawn_blocking(move || screen::grab(target)).await?
    }

    async fn displays(&mut self) -> Result<Vec<DisplayRect>, CaptureError> {
        tokio::task::spawn_blocking(screen::displays).await?
    }
}

#[cfg(feature = "screen")]
mod screen {
    use image::RgbaImage;
    use xcap::Monitor;

    use super::{capture_region, compose, CaptureError, DisplayRect};
    use crate::models::CaptureTarget;

    fn monitor_rect(monitor: &Monitor) -> DisplayRect {
        DisplayRect {
            left: monitor.x(),
            top: monitor.y(),
            width: monitor.width(),
            height: monitor.height(),
        }
    }

    pub fn displays() -> Result<Vec<DisplayRect>, CaptureError> {
        Ok(Monitor::all()?.iter().map(monitor_rect).collect())
    }

    pub fn grab(target: CaptureTarget) -> Result<RgbaImage, CaptureError> {
        let monitors = Monitor::all()?;
        let rects: Vec<_> = monitors.iter().map(monitor_rect).collect();
        let region = capture_region(target, &rects)?;

        let captures = monitors
            .iter()
            .zip(rects)
            .filter(|(_, rect)| rect.intersects(&region))
            .map(|(monitor, rect)| Ok((rect, monitor.capture_image()?)))
            .collect::<Result<Vec<_>, CaptureError>>()?;

        trace!(?region, displays = captures.len(), "captured screen");
        Ok(compose(region, captures))
    }
}

#[cfg(not(feature = "screen"))]
mod screen {
    use image::RgbaImage;

    use super::{CaptureError, DisplayRect};
    use crate::models::CaptureTarget;

    const UNSUPPORTED: CaptureError =
        CaptureError::NotSupported("lightmatch was built without the `screen` feature");

    pub fn displays() -> Result<Vec<DisplayRect>, CaptureError> {
        Err(UNSUPPORTED)
    }

    pub fn grab(_target: CaptureTarget) -> Result<RgbaImage, CaptureError> {
        Err(UNSUPPORTED)
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn dual_head() -> Vec<DisplayRect> {
        vec![
            DisplayRect {
                left: 0,
                top: 0,
                width: 4,
                height: 2,
            },
            DisplayRect {
                left: 4,
                top: 0,
                width: 2,
                height: 2,
            },
        ]
    }

    #[test]
    fn test_screen_grabber_availability() {
        let grabber = ScreenGrabber::new(CaptureTarget::All);

        if cfg!(feature = "screen") {
            assert!(grabber.is_ok());
        } else {
            assert!(matches!(grabber, Err(CaptureError::NotSupported(_))));
        }
    }

    #[test]
    fn test_region_all_covers_every_display() {
        assert_eq!(
            DisplayRect {
                left: 0,
                top: 0,
                width: 6,
                height: 2
            },
            capture_region(CaptureTarget::All, &dual_head()).unwrap()
        );
        assert!(matches!(
            capture_region(CaptureTarget::All, &[]),
            Err(CaptureError::NoDisplay)
        ));
    }

    #[test]
    fn test_region_single_display() {
        assert_eq!(
            dual_head()[1],
            capture_region(CaptureTarget::Monitor(1), &dual_head()).unwrap()
        );
        assert!(matches!(
            capture_region(CaptureTarget::Monitor(2), &dual_head()),
            Err(CaptureError::InvalidDisplay { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_region_rectangle() {
        let inside = CaptureTarget::Rect {
            left: 3,
            top: 0,
            right: 5,
            bottom: 1,
        };
        assert_eq!(
            DisplayRect {
                left: 3,
                top: 0,
                width: 2,
                height: 1
            },
            capture_region(inside, &dual_head()).unwrap()
        );

        let outside = CaptureTarget::Rect {
            left: 10,
            top: 10,
            right: 20,
            bottom: 20,
        };
        assert!(matches!(
            capture_region(outside, &dual_head()),
            Err(CaptureError::EmptyRegion(_))
        ));

        let empty = CaptureTarget::Rect {
            left: 2,
            top: 0,
            right: 2,
            bottom: 1,
        };
        assert!(matches!(
            capture_region(empty, &dual_head()),
            Err(CaptureError::EmptyRegion(_))
        ));
    }

    #[test]
    fn test_compose_places_displays() {
        let displays = dual_head();
        let red = Rgba([255, 0, 0, 255]);
        let blue = Rgba([0, 0, 255, 255]);

        let region = DisplayRect {
            left: 3,
            top: 0,
            width: 2,
            height: 2,
        };
        let composed = compose(
            region,
            vec![
                (displays[0], RgbaImage::from_pixel(4, 2, red)),
                (displays[1], RgbaImage::from_pixel(2, 2, blue)),
            ],
        );

        assert_eq!((2, 2), composed.dimensions());
        assert_eq!(red, *composed.get_pixel(0, 1));
        assert_eq!(blue, *composed.get_pixel(1, 1));
    }
}
