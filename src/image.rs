//! Reduction of captured images to a single color

use std::collections::HashMap;

use image::{imageops, RgbaImage};

use crate::{
    grabber::CaptureError,
    models::{CaptureConfig, Color, SamplePolicy},
};

const BLACK: [u8; 3] = [0, 0, 0];
const WHITE: [u8; 3] = [255, 255, 255];

#[derive(Debug, Clone)]
pub struct Sampler {
    policy: SamplePolicy,
    mode_grid: u32,
}

impl Sampler {
    pub fn new(policy: SamplePolicy, mode_grid: u32) -> Self {
        Self {
            policy,
            mode_grid: mode_grid.max(1),
        }
    }

    pub fn policy(&self) -> SamplePolicy {
        self.policy
    }

    /// Compute the color representing the given image
    pub fn sample(&self, image: &RgbaImage) -> Result<Color, CaptureError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CaptureError::EmptyImage);
        }

        Ok(match self.policy {
            SamplePolicy::Mean => mean_color(image),
            SamplePolicy::Mode => mode_color(image, self.mode_grid),
        })
    }
}

impl From<&CaptureConfig> for Sampler {
    fn from(config: &CaptureConfig) -> Self {
        Self::new(config.policy, config.mode_grid)
    }
}

/// Average color of all pixels, ignoring alpha
fn mean_color(image: &RgbaImage) -> Color {
    let mut r_acc = 0u64;
    let mut g_acc = 0u64;
    let mut b_acc = 0u64;

    for pixel in image.pixels() {
        let [r, g, b, _] = pixel.0;
        r_acc += r as u64;
        g_acc += g as u64;
        b_acc += b as u64;
    }

    let cnt = (image.width() as u64 * image.height() as u64).max(1);

    // Round to nearest
    Color::new(
        ((r_acc + cnt / 2) / cnt) as u8,
        ((g_acc + cnt / 2) / cnt) as u8,
        ((b_acc + cnt / 2) / cnt) as u8,
    )
}

/// Most frequent color of the image downsampled to a `grid` x `grid` image
///
/// Pure black and pure white pixels are ignored. Ties are broken by the first occurrence in
/// row-major order. If every pixel is ignored, the mean of the downsampled image is used.
fn mode_color(image: &RgbaImage, grid: u32) -> Color {
    let small = imageops::resize(
        image,
        grid.min(image.width()),
        grid.min(image.height()),
        imageops::FilterType::Triangle,
    );

    // color -> (count, first index)
    let mut counts: HashMap<[u8; 3], (usize, usize)> = HashMap::new();
    for (i, pixel) in small.pixels().enumerate() {
        let [r, g, b, _] = pixel.0;
        let rgb = [r, g, b];

        if rgb == BLACK || rgb == WHITE {
            continue;
        }

        counts.entry(rgb).or_insert((0, i)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (a_cnt, a_idx)), (_, (b_cnt, b_idx))| {
            a_cnt.cmp(b_cnt).then(b_idx.cmp(a_idx))
        })
        .map(|([r, g, b], _)| Color::new(r, g, b))
        .unwrap_or_else(|| mean_color(&small))
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn striped(colors: &[[u8; 3]]) -> RgbaImage {
        RgbaImage::from_fn(colors.len() as u32, 1, |x, _| {
            let [r, g, b] = colors[x as usize];
            Rgba([r, g, b, 255])
        })
    }

    #[test]
    fn test_mean_of_uniform_image() {
        let image = RgbaImage::from_pixel(64, 32, Rgba([10, 200, 30, 255]));
        let sampler = Sampler::new(SamplePolicy::Mean, 100);

        assert_eq!(Color::new(10, 200, 30), sampler.sample(&image).unwrap());
    }

    #[test]
    fn test_mean_averages_pixels() {
        let image = striped(&[[0, 0, 0], [255, 100, 50], [255, 100, 50], [255, 0, 0]]);
        let sampler = Sampler::new(SamplePolicy::Mean, 100);

        // (0 + 255 + 255 + 255) / 4 = 191.25, (0 + 100 + 100 + 0) / 4 = 50
        assert_eq!(Color::new(191, 50, 25), sampler.sample(&image).unwrap());
    }

    #[test]
    fn test_mode_ignores_black_and_white() {
        let image = striped(&[
            [0, 0, 0],
            [0, 0, 0],
            [0, 0, 0],
            [255, 255, 255],
            [255, 255, 255],
            [12, 34, 56],
            [12, 34, 56],
            [99, 99, 99],
        ]);
        let sampler = Sampler::new(SamplePolicy::Mode, 100);

        assert_eq!(Color::new(12, 34, 56), sampler.sample(&image).unwrap());
    }

    #[test]
    fn test_mode_ties_go_to_first_color() {
        let image = striped(&[[1, 2, 3], [4, 5, 6], [4, 5, 6], [1, 2, 3]]);
        let sampler = Sampler::new(SamplePolicy::Mode, 100);

        assert_eq!(Color::new(1, 2, 3), sampler.sample(&image).unwrap());
    }

    #[test]
    fn test_mode_falls_back_to_mean() {
        let image = striped(&[[0, 0, 0], [255, 255, 255]]);
        let sampler = Sampler::new(SamplePolicy::Mode, 100);

        assert_eq!(Color::new(128, 128, 128), sampler.sample(&image).unwrap());
    }

    #[test]
    fn test_mode_on_downsampled_image() {
        let image = RgbaImage::from_pixel(400, 300, Rgba([40, 80, 120, 255]));
        let sampler = Sampler::new(SamplePolicy::Mode, 16);

        assert_eq!(Color::new(40, 80, 120), sampler.sample(&image).unwrap());
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let sampler = Sampler::new(SamplePolicy::Mean, 100);

        assert!(matches!(
            sampler.sample(&RgbaImage::new(0, 0)),
            Err(CaptureError::EmptyImage)
        ));
    }
}
