// Data models: the values that flow from the CSV loader into the pipeline.
//
// Images are fixed-width (28 x 28 pixels) and labels are validated digits,
// so everything downstream can index without re-checking shapes.

use anyhow::Result;
use ndarray::Array2;
use serde::Serialize;

/// Side length of a square digit image.
pub const IMAGE_SIDE: usize = 28;

/// Number of pixels (and therefore model features) per image.
pub const PIXEL_COUNT: usize = IMAGE_SIDE * IMAGE_SIDE;

/// Number of digit classes.
pub const DIGIT_COUNT: usize = 10;

/// A handwritten digit label, 0 through 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Digit(u8);

impl Digit {
    pub const ZERO: Digit = Digit(0);

    /// Construct a digit, rejecting anything outside 0-9.
    pub fn new(value: u8) -> Result<Self> {
        if (value as usize) < DIGIT_COUNT {
            Ok(Digit(value))
        } else {
            anyhow::bail!("label {value} is not a digit (expected 0-9)")
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All ten digits in increasing order.
    pub fn all() -> impl Iterator<Item = Digit> {
        (0..DIGIT_COUNT as u8).map(Digit)
    }
}

impl std::fmt::Display for Digit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Delegate so width/alignment flags apply
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// A single grayscale image: exactly `PIXEL_COUNT` intensities (0-255),
/// row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pixels: Box<[u8; PIXEL_COUNT]>,
}

impl Image {
    /// Build an image from a row of pixel intensities.
    pub fn from_pixels(pixels: Vec<u8>) -> Result<Self> {
        let got = pixels.len();
        let pixels: Box<[u8; PIXEL_COUNT]> = pixels
            .into_boxed_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("expected {PIXEL_COUNT} pixels, got {got}"))?;
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &[u8; PIXEL_COUNT] {
        &self.pixels
    }

    /// Total ink in the image; zero for a blank image.
    pub fn intensity_sum(&self) -> u64 {
        self.pixels.iter().map(|&p| p as u64).sum()
    }
}

/// Convert images into an R x PIXEL_COUNT count matrix for the topic model.
pub fn images_to_matrix(images: &[Image]) -> Array2<f64> {
    Array2::from_shape_fn((images.len(), PIXEL_COUNT), |(row, col)| {
        images[row].pixels[col] as f64
    })
}

/// Labeled training data in file order.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    labels: Vec<Digit>,
    images: Vec<Image>,
}

impl TrainingSet {
    pub fn new(labels: Vec<Digit>, images: Vec<Image>) -> Result<Self> {
        if labels.len() != images.len() {
            anyhow::bail!(
                "training set has {} labels but {} images",
                labels.len(),
                images.len()
            );
        }
        Ok(Self { labels, images })
    }

    pub fn labels(&self) -> &[Digit] {
        &self.labels
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The pixel matrix with labels dropped: the only thing the topic
    /// model ever sees.
    pub fn to_matrix(&self) -> Array2<f64> {
        images_to_matrix(&self.images)
    }

    /// Split off the last `ceil(len * holdout)` rows as a held-out set,
    /// keeping file order on both sides.
    pub fn split(&self, holdout: f64) -> Result<(TrainingSet, TrainingSet)> {
        if !(holdout > 0.0 && holdout < 1.0) {
            anyhow::bail!("holdout fraction must be between 0 and 1 (exclusive), got {holdout}");
        }

        let held = (self.len() as f64 * holdout).ceil() as usize;
        let kept = self.len().saturating_sub(held);
        if kept == 0 || held == 0 {
            anyhow::bail!(
                "cannot hold out {holdout} of {} rows: both sides must be non-empty",
                self.len()
            );
        }

        let train = TrainingSet {
            labels: self.labels[..kept].to_vec(),
            images: self.images[..kept].to_vec(),
        };
        let holdout = TrainingSet {
            labels: self.labels[kept..].to_vec(),
            images: self.images[kept..].to_vec(),
        };
        Ok((train, holdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Image {
        Image::from_pixels(vec![0; PIXEL_COUNT]).unwrap()
    }

    #[test]
    fn test_digit_range() {
        assert!(Digit::new(9).is_ok());
        assert!(Digit::new(10).is_err());
        assert_eq!(Digit::all().count(), DIGIT_COUNT);
    }

    #[test]
    fn test_image_rejects_wrong_width() {
        assert!(Image::from_pixels(vec![0; PIXEL_COUNT - 1]).is_err());
        assert!(Image::from_pixels(vec![0; PIXEL_COUNT + 1]).is_err());
    }

    #[test]
    fn test_matrix_layout() {
        let mut pixels = vec![0u8; PIXEL_COUNT];
        pixels[5] = 200;
        let images = vec![blank(), Image::from_pixels(pixels).unwrap()];
        let m = images_to_matrix(&images);
        assert_eq!(m.dim(), (2, PIXEL_COUNT));
        assert_eq!(m[[1, 5]], 200.0);
        assert_eq!(m[[0, 5]], 0.0);
    }

    #[test]
    fn test_split_keeps_order() {
        let labels: Vec<Digit> = (0..10).map(|d| Digit::new(d).unwrap()).collect();
        let images = vec![blank(); 10];
        let set = TrainingSet::new(labels, images).unwrap();

        let (train, held) = set.split(0.25).unwrap();
        assert_eq!(train.len(), 7);
        assert_eq!(held.len(), 3);
        assert_eq!(held.labels()[0], Digit::new(7).unwrap());
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let set = TrainingSet::new(vec![Digit::ZERO], vec![blank()]).unwrap();
        assert!(set.split(0.0).is_err());
        assert!(set.split(1.0).is_err());
        // One row can't be split into two non-empty sides
        assert!(set.split(0.5).is_err());
    }
}
