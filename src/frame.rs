//! Frame input and bright-spot detection
//!
//! A frame is a dense RGB grid. The detector thresholds it with a color
//! predicate, groups matching pixels into 4-connected regions, discards
//! regions too small to be a light, and reports the centroid of the largest
//! one as the tracked point for that frame.

use crate::error::TrackError;
use crate::mask::{BinaryMask, Connectivity, Region};
use crate::types::Point;
use serde::{Deserialize, Serialize};

/// Minimum channel value for a pixel to count as bright
pub const BRIGHTNESS_THRESHOLD: u8 = 200;

/// Bright pixels must have a channel spread below this (near-white)
pub const MAX_SATURATION: u8 = 100;

/// Regions with fewer pixels are treated as noise
pub const MIN_REGION_PIXELS: usize = 50;

/// One RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn max_channel(&self) -> u8 {
        self.r.max(self.g).max(self.b)
    }

    pub fn min_channel(&self) -> u8 {
        self.r.min(self.g).min(self.b)
    }

    /// Spread between the strongest and weakest channel
    pub fn saturation(&self) -> u8 {
        self.max_channel() - self.min_channel()
    }
}

/// Default pixel predicate: bright and close to white
pub fn bright_white(pixel: Rgb) -> bool {
    pixel.max_channel() >= BRIGHTNESS_THRESHOLD && pixel.saturation() < MAX_SATURATION
}

/// Row-major RGB frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Frame {
    pub fn new(width: usize, height: usize, pixels: Vec<Rgb>) -> Result<Self, TrackError> {
        if pixels.len() != width * height {
            return Err(TrackError::InvalidFrame(format!(
                "expected {} pixels for {}x{}, got {}",
                width * height,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Frame filled with a single color
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Build a frame from packed `RGBRGB...` bytes
    pub fn from_rgb_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self, TrackError> {
        if bytes.len() != width * height * 3 {
            return Err(TrackError::InvalidFrame(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                width * height * 3,
                width,
                height,
                bytes.len()
            )));
        }

        let pixels = bytes
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }

    /// Out-of-range writes are ignored
    pub fn set(&mut self, x: usize, y: usize, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Paint a filled axis-aligned rectangle, clipped to the frame
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: Rgb) {
        for row in y..(y + height).min(self.height) {
            for col in x..(x + width).min(self.width) {
                self.pixels[row * self.width + col] = color;
            }
        }
    }
}

/// Finds the tracked light in a frame
#[derive(Debug, Clone)]
pub struct BrightSpotDetector<F = fn(Rgb) -> bool> {
    predicate: F,
    min_region_pixels: usize,
}

impl Default for BrightSpotDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BrightSpotDetector {
    /// Detector for near-white bright lights
    pub fn new() -> Self {
        Self::with_predicate(bright_white)
    }
}

impl<F> BrightSpotDetector<F>
where
    F: Fn(Rgb) -> bool,
{
    /// Detector using a caller-supplied color filter
    pub fn with_predicate(predicate: F) -> Self {
        Self {
            predicate,
            min_region_pixels: MIN_REGION_PIXELS,
        }
    }

    pub fn with_min_region_pixels(mut self, min_region_pixels: usize) -> Self {
        self.min_region_pixels = min_region_pixels;
        self
    }

    /// Pixels matching the predicate
    pub fn mask(&self, frame: &Frame) -> BinaryMask {
        let mut mask = BinaryMask::new(frame.width, frame.height);
        for (index, &pixel) in frame.pixels.iter().enumerate() {
            if (self.predicate)(pixel) {
                mask.set((index % frame.width) as i32, (index / frame.width) as i32, true);
            }
        }
        mask
    }

    /// 4-connected matching regions large enough to be a light, in raster order
    pub fn regions(&self, frame: &Frame) -> Vec<Region> {
        self.mask(frame)
            .regions(Connectivity::Four)
            .into_iter()
            .filter(|region| region.pixel_count() >= self.min_region_pixels)
            .collect()
    }

    /// Centroid of the largest region; ties go to the first in raster order
    pub fn detect(&self, frame: &Frame) -> Option<Point> {
        let largest = self.regions(frame).into_iter().fold(None, |best: Option<Region>, region| {
            match best {
                Some(best) if best.pixel_count() >= region.pixel_count() => Some(best),
                _ => Some(region),
            }
        })?;

        let (x, y) = largest.centroid();
        Some(Point::new(x as i32, y as i32))
    }
}
