// THEORY:
// The `features` module turns one photograph into four bounded proxy signals.
// It is a stateless utility: `FeatureExtractor::extract` takes an image and
// produces a fresh `FeatureSignals` with no memory of previous calls.
//
// Key architectural principles:
// 1.  **Regional Measurement**: Every signal is "proxy intensity within the
//     relevant anatomical region", never a whole-image statistic. Colour cues
//     inside the wound come from the wound mask; cues about the surrounding
//     skin come from the peri-wound ring (dilated wound minus eroded wound).
// 2.  **Bounded by Construction**: Each signal is a fraction of a pixel
//     population, so it lies in [0, 1]. An empty region yields 0.0.
// 3.  **Total Function**: Extraction cannot fail on a decoded image. A failed
//     segmentation is logged and replaced with the threshold fallback.

use crate::core_modules::edges::canny;
use crate::core_modules::mask::mask::Mask;
use crate::core_modules::pixel::pixel::{Hsv, Pixel};
use crate::core_modules::scoring::SignalKind;
use crate::core_modules::segmentation::{self, SegmentationConfig};
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Every constant of the extraction pipeline, grouped so it can be tuned.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub segmentation: SegmentationConfig,
    /// Side of the square element used to close holes in the wound mask.
    pub closing_size: u8,
    /// Side of the square element used to derive the peri-wound ring.
    pub ring_width: u8,
    /// Red hue band is `hue < red_hue_low || hue > red_hue_high`.
    pub red_hue_low: u8,
    pub red_hue_high: u8,
    pub red_min_saturation: u8,
    /// Exudate hue band is `exudate_hue_low < hue < exudate_hue_high`.
    pub exudate_hue_low: u8,
    pub exudate_hue_high: u8,
    pub exudate_min_saturation: u8,
    pub exudate_min_value: u8,
    /// Pixels darker than this value count as dark tissue.
    pub dark_max_value: u8,
    /// Hysteresis thresholds in L1 Sobel units.
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            closing_size: 5,
            ring_width: 18,
            red_hue_low: 10,
            red_hue_high: 160,
            red_min_saturation: 80,
            exudate_hue_low: 20,
            exudate_hue_high: 90,
            exudate_min_saturation: 60,
            exudate_min_value: 80,
            dark_max_value: 40,
            canny_low: 60.0,
            canny_high: 120.0,
        }
    }
}

/// The four visual proxy measurements, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSignals")]
pub struct FeatureSignals {
    periwound_redness: f64,
    exudate_proxy: f64,
    dark_tissue_proxy: f64,
    swelling_proxy: f64,
}

impl FeatureSignals {
    /// Builds a signal set, clamping each value into [0, 1] (NaN becomes 0.0).
    pub fn new(
        periwound_redness: f64,
        exudate_proxy: f64,
        dark_tissue_proxy: f64,
        swelling_proxy: f64,
    ) -> Self {
        Self {
            periwound_redness: unit(periwound_redness),
            exudate_proxy: unit(exudate_proxy),
            dark_tissue_proxy: unit(dark_tissue_proxy),
            swelling_proxy: unit(swelling_proxy),
        }
    }

    pub fn periwound_redness(&self) -> f64 {
        self.periwound_redness
    }

    pub fn exudate_proxy(&self) -> f64 {
        self.exudate_proxy
    }

    pub fn dark_tissue_proxy(&self) -> f64 {
        self.dark_tissue_proxy
    }

    pub fn swelling_proxy(&self) -> f64 {
        self.swelling_proxy
    }

    /// The signals in declaration order, paired with their kind.
    pub fn values(&self) -> [(SignalKind, f64); 4] {
        [
            (SignalKind::PeriwoundRedness, self.periwound_redness),
            (SignalKind::ExudateProxy, self.exudate_proxy),
            (SignalKind::DarkTissueProxy, self.dark_tissue_proxy),
            (SignalKind::SwellingProxy, self.swelling_proxy),
        ]
    }
}

/// Unchecked wire form; deserialisation goes through `FeatureSignals::new`.
#[derive(Deserialize)]
struct RawSignals {
    periwound_redness: f64,
    exudate_proxy: f64,
    dark_tissue_proxy: f64,
    swelling_proxy: f64,
}

impl From<RawSignals> for FeatureSignals {
    fn from(raw: RawSignals) -> Self {
        Self::new(
            raw.periwound_redness,
            raw.exudate_proxy,
            raw.dark_tissue_proxy,
            raw.swelling_proxy,
        )
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Extracts `FeatureSignals` from wound photographs.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, image: &RgbImage) -> FeatureSignals {
        let (width, height) = image.dimensions();
        let pixels: Vec<Pixel> = image.pixels().map(Pixel::from).collect();
        let hsv: Vec<Hsv> = pixels.iter().map(Pixel::to_hsv).collect();
        let gray = luminance_image(width, height, &pixels);

        let wound = self.segment_or_threshold(image, &gray);
        let ring = self.periwound_ring(&wound);
        let edges = canny(&gray, self.config.canny_low, self.config.canny_high);

        let c = &self.config;
        let periwound_redness = ring.fraction_where(|i| {
            let p = hsv[i];
            (p.hue < c.red_hue_low || p.hue > c.red_hue_high) && p.saturation > c.red_min_saturation
        });
        let exudate_proxy = wound.fraction_where(|i| {
            let p = hsv[i];
            p.hue > c.exudate_hue_low
                && p.hue < c.exudate_hue_high
                && p.saturation > c.exudate_min_saturation
                && p.value > c.exudate_min_value
        });
        let dark_tissue_proxy = wound.fraction_where(|i| hsv[i].value < c.dark_max_value);
        let swelling_proxy = ring.fraction_where(|i| {
            edges.get_pixel(i as u32 % width, i as u32 / width)[0] > 0
        });

        let signals = FeatureSignals::new(
            periwound_redness,
            exudate_proxy,
            dark_tissue_proxy,
            swelling_proxy,
        );
        debug!(
            width,
            height,
            wound_pixels = wound.count(),
            ring_pixels = ring.count(),
            ?signals,
            "Extracted feature signals"
        );
        signals
    }

    /// Wound region after hole closing; falls back to thresholding on failure.
    pub fn wound_mask(&self, image: &RgbImage) -> Mask {
        let pixels: Vec<Pixel> = image.pixels().map(Pixel::from).collect();
        let gray = luminance_image(image.width(), image.height(), &pixels);
        self.segment_or_threshold(image, &gray)
    }

    fn segment_or_threshold(&self, image: &RgbImage, gray: &GrayImage) -> Mask {
        let mask = segmentation::segment(image, &self.config.segmentation).unwrap_or_else(|err| {
            warn!(error = %err, "Segmentation failed, using threshold fallback");
            segmentation::otsu_fallback(gray)
        });
        mask.close(self.config.closing_size)
    }

    fn periwound_ring(&self, wound: &Mask) -> Mask {
        let dilated = wound.dilate(self.config.ring_width);
        let eroded = wound.erode(self.config.ring_width);
        dilated.subtract(&eroded)
    }
}

fn luminance_image(width: u32, height: u32, pixels: &[Pixel]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        Luma([pixels[(y * width + x) as usize].luminance()])
    })
}
