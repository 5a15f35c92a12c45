// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the risk engine. It is a
// "dumb" data container for a single RGB pixel plus the handful of 1-dimensional
// heuristics the feature extractor thresholds on: metrics computed from this
// pixel alone, with no knowledge of neighbors. Anything that needs other pixels
// (region membership, edges, colour models) lives in `mask`, `segmentation` or
// `features`.
//
// Scales follow the 8-bit conventions the thresholds were tuned against:
// - Luminance: Rec. 601 luma, rounded to 0..255.
// - Value (HSV): max(R, G, B), 0..255.
// - Saturation (HSV): 255 * chroma / value, 0..255, zero for black.
// - Hue: half-degrees, 0..179, so the full colour wheel fits in a byte.
//
// Channel order is red, green, blue everywhere; nothing downstream reorders.

pub mod pixel {
    pub type Channel = u8;
    pub type Hue = u8;
    pub type Saturation = u8;
    pub type Value = u8;
    pub type Luminance = u8;

    /// Hue range of the half-degree scale.
    pub const HUE_RANGE: f32 = 180.0;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
    }

    /// A pixel in 8-bit hue/saturation/value space.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Hsv {
        pub hue: Hue,
        pub saturation: Saturation,
        pub value: Value,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        fn maximum_channel(&self) -> Channel {
            self.red.max(self.green.max(self.blue))
        }

        fn minimum_channel(&self) -> Channel {
            self.red.min(self.green.min(self.blue))
        }

        /// Luminance estimate (Rec. 601 luma), rounded to the byte scale.
        pub fn luminance(&self) -> Luminance {
            let luma = 0.299_f64 * self.red as f64
                + 0.587_f64 * self.green as f64
                + 0.114_f64 * self.blue as f64;
            luma.round().clamp(0.0, 255.0) as Luminance
        }

        /// HSV Value (V): brightness defined as max(R, G, B).
        pub fn value(&self) -> Value {
            self.maximum_channel()
        }

        /// Saturation (HSV): chroma relative to value, scaled to 0..255.
        pub fn saturation(&self) -> Saturation {
            let maximum_channel = self.maximum_channel();
            if maximum_channel == 0 {
                return 0;
            }
            let chroma = (maximum_channel - self.minimum_channel()) as f32;
            (255.0 * chroma / maximum_channel as f32).round() as Saturation
        }

        /// Hue on the half-degree scale [0, 180).
        ///
        /// - Same sector arithmetic as the degree form, divided by two.
        /// - Gray pixels (zero chroma) report hue 0.
        pub fn hue(&self) -> Hue {
            let maximum_channel = self.maximum_channel();
            let chroma = (maximum_channel - self.minimum_channel()) as f32;
            if chroma <= 0.0 {
                return 0;
            }

            let (red, green, blue) = (self.red as f32, self.green as f32, self.blue as f32);
            let (base_difference, sector_offset) = if maximum_channel == self.red {
                (green - blue, 0.0)
            } else if maximum_channel == self.green {
                (blue - red, 2.0)
            } else {
                (red - green, 4.0)
            };

            let mut hue = ((base_difference / chroma + sector_offset) * 30.0).round();
            if hue < 0.0 {
                hue += HUE_RANGE;
            }
            if hue >= HUE_RANGE {
                hue -= HUE_RANGE;
            }
            hue as Hue
        }

        pub fn to_hsv(&self) -> Hsv {
            Hsv {
                hue: self.hue(),
                saturation: self.saturation(),
                value: self.value(),
            }
        }
    }

    impl From<&image::Rgb<u8>> for Pixel {
        fn from(rgb: &image::Rgb<u8>) -> Self {
            let [red, green, blue] = rgb.0;
            Pixel::new(red, green, blue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pixel::*;

    #[test]
    fn pure_red_sits_at_hue_zero() {
        let hsv = Pixel::new(200, 10, 10).to_hsv();
        assert_eq!(hsv.hue, 0);
        assert_eq!(hsv.value, 200);
        assert!(hsv.saturation > 80);
    }

    #[test]
    fn primaries_land_on_half_degree_scale() {
        assert_eq!(Pixel::new(0, 255, 0).hue(), 60);
        assert_eq!(Pixel::new(0, 0, 255).hue(), 120);
        assert_eq!(Pixel::new(255, 255, 0).hue(), 30);
    }

    #[test]
    fn magenta_red_wraps_near_top_of_range() {
        // Slightly blue-shifted red: negative sector difference wraps around.
        let hue = Pixel::new(255, 0, 40).hue();
        assert!(hue > 160 && hue < 180, "hue={hue}");
    }

    #[test]
    fn gray_and_black_have_no_saturation() {
        assert_eq!(Pixel::new(0, 0, 0).saturation(), 0);
        assert_eq!(Pixel::new(128, 128, 128).saturation(), 0);
        assert_eq!(Pixel::new(128, 128, 128).hue(), 0);
    }

    #[test]
    fn luminance_matches_rec601_weights() {
        assert_eq!(Pixel::new(255, 255, 255).luminance(), 255);
        assert_eq!(Pixel::new(0, 0, 0).luminance(), 0);
        assert_eq!(Pixel::new(100, 100, 100).luminance(), 100);
        assert_eq!(Pixel::new(200, 10, 10).luminance(), 67);
    }
}
