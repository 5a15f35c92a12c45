// THEORY:
// The `Mask` module represents region membership: a grid with the same shape
// as the source image where every cell is either inside or outside a region
// such as the wound interior or the peri-wound ring.
//
// Key architectural principles:
// 1.  **Data Container**: Like `Pixel`, a `Mask` is a "dumb" container. It is a
//     thin wrapper over a `GrayImage` (members are 255, everything else 0) that
//     knows how to reshape itself and how to measure a predicate over its
//     members, but it knows nothing about colour or wounds.
// 2.  **Rectangular Morphology**: Dilation and erosion are `imageproc`'s
//     grayscale operators with a `size x size` square anchored at `size / 2`.
//     On a two-level image they are exactly binary morphology. Cells beyond the
//     image border are ignored rather than treated as inside or outside.
// 3.  **Bounded Measurement**: `fraction_where` divides by the member count, so
//     every measurement is a fraction in [0, 1]. An empty region measures 0.0.

pub mod mask {
    use image::{GrayImage, Luma};
    use imageproc::morphology::{self, grayscale_dilate, grayscale_erode};

    const MEMBER: u8 = u8::MAX;

    /// A binary region over an image grid.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Mask {
        image: GrayImage,
    }

    impl Mask {
        pub fn empty(width: u32, height: u32) -> Self {
            Self {
                image: GrayImage::new(width, height),
            }
        }

        pub fn from_fn(width: u32, height: u32, mut member: impl FnMut(u32, u32) -> bool) -> Self {
            Self {
                image: GrayImage::from_fn(width, height, |x, y| {
                    Luma([if member(x, y) { MEMBER } else { 0 }])
                }),
            }
        }

        /// A mask whose members are the cells of `[x0, x0 + w) x [y0, y0 + h)`.
        pub fn rect(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> Self {
            Self::from_fn(width, height, |x, y| {
                x >= x0 && x < x0 + w && y >= y0 && y < y0 + h
            })
        }

        pub fn width(&self) -> u32 {
            self.image.width()
        }

        pub fn height(&self) -> u32 {
            self.image.height()
        }

        pub fn contains(&self, x: u32, y: u32) -> bool {
            self.image.get_pixel(x, y)[0] != 0
        }

        /// Membership by row-major index, matching `ImageBuffer::pixels` order.
        pub fn contains_index(&self, index: usize) -> bool {
            self.image.as_raw()[index] != 0
        }

        pub fn count(&self) -> usize {
            self.image.as_raw().iter().filter(|&&cell| cell != 0).count()
        }

        pub fn is_empty(&self) -> bool {
            self.image.as_raw().iter().all(|&cell| cell == 0)
        }

        /// Fraction of member cells whose flat index satisfies `predicate`.
        /// Returns 0.0 when the mask has no members.
        pub fn fraction_where(&self, mut predicate: impl FnMut(usize) -> bool) -> f64 {
            let mut members = 0usize;
            let mut matched = 0usize;
            for (index, &cell) in self.image.as_raw().iter().enumerate() {
                if cell == 0 {
                    continue;
                }
                members += 1;
                if predicate(index) {
                    matched += 1;
                }
            }
            if members == 0 {
                return 0.0;
            }
            matched as f64 / members as f64
        }

        pub fn dilate(&self, size: u8) -> Self {
            self.reshape(size, grayscale_dilate)
        }

        pub fn erode(&self, size: u8) -> Self {
            self.reshape(size, grayscale_erode)
        }

        /// Morphological closing: fills holes and gaps narrower than `size`.
        pub fn close(&self, size: u8) -> Self {
            self.dilate(size).erode(size)
        }

        /// Cells in `self` but not in `other`.
        pub fn subtract(&self, other: &Mask) -> Self {
            debug_assert_eq!(self.image.dimensions(), other.image.dimensions());
            Self::from_fn(self.width(), self.height(), |x, y| {
                self.contains(x, y) && !other.contains(x, y)
            })
        }

        fn reshape(
            &self,
            size: u8,
            operator: impl Fn(&GrayImage, &morphology::Mask) -> GrayImage,
        ) -> Self {
            if size <= 1 || self.width() == 0 || self.height() == 0 {
                return self.clone();
            }
            Self {
                image: operator(&self.image, &square(size)),
            }
        }
    }

    /// A `size x size` structuring element anchored at `size / 2`.
    fn square(size: u8) -> morphology::Mask {
        let element = GrayImage::from_pixel(size.into(), size.into(), Luma([MEMBER]));
        morphology::Mask::from_image(&element, size / 2, size / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::mask::*;

    #[test]
    fn empty_mask_measures_zero() {
        let mask = Mask::empty(16, 16);
        assert!(mask.is_empty());
        assert_eq!(mask.fraction_where(|_| true), 0.0);
    }

    #[test]
    fn fraction_counts_only_members() {
        let mask = Mask::rect(10, 10, 0, 0, 10, 2);
        assert_eq!(mask.count(), 20);
        // Only the first row of the two member rows matches.
        let fraction = mask.fraction_where(|index| index < 10);
        assert!((fraction - 0.5).abs() < 1e-12);
    }

    #[test]
    fn dilate_grows_square_with_offset_anchor() {
        let mask = Mask::rect(20, 20, 8, 8, 1, 1);
        let grown = mask.dilate(4);
        // Anchor 2: the single cell spreads 1 cell towards the origin and 2 away.
        assert_eq!(grown.count(), 16);
        assert!(grown.contains(7, 7));
        assert!(grown.contains(10, 10));
        assert!(!grown.contains(6, 8));
        assert!(!grown.contains(11, 8));
    }

    #[test]
    fn erode_ignores_image_border() {
        let full = Mask::from_fn(12, 12, |_, _| true);
        assert_eq!(full.erode(5), full);
    }

    #[test]
    fn erode_shrinks_interior_square() {
        let mask = Mask::rect(30, 30, 10, 10, 10, 10);
        let shrunk = mask.erode(5);
        assert_eq!(shrunk.count(), 36);
        assert!(shrunk.contains(12, 12));
        assert!(!shrunk.contains(11, 11));
    }

    #[test]
    fn close_fills_small_hole() {
        let holed = Mask::from_fn(20, 20, |x, y| {
            let in_square = (4..16).contains(&x) && (4..16).contains(&y);
            in_square && !(x == 9 && y == 9)
        });
        let closed = holed.close(5);
        assert!(closed.contains(9, 9));
        assert_eq!(closed.count(), 144);
    }

    #[test]
    fn unit_and_empty_shapes_are_unchanged() {
        let mask = Mask::rect(6, 6, 1, 1, 2, 3);
        assert_eq!(mask.dilate(1), mask);
        assert_eq!(mask.erode(0), mask);
        let nothing = Mask::empty(0, 0);
        assert_eq!(nothing.close(5), nothing);
    }

    #[test]
    fn subtract_leaves_ring() {
        let outer = Mask::rect(10, 10, 2, 2, 6, 6);
        let inner = Mask::rect(10, 10, 3, 3, 4, 4);
        let ring = outer.subtract(&inner);
        assert_eq!(ring.count(), 36 - 16);
        assert!(!ring.contains(4, 4));
        assert!(ring.contains(2, 2));
        // Subtracting a superset never goes negative.
        assert!(inner.subtract(&outer).is_empty());
        assert_eq!((ring.width(), ring.height()), (10, 10));
    }
}
