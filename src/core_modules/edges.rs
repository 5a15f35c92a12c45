// THEORY:
// The `edges` module finds intensity edges for the swelling proxy. It is the
// classic Canny detector on the raw luminance image, with no smoothing step:
// 3x3 Sobel gradients (replicated border), L1 magnitude `|dx| + |dy|`,
// non-maximum suppression along one of four quantised directions, and
// hysteresis that keeps weak edges only when they touch a strong one.
//
// Thresholds are in L1 Sobel units, so a clean step of height `d` between two
// flat regions has magnitude `4 * d`.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

const EDGE: u8 = u8::MAX;
/// `tan(22.5 deg)` in 15-bit fixed point.
const TAN_22_5: i64 = 13_573;
const SHIFT: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    None,
    Weak,
    Strong,
}

/// Edge map (0 or 255) of `gray`. Pixels with magnitude above `low` are
/// candidates; above `high` they seed an edge.
pub fn canny(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);
    let dx: Vec<i64> = horizontal_sobel(gray).pixels().map(|p| p[0] as i64).collect();
    let dy: Vec<i64> = vertical_sobel(gray).pixels().map(|p| p[0] as i64).collect();
    let magnitude: Vec<i64> = dx.iter().zip(&dy).map(|(a, b)| a.abs() + b.abs()).collect();

    let at = |x: isize, y: isize| -> i64 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    let mut candidates = vec![Candidate::None; w * h];
    let mut strong = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let m = magnitude[i];
            if m as f32 <= low {
                continue;
            }
            let (xi, yi) = (x as isize, y as isize);
            let ax = dx[i].abs();
            let ay = dy[i].abs() << SHIFT;
            let tan_22 = ax * TAN_22_5;
            let is_peak = if ay < tan_22 {
                m > at(xi - 1, yi) && m >= at(xi + 1, yi)
            } else if ay > tan_22 + (ax << (SHIFT + 1)) {
                m > at(xi, yi - 1) && m >= at(xi, yi + 1)
            } else {
                let s = if (dx[i] < 0) != (dy[i] < 0) { -1 } else { 1 };
                m > at(xi - s, yi - 1) && m > at(xi + s, yi + 1)
            };
            if !is_peak {
                continue;
            }
            if m as f32 > high {
                candidates[i] = Candidate::Strong;
                strong.push(i);
            } else {
                candidates[i] = Candidate::Weak;
            }
        }
    }

    while let Some(i) = strong.pop() {
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..(y + 2).min(h) {
            for nx in x.saturating_sub(1)..(x + 2).min(w) {
                let j = ny * w + nx;
                if candidates[j] == Candidate::Weak {
                    candidates[j] = Candidate::Strong;
                    strong.push(j);
                }
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let strong = candidates[(y * width + x) as usize] == Candidate::Strong;
        Luma([if strong { EDGE } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_pixels(edges: &GrayImage) -> Vec<(u32, u32)> {
        edges
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == EDGE)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn faint_step_is_a_single_column_edge() {
        let gray = GrayImage::from_fn(64, 64, |x, _| Luma([if x < 32 { 100 } else { 140 }]));
        let edges = edge_pixels(&canny(&gray, 60.0, 120.0));
        // Both sides of the step reach 160; suppression keeps the left one.
        assert_eq!(edges.len(), 64);
        assert!(edges.iter().all(|&(x, _)| x == 31));
    }

    #[test]
    fn weak_edge_without_strong_seed_is_dropped() {
        let gray = GrayImage::from_fn(32, 32, |x, _| Luma([if x < 16 { 100 } else { 125 }]));
        assert!(edge_pixels(&canny(&gray, 60.0, 120.0)).is_empty());
    }

    #[test]
    fn weak_edge_touching_strong_edge_is_kept() {
        // Upper half steps by 40 (strong), lower half by 25 (weak only).
        let gray = GrayImage::from_fn(32, 32, |x, y| {
            let high = if y < 16 { 140 } else { 125 };
            Luma([if x < 16 { 100 } else { high }])
        });
        let edges = edge_pixels(&canny(&gray, 60.0, 120.0));
        assert!(edges.contains(&(15, 2)));
        assert!(edges.contains(&(15, 28)));
    }

    #[test]
    fn flat_image_has_no_edges() {
        let gray = GrayImage::from_pixel(20, 20, Luma([90]));
        assert!(edge_pixels(&canny(&gray, 60.0, 120.0)).is_empty());
    }
}
