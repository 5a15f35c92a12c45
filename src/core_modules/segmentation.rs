// THEORY:
// The `segmentation` module is the first stage of the feature extractor. It
// decides which pixels belong to the wound so that every later measurement is
// taken inside the relevant region rather than over the whole photograph.
//
// Key architectural principles & algorithm steps:
// 1.  **Seeding**: A fixed interior rectangle (10% margin per side) seeds the
//     labelling. Everything outside is definite background; everything inside
//     starts as probable foreground.
// 2.  **Colour Models**: Foreground and background are each described by a
//     Gaussian mixture over RGB. The first fit clusters the samples with
//     k-means; later fits reassign every sample to its most likely component
//     of the previous model and relearn the statistics.
// 3.  **Labelling**: Probable pixels are labelled by a minimum s-t cut. Each
//     pixel pays the negative log-likelihood of its colour under the model of
//     the side it lands on, fixed background pixels are tied to the sink, and
//     every pair of 8-connected neighbours pays a penalty that is strong
//     across similar colours and weak across colour edges. A
//     background-coloured patch inside the seed rectangle therefore stays
//     background unless colour alone outweighs the cost of cutting it away
//     from the surrounding background.
// 4.  **Refinement**: Steps 2-3 repeat for a fixed number of iterations. If the
//     foreground collapses to nothing the empty region is the answer.
// 5.  **Fallback**: Numerical trouble is reported as `SegmentationError`; the
//     caller then uses `otsu_fallback`, a deterministic global threshold that
//     takes the darker side of the histogram split as the wound.

use crate::core_modules::graph_cut::FlowGraph;
use crate::core_modules::mask::mask::Mask;
use crate::error::SegmentationError;
use image::{GrayImage, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

const COMPONENTS: usize = 5;
const KMEANS_ITERATIONS: usize = 10;
/// Added to covariance diagonals so single-colour clusters stay invertible.
const VARIANCE_FLOOR: f64 = 0.01;
const SMOOTHNESS_GAMMA: f64 = 50.0;
/// Fixed background links cost this many times the smoothness weight.
const HARD_LINK_FACTOR: f64 = 9.0;
/// Sigma of the 5x5 Gaussian kernel used before thresholding.
const FALLBACK_BLUR_SIGMA: f32 = 1.1;

type Color = [f64; 3];

/// Tunables for the colour-model segmentation.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Fraction of width/height excluded on each side of the seed rectangle.
    pub margin: f64,
    /// Number of model/label refinement rounds.
    pub iterations: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            margin: 0.1,
            iterations: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Background,
    ProbableBackground,
    ProbableForeground,
}

impl Label {
    fn is_foreground(self) -> bool {
        matches!(self, Label::ProbableForeground)
    }

    fn is_fixed(self) -> bool {
        matches!(self, Label::Background)
    }
}

/// One Gaussian of a colour mixture, stored in the form the likelihood needs.
#[derive(Debug, Clone)]
struct Component {
    log_weight: f64,
    half_log_det: f64,
    mean: Color,
    inverse: [[f64; 3]; 3],
}

impl Component {
    fn log_density(&self, color: &Color) -> f64 {
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let mut mahalanobis = 0.0;
        for row in 0..3 {
            for col in 0..3 {
                mahalanobis += d[row] * self.inverse[row][col] * d[col];
            }
        }
        self.log_weight - self.half_log_det - 0.5 * mahalanobis
    }
}

/// Running sums for one component while (re)learning a mixture.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    count: usize,
    sum: Color,
    products: [[f64; 3]; 3],
}

impl Accumulator {
    fn add(&mut self, color: &Color) {
        self.count += 1;
        for row in 0..3 {
            self.sum[row] += color[row];
            for col in 0..3 {
                self.products[row][col] += color[row] * color[col];
            }
        }
    }

    fn into_component(self, total: usize) -> Result<Component, SegmentationError> {
        let n = self.count as f64;
        let mean = [self.sum[0] / n, self.sum[1] / n, self.sum[2] / n];
        let mut covariance = [[0.0; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                covariance[row][col] = self.products[row][col] / n - mean[row] * mean[col];
            }
            covariance[row][row] += VARIANCE_FLOOR;
        }

        let c = &covariance;
        let cofactors = [
            [
                c[1][1] * c[2][2] - c[1][2] * c[2][1],
                c[0][2] * c[2][1] - c[0][1] * c[2][2],
                c[0][1] * c[1][2] - c[0][2] * c[1][1],
            ],
            [
                c[1][2] * c[2][0] - c[1][0] * c[2][2],
                c[0][0] * c[2][2] - c[0][2] * c[2][0],
                c[0][2] * c[1][0] - c[0][0] * c[1][2],
            ],
            [
                c[1][0] * c[2][1] - c[1][1] * c[2][0],
                c[0][1] * c[2][0] - c[0][0] * c[2][1],
                c[0][0] * c[1][1] - c[0][1] * c[1][0],
            ],
        ];
        let det = c[0][0] * cofactors[0][0] + c[0][1] * cofactors[1][0] + c[0][2] * cofactors[2][0];
        if !det.is_finite() || det <= f64::EPSILON {
            return Err(SegmentationError::SingularCovariance);
        }

        let mut inverse = [[0.0; 3]; 3];
        for row in 0..3 {
            for col in 0..3 {
                inverse[row][col] = cofactors[row][col] / det;
            }
        }

        Ok(Component {
            log_weight: (n / total as f64).ln(),
            half_log_det: 0.5 * det.ln(),
            mean,
            inverse,
        })
    }
}

/// A Gaussian mixture colour model for one side of the segmentation.
#[derive(Debug, Clone)]
struct ColorModel {
    components: Vec<Component>,
}

impl ColorModel {
    /// Initial fit: deterministic k-means seeded at brightness quantiles.
    fn fit(samples: &[Color]) -> Result<Self, SegmentationError> {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        order.sort_by(|&a, &b| brightness(&samples[a]).total_cmp(&brightness(&samples[b])));
        let mut centers: Vec<Color> = (0..COMPONENTS)
            .map(|k| samples[order[(2 * k + 1) * samples.len() / (2 * COMPONENTS)]])
            .collect();

        let mut assignment = vec![0usize; samples.len()];
        for _ in 0..KMEANS_ITERATIONS {
            for (slot, color) in assignment.iter_mut().zip(samples) {
                *slot = nearest(&centers, color);
            }
            let mut sums = vec![([0.0; 3], 0usize); COMPONENTS];
            for (&k, color) in assignment.iter().zip(samples) {
                for channel in 0..3 {
                    sums[k].0[channel] += color[channel];
                }
                sums[k].1 += 1;
            }
            for (center, (sum, count)) in centers.iter_mut().zip(sums) {
                if count > 0 {
                    let n = count as f64;
                    *center = [sum[0] / n, sum[1] / n, sum[2] / n];
                }
            }
        }

        Self::from_assignment(samples, &assignment, COMPONENTS)
    }

    /// Subsequent fit: each sample joins its most likely component, then relearn.
    fn refit(&self, samples: &[Color]) -> Result<Self, SegmentationError> {
        let assignment: Vec<usize> = samples.iter().map(|color| self.most_likely(color)).collect();
        Self::from_assignment(samples, &assignment, self.components.len())
    }

    fn from_assignment(
        samples: &[Color],
        assignment: &[usize],
        slots: usize,
    ) -> Result<Self, SegmentationError> {
        let mut accumulators = vec![Accumulator::default(); slots];
        for (&k, color) in assignment.iter().zip(samples) {
            accumulators[k].add(color);
        }
        let components = accumulators
            .into_iter()
            .filter(|acc| acc.count > 0)
            .map(|acc| acc.into_component(samples.len()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    fn most_likely(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_density = f64::NEG_INFINITY;
        for (k, component) in self.components.iter().enumerate() {
            let density = component.log_density(color);
            if density > best_density {
                best = k;
                best_density = density;
            }
        }
        best
    }

    /// Negative log-likelihood via log-sum-exp, so distant colours stay finite.
    fn neg_log_likelihood(&self, color: &Color) -> f64 {
        let densities: Vec<f64> = self.components.iter().map(|c| c.log_density(color)).collect();
        let max = densities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = densities.iter().map(|d| (d - max).exp()).sum();
        -(max + sum.ln())
    }
}

fn brightness(color: &Color) -> f64 {
    color[0] + color[1] + color[2]
}

fn nearest(centers: &[Color], color: &Color) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (k, center) in centers.iter().enumerate() {
        let distance = squared_distance(center, color);
        if distance < best_distance {
            best = k;
            best_distance = distance;
        }
    }
    best
}

fn squared_distance(a: &Color, b: &Color) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Contrast-sensitive n-link capacities towards the already visited half of
/// each pixel's 8-neighbourhood. Diagonal links are scaled by `1/sqrt(2)`.
struct NeighbourWeights {
    left: Vec<f64>,
    up_left: Vec<f64>,
    up: Vec<f64>,
    up_right: Vec<f64>,
}

impl NeighbourWeights {
    fn new(colors: &[Color], width: usize, height: usize) -> Self {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                for j in backward_neighbours(x, y, width).into_iter().flatten() {
                    total += squared_distance(&colors[i], &colors[j]);
                    pairs += 1;
                }
            }
        }
        let mean = if pairs > 0 { total / pairs as f64 } else { 0.0 };
        let beta = if mean > f64::EPSILON { 1.0 / (2.0 * mean) } else { 0.0 };

        let diagonal_gamma = SMOOTHNESS_GAMMA / std::f64::consts::SQRT_2;
        let mut weights = Self {
            left: vec![0.0; colors.len()],
            up_left: vec![0.0; colors.len()],
            up: vec![0.0; colors.len()],
            up_right: vec![0.0; colors.len()],
        };
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let [left, up_left, up, up_right] = backward_neighbours(x, y, width);
                let weight = |neighbour: Option<usize>, gamma: f64| {
                    neighbour.map_or(0.0, |j| {
                        gamma * (-beta * squared_distance(&colors[i], &colors[j])).exp()
                    })
                };
                weights.left[i] = weight(left, SMOOTHNESS_GAMMA);
                weights.up_left[i] = weight(up_left, diagonal_gamma);
                weights.up[i] = weight(up, SMOOTHNESS_GAMMA);
                weights.up_right[i] = weight(up_right, diagonal_gamma);
            }
        }
        weights
    }

    /// `(neighbour, capacity)` for every n-link that starts at `(x, y)`.
    fn links(&self, x: usize, y: usize, width: usize) -> impl Iterator<Item = (usize, f64)> {
        let i = y * width + x;
        let [left, up_left, up, up_right] = backward_neighbours(x, y, width);
        [
            left.map(|j| (j, self.left[i])),
            up_left.map(|j| (j, self.up_left[i])),
            up.map(|j| (j, self.up[i])),
            up_right.map(|j| (j, self.up_right[i])),
        ]
        .into_iter()
        .flatten()
    }
}

/// Left, upper-left, upper and upper-right neighbour indices, when inside.
fn backward_neighbours(x: usize, y: usize, width: usize) -> [Option<usize>; 4] {
    let i = y * width + x;
    [
        (x > 0).then(|| i - 1),
        (x > 0 && y > 0).then(|| i - width - 1),
        (y > 0).then(|| i - width),
        (x + 1 < width && y > 0).then(|| i - width + 1),
    ]
}

/// Segments the wound region with iterated colour models and a minimum cut,
/// seeded by the interior rectangle. See the module notes for the algorithm.
pub fn segment(image: &RgbImage, config: &SegmentationConfig) -> Result<Mask, SegmentationError> {
    let (width, height) = image.dimensions();
    let seed = Mask::rect(
        width,
        height,
        (width as f64 * config.margin) as u32,
        (height as f64 * config.margin) as u32,
        (width as f64 * (1.0 - 2.0 * config.margin)) as u32,
        (height as f64 * (1.0 - 2.0 * config.margin)) as u32,
    );

    let colors: Vec<Color> = image
        .pixels()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect();
    let mut labels: Vec<Label> = (0..colors.len())
        .map(|i| {
            if seed.contains_index(i) {
                Label::ProbableForeground
            } else {
                Label::Background
            }
        })
        .collect();

    if !labels.iter().any(|l| l.is_foreground()) {
        return Err(SegmentationError::EmptySeed("foreground", width, height));
    }
    if labels.iter().all(|l| l.is_foreground()) {
        return Err(SegmentationError::EmptySeed("background", width, height));
    }

    let (w, h) = (width as usize, height as usize);
    let neighbours = NeighbourWeights::new(&colors, w, h);
    let hard_link = HARD_LINK_FACTOR * SMOOTHNESS_GAMMA;
    let edge_hint = (4 * w * h).saturating_sub(3 * (w + h));
    let mut models: Option<(ColorModel, ColorModel)> = None;

    for iteration in 0..config.iterations {
        let (foreground_samples, background_samples): (Vec<Color>, Vec<Color>) = {
            let mut fg = Vec::new();
            let mut bg = Vec::new();
            for (label, color) in labels.iter().zip(&colors) {
                if label.is_foreground() {
                    fg.push(*color);
                } else {
                    bg.push(*color);
                }
            }
            (fg, bg)
        };
        if foreground_samples.is_empty() {
            debug!(iteration, "Foreground collapsed during refinement");
            break;
        }

        let (foreground, background) = match &models {
            None => (
                ColorModel::fit(&foreground_samples)?,
                ColorModel::fit(&background_samples)?,
            ),
            Some((fg, bg)) => (fg.refit(&foreground_samples)?, bg.refit(&background_samples)?),
        };

        // The source side of the cut is foreground. A source link is cut when
        // the pixel ends up as background, so it carries the background cost.
        let mut graph = FlowGraph::new(colors.len(), edge_hint);
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                if labels[i].is_fixed() {
                    graph.add_terminal_weights(i, 0.0, hard_link);
                } else {
                    let fg_cost = foreground.neg_log_likelihood(&colors[i]);
                    let bg_cost = background.neg_log_likelihood(&colors[i]);
                    if !fg_cost.is_finite() || !bg_cost.is_finite() {
                        return Err(SegmentationError::NonFinite);
                    }
                    graph.add_terminal_weights(i, bg_cost, fg_cost);
                }
                for (j, capacity) in neighbours.links(x, y, w) {
                    graph.add_edge(i, j, capacity, capacity);
                }
            }
        }
        let flow = graph.max_flow();

        for (i, label) in labels.iter_mut().enumerate() {
            if label.is_fixed() {
                continue;
            }
            *label = if graph.in_source_segment(i) {
                Label::ProbableForeground
            } else {
                Label::ProbableBackground
            };
        }

        debug!(
            iteration,
            flow,
            foreground = labels.iter().filter(|l| l.is_foreground()).count(),
            "Segmentation refinement"
        );
        models = Some((foreground, background));
    }

    Ok(Mask::from_fn(width, height, |x, y| {
        labels[(y * width + x) as usize].is_foreground()
    }))
}

/// Deterministic threshold segmentation: blur, Otsu level, darker side is wound.
pub fn otsu_fallback(gray: &GrayImage) -> Mask {
    let blurred = gaussian_blur_f32(gray, FALLBACK_BLUR_SIGMA);
    let level = otsu_level(&blurred);
    Mask::from_fn(gray.width(), gray.height(), |x, y| {
        blurred.get_pixel(x, y)[0] <= level
    })
}
