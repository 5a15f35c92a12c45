pub mod edges;
pub mod explanation;
pub mod features;
pub mod graph_cut;
pub mod mask;
pub mod pixel;
pub mod scoring;
pub mod segmentation;
