pub mod decode;
pub mod detect;
pub mod tabular;
pub mod lines;
pub mod engine;
pub mod output;

pub use decode::{DecodeChain, DecodeStrategy};
pub use detect::TypeDetector;
pub use tabular::TabularMerger;
pub use lines::{split_lines, LineMerger};
pub use engine::MergeEngine;
pub use output::{render, render_lines, render_tabular};
