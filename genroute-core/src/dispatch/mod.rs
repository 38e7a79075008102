mod pipeline;

pub use pipeline::{DispatchPipeline, ProgressFn};
