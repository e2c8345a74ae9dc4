mod pipeline;
mod validation;

pub use pipeline::{DecodePipeline, DEFAULT_DECODE_CONCURRENCY};
pub use validation::validate_request;
