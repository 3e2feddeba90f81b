use miette::Diagnostic;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced synchronously at the point a pipeline or an [`Optional`](crate::Optional) is misused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum Error {
    #[error("Pipeline has already been operated upon or consumed")]
    #[diagnostic(
        code(seqflow::pipeline_already_consumed),
        help("A pipeline can be driven only once. Build a new pipeline from its source.")
    )]
    PipelineAlreadyConsumed,

    #[error("\"{operation}\" cannot exhaust an unbounded source")]
    #[diagnostic(
        code(seqflow::infinite_source),
        help("Bound the pipeline with `limit(n)` or use a short-circuiting terminal such as `find_any`.")
    )]
    InfiniteSource { operation: &'static str },

    #[error("No value present")]
    #[diagnostic(code(seqflow::value_absent))]
    ValueAbsent,

    #[error("Elements passed to \"{operation}\" have no total order")]
    #[diagnostic(
        code(seqflow::not_comparable),
        help("Supply a comparator with `sorted_by`, `min_by` or `max_by`.")
    )]
    NotComparable { operation: &'static str },

    #[error("Pipeline is already being driven by another terminal operation")]
    #[diagnostic(code(seqflow::concurrent_consumption))]
    ConcurrentConsumption,
}
