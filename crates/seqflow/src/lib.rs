//! `seqflow` provides lazy, single-consumption sequence pipelines.
//!
//! A [`Pipeline`] is built from a source (a collection, a generator or a seeded
//! iteration), extended with intermediate stages (`filter`, `map`, `sorted`, ...)
//! and finally driven by exactly one terminal operation (`count`, `reduce`,
//! `collect`, ...). Nothing is evaluated until the terminal runs, and only as
//! many elements are pulled as the terminal needs.
//!
//! ## Examples
//!
//! ```rust
//! use seqflow::{Error, Optional, Pipeline};
//!
//! let pipeline = Pipeline::of(vec!["monkey", "gorilla", "bonobo"])
//!     .filter(|name| name.starts_with('g'))
//!     .map(str::len);
//! assert_eq!(pipeline.find_first(), Ok(Optional::of(7)));
//!
//! // A pipeline can be consumed only once.
//! assert_eq!(pipeline.count(), Err(Error::PipelineAlreadyConsumed));
//!
//! // Infinite sources are fine as long as the terminal short-circuits.
//! let evens = Pipeline::iterate(2, |n| n + 2).peek(|n| assert!(n % 2 == 0));
//! assert_eq!(evens.any_match(|n| *n > 10), Ok(true));
//!
//! // Exhausting one is rejected instead of looping forever.
//! assert!(matches!(
//!     Pipeline::generate(|| "chimp").count(),
//!     Err(Error::InfiniteSource { .. })
//! ));
//! ```
mod collector;
pub mod collectors;
mod error;
mod optional;
#[cfg(feature = "parallel")]
mod options;
#[cfg(feature = "parallel")]
mod parallel;
mod pipeline;
mod source;
mod stage;
mod terminal;

pub use collector::Collector;
pub use error::Error;
pub use error::Result;
pub use optional::Optional;
#[cfg(feature = "parallel")]
pub use options::{DEFAULT_MIN_PARTITION_LEN, Options};
#[cfg(feature = "parallel")]
pub use parallel::ParallelPipeline;
pub use pipeline::{ConsumptionState, Pipeline};
pub use source::{Bound, SourceKind};
pub use stage::StageKind;
pub use terminal::Iter;
