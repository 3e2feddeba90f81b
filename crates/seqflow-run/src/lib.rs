//! Walkthrough binary for `seqflow`.
//!
//! Replays the classic stream demonstrations (creating sources, terminal
//! operations, intermediate operations and Optional handling) and prints each
//! result next to the expression that produced it.
mod cli;
mod demo;

pub use cli::Cli;
pub use demo::Demo;
