#![warn(clippy::perf)]
#![allow(clippy::type_complexity)]

//! Rowflow is a library for composing and executing **row-oriented
//! dataflow graphs** over large, possibly out-of-memory inputs.
//!
//! A [Graph] is a lazy, reusable pipeline description built from four
//! stream operators (map, grouped reduce, external sort and
//! co-grouped join) over dynamic [Row]s.  Nothing runs until the
//! graph is executed against named [Sources]; execution wires the
//! description into a chain of pull-based iterator adapters, so rows
//! flow one at a time and only sort (bounded by its run budget) and
//! the left group of a join ever buffer.
//!
//! ```rust
//! use rowflow::*;
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let graph = Graph::from_source("docs")
//!         .map(Split::new("text"))
//!         .sort(&["text"])
//!         .reduce(Count::new("count"), &["text"]);
//!
//!     let docs = vec![
//!         Row::try_from(json!({"doc_id": 1, "text": "hello little world"}))?,
//!         Row::try_from(json!({"doc_id": 2, "text": "hello little little hell"}))?,
//!     ];
//!     let counts = graph.run(&mut Sources::new().rows("docs", docs))?;
//!
//!     assert_eq!(counts[2].str_field("text")?, "little");
//!     assert_eq!(counts[2].int_field("count")?, 3);
//!     Ok(())
//! }
//! ```
//!
//! ## Ordering contracts
//!
//! [reduce](Graph::reduce) requires its input *grouped* by the key
//! tuple (equal keys contiguous); [join](Graph::join) requires both
//! inputs fully *sorted* by the same tuple and fails fast if a key
//! regresses.  [sort](Graph::sort) establishes the stronger form:
//! lexicographic, ascending, stable, spilling runs to disk when the
//! input exceeds its in-memory budget.
//!
//! ## Sources
//!
//! Executions pull fresh streams from the source factories, so a
//! graph can be run many times and a join can read the same source on
//! both sides.  A single-use stream (for example
//! [from_file](adapters::jsonl::from_file)) can be registered
//! directly, with the caveat that only the first execution sees its
//! rows; later runs silently see it exhausted.

#[macro_use]
extern crate log;

pub mod adapters;

mod error;
mod graph;
mod mappers;
mod operators;
mod pipelines;
mod reducers;
mod row;
mod types;

pub use error::*;
pub use graph::*;
pub use mappers::*;
pub use operators::*;
pub use pipelines::*;
pub use reducers::*;
pub use row::*;
pub use types::*;
