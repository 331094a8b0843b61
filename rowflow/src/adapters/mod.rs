//! Adapters that bring external data into row streams.

pub mod jsonl;
