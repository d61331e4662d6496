//! Scenario benchmarks.
//!
//! A full engine with a connected voice pool, rendered the way the output
//! callback renders it, plus the control-side cost of note traffic.

mod voices;

pub use voices::{bench_note_churn, bench_voices};
