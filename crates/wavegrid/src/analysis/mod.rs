//! Acoustic parameter extraction from recorded responses.
//!
//! The analyzer reads the response cube through the simulator's query
//! surface and reduces the emitter cell's history to occlusion, wet gain,
//! low-pass intensity, RT60 and the arrival/departure directions.

mod analyzer;
pub mod metrics;

pub use analyzer::{AnalyzerResult, ImpulseAnalyzer, ResponseAnalyzer};
pub use metrics::{energy, high_frequency_ratio, onset_index, rt60_from_decay, schroeder_decay};
