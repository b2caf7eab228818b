//! Domain types for screenlab

pub mod bar;
pub mod instrument;

pub use bar::Bar;
pub use instrument::{Board, InstrumentRef, UNKNOWN_INDUSTRY};
