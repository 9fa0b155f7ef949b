//! Domain types shared by every pipeline stage.

pub mod candle;
pub mod interval;

pub use candle::{canonicalize, Candle};
pub use interval::{Interval, IntervalError};
