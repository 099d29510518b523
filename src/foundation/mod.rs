//! Foundation types: exact time arithmetic and interpolation.

pub mod interp;
pub mod rational;

pub use interp::{ColorRgba, Interpolatable, Vec2};
pub use rational::{RationalTime, TimeRange, DEFAULT_TIMESCALE};
