//! Reference model implementations.
//!
//! The engine is generic over [`crate::model::Model`]; these exist so a
//! challenge can run end to end from the command line.

mod least_squares;

pub use least_squares::{LeastSquaresAct, LeastSquaresConfig, LeastSquaresFit, LeastSquaresModel};
