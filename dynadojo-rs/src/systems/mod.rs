//! Reference system implementations.

mod linear;

pub use linear::{LinearSystem, LinearSystemConfig};
