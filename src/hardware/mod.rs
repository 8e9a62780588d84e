//! Hardware collaborators.
//!
//! The pipeline talks to hardware only through [`crate::sweep::Acquire`] and
//! [`crate::units::ClockConverter`]. Real board drivers implement those traits outside
//! this crate; `mock` provides simulated implementations for tests and the CLI.

pub mod mock;

pub use mock::{LinearClock, MockResonator};
