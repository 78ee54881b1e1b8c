//! Reusable observers for offline reduced-order model construction.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work with any reduction method emitting error estimates.
//!
//! # Modules
//!
//! - [`traits`]: Capability traits for generic observers
//!   ([`HasErrorEstimate`], [`CanStopEarly`])
//!
//! # Observers
//!
//! - [`History`] records every error estimate for later inspection.
//! - [`LogProgress`] reports each event through the `log` facade.
//! - [`StopBelow`] stops the offline stage once an estimate is small enough.
//!
//! [`Observer`]: reduct_core::Observer
//! [`HasErrorEstimate`]: traits::HasErrorEstimate
//! [`CanStopEarly`]: traits::CanStopEarly

pub mod traits;

mod history;
mod progress;
mod stopping;

pub use history::History;
pub use progress::LogProgress;
pub use stopping::StopBelow;
