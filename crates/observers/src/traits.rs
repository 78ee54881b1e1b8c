//! Capability traits for generic observers.
//!
//! These traits abstract over method-specific event and action types, so an
//! observer written once works with every reduction method.
//!
//! # Event traits
//!
//! - [`HasErrorEstimate`]: events that may carry an error estimate
//!
//! # Action traits
//!
//! - [`CanStopEarly`]: actions that can signal early termination
//!
//! # Example
//!
//! ```rust
//! use reduct_core::Observer;
//! use reduct_observers::traits::{CanStopEarly, HasErrorEstimate};
//!
//! struct AfterPlateau {
//!     previous: Option<f64>,
//! }
//!
//! impl<E: HasErrorEstimate, A: CanStopEarly> Observer<E, A> for AfterPlateau {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         let estimate = event.error_estimate()?;
//!         let stalled = self.previous.is_some_and(|previous| estimate >= 0.9 * previous);
//!         self.previous = Some(estimate);
//!         stalled.then(A::stop_early)
//!     }
//! }
//! ```

use reduct_methods::{Action, Event};

/// An event that may carry an error estimate.
pub trait HasErrorEstimate {
    /// Returns the estimate for this event, or `None` for progress-only
    /// events.
    fn error_estimate(&self) -> Option<f64>;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the offline stage early.
    fn stop_early() -> Self;
}

impl HasErrorEstimate for Event {
    fn error_estimate(&self) -> Option<f64> {
        Event::error_estimate(self)
    }
}

impl CanStopEarly for Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}
