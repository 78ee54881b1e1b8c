use reduct_core::Observer;

use crate::traits::{CanStopEarly, HasErrorEstimate};

/// Stops the offline stage once an error estimate drops below `tolerance`.
///
/// Useful to cap the basis size by accuracy independently of the method's
/// own tolerance. Events without an estimate never stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopBelow {
    tolerance: f64,
}

impl StopBelow {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl<E: HasErrorEstimate, A: CanStopEarly> Observer<E, A> for StopBelow {
    fn observe(&mut self, event: &E) -> Option<A> {
        let estimate = event.error_estimate()?;
        (estimate < self.tolerance).then(|| {
            log::info!("estimate {estimate:e} below {:e}, stopping early", self.tolerance);
            A::stop_early()
        })
    }
}
