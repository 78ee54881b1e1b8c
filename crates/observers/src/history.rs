use reduct_core::Observer;

use crate::traits::HasErrorEstimate;

/// An observer that records every error estimate it sees.
///
/// Points are stored as `[event index, estimate]`, counting all observed
/// events so gaps mark events without an estimate. Pass `&mut history` as the
/// observer and inspect it once the offline stage returns.
///
/// # Example
///
/// ```ignore
/// let mut history = History::new();
/// method.offline(&mut history)?;
/// assert!(history.is_decreasing());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    seen: usize,
    points: Vec<[f64; 2]>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an estimate at the next event index.
    pub fn record(&mut self, estimate: Option<f64>) {
        #[allow(clippy::cast_precision_loss)]
        let x = self.seen as f64;
        if let Some(y) = estimate {
            self.points.push([x, y]);
        }
        self.seen += 1;
    }

    /// Returns the recorded `[event index, estimate]` points.
    #[must_use]
    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Returns the recorded estimates in order.
    pub fn estimates(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|[_, y]| *y)
    }

    /// Returns the last recorded estimate.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.points.last().map(|[_, y]| *y)
    }

    /// Returns `true` if no estimate grew from one point to the next.
    #[must_use]
    pub fn is_decreasing(&self) -> bool {
        self.points.windows(2).all(|pair| pair[1][1] <= pair[0][1])
    }
}

impl<E: HasErrorEstimate, A> Observer<E, A> for History {
    fn observe(&mut self, event: &E) -> Option<A> {
        self.record(event.error_estimate());
        None
    }
}
