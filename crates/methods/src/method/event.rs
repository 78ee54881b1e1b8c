use reduct_core::Parameter;

/// Events emitted while a reduction method builds its basis.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A greedy iteration finished enriching the basis and scanned the
    /// training set.
    GreedyIteration {
        /// Zero-based iteration index.
        iteration: usize,

        /// Basis size after this iteration, liftings excluded.
        n: usize,

        /// The largest error estimate over the training set.
        max_error_estimate: f64,

        /// The training parameter that attains it, used next.
        next: Parameter,
    },

    /// A truth snapshot was computed for POD.
    Snapshot {
        /// Zero-based index in the training set.
        index: usize,

        /// Size of the training set.
        total: usize,
    },

    /// POD modes were selected.
    PodModes {
        /// Number of modes added to the basis.
        retained: usize,

        /// Relative energy of the discarded modes.
        discarded_energy: f64,
    },
}

impl Event {
    /// Returns the error estimate carried by the event, if any.
    #[must_use]
    pub fn error_estimate(&self) -> Option<f64> {
        match self {
            Self::GreedyIteration {
                max_error_estimate, ..
            } => Some(*max_error_estimate),
            Self::PodModes {
                discarded_energy, ..
            } => Some(*discarded_energy),
            Self::Snapshot { .. } => None,
        }
    }
}
