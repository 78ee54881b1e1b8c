use reduct_core::Observer;
use reduct_methods::Event;

/// An observer that logs offline progress at `info` level and never acts.
#[derive(Debug, Clone, Default)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    /// Creates an observer prefixing every message with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl<A> Observer<Event, A> for LogProgress {
    fn observe(&mut self, event: &Event) -> Option<A> {
        let label = &self.label;
        match event {
            Event::GreedyIteration {
                iteration,
                n,
                max_error_estimate,
                next,
            } => log::info!(
                "{label}: greedy iteration {iteration}, N = {n}, max estimate {max_error_estimate:e}, next {next}"
            ),
            Event::Snapshot { index, total } => {
                log::debug!("{label}: snapshot {} of {total}", index + 1);
            }
            Event::PodModes {
                retained,
                discarded_energy,
            } => log::info!(
                "{label}: retained {retained} modes, discarded energy {discarded_energy:e}"
            ),
        }
        None
    }
}
