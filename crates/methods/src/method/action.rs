/// Actions an observer can take during offline basis construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop enriching and keep the basis built so far.
    ///
    /// Reduced operators are assembled for the current basis before the
    /// offline stage returns.
    StopEarly,
}
