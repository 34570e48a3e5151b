use crate::formatter::RunFormatter;

/// A formatter that produces no output.
///
/// `NoFormatter` discards every event. This is useful when a run is driven
/// from inside another test, where only the [`RunReport`](crate::RunReport)
/// matters.
#[derive(Debug, Default, Clone)]
pub struct NoFormatter;

impl RunFormatter for NoFormatter {
    type Error = ();
}
