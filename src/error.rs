use std::fmt;

/// Expected control conditions that unwind the frame loop.
///
/// These travel through the ordinary `anyhow::Error` channel and are picked
/// out at the run-loop boundary with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopSignal {
    /// The user asked to leave (window closed, Escape).
    Quit(String),
    /// The display mode has to be rebuilt; the previous resolution is discarded.
    DisplayReset,
}

impl fmt::Display for LoopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopSignal::Quit(reason) => write!(f, "quit requested: {reason}"),
            LoopSignal::DisplayReset => write!(f, "display mode reset requested"),
        }
    }
}

impl std::error::Error for LoopSignal {}

/// If `err` is a loop signal, return it.
pub fn as_signal(err: &anyhow::Error) -> Option<&LoopSignal> {
    err.downcast_ref::<LoopSignal>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_survive_anyhow_round_trip() {
        let err: anyhow::Error = LoopSignal::DisplayReset.into();
        assert_eq!(as_signal(&err), Some(&LoopSignal::DisplayReset));

        let err = anyhow::Error::from(LoopSignal::Quit("closed".into())).context("frame 12");
        assert!(matches!(as_signal(&err), Some(LoopSignal::Quit(_))));
    }

    #[test]
    fn ordinary_errors_are_not_signals() {
        let err = anyhow::anyhow!("mission \"x\" not found");
        assert!(as_signal(&err).is_none());
    }
}
