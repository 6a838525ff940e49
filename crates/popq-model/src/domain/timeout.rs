use std::time::Duration;

/// How long a caller is willing to stay blocked.
///
/// Derived from the relative millisecond timeout supplied with a command.
/// A timeout of `0` means "wait forever", not "return immediately".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Block until data arrives or the call is cancelled.
    Forever,
    /// Block for at most this long.
    After(Duration),
}

impl WaitTimeout {
    /// Build a timeout from a relative millisecond value.
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            WaitTimeout::Forever
        } else {
            WaitTimeout::After(Duration::from_millis(ms))
        }
    }

    /// Returns `true` if the caller never expires on its own.
    pub fn is_forever(&self) -> bool {
        matches!(self, WaitTimeout::Forever)
    }

    /// Bounded wait duration, or `None` for an indefinite wait.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            WaitTimeout::Forever => None,
            WaitTimeout::After(d) => Some(*d),
        }
    }
}
