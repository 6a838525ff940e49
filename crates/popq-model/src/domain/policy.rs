use serde::{Deserialize, Serialize};

/// Rule by which a waiter decides how many elements to take once some are
/// available.
///
/// The policy is chosen per command and stays fixed for the lifetime of the
/// waiter it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimPolicy {
    /// Claim every element currently present in the list.
    All,
    /// Claim at most `count` elements (`count >= 1`).
    ///
    /// `count` is a ceiling, not a floor: a claim of fewer than `count`
    /// elements still succeeds as long as at least one is taken.
    Batch { count: u64 },
}

impl ClaimPolicy {
    /// Number of elements this policy takes from a list of length `available`.
    ///
    /// Returns `0` only when `available` is `0`; an empty list is the sole
    /// condition under which a claim fails.
    pub fn take_limit(&self, available: usize) -> usize {
        match self {
            ClaimPolicy::All => available,
            ClaimPolicy::Batch { count } => {
                usize::try_from(*count).unwrap_or(usize::MAX).min(available)
            }
        }
    }

    /// Short symbolic identifier, for logging and routing.
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimPolicy::All => "all",
            ClaimPolicy::Batch { .. } => "batch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_takes_everything() {
        assert_eq!(ClaimPolicy::All.take_limit(0), 0);
        assert_eq!(ClaimPolicy::All.take_limit(5), 5);
    }

    #[test]
    fn batch_is_capped_by_availability() {
        let policy = ClaimPolicy::Batch { count: 3 };
        assert_eq!(policy.take_limit(0), 0);
        assert_eq!(policy.take_limit(2), 2);
        assert_eq!(policy.take_limit(3), 3);
        assert_eq!(policy.take_limit(10), 3);
    }

    #[test]
    fn oversized_batch_count_does_not_overflow() {
        let policy = ClaimPolicy::Batch { count: u64::MAX };
        assert_eq!(policy.take_limit(7), 7);
    }

    #[test]
    fn kind_labels() {
        assert_eq!(ClaimPolicy::All.kind(), "all");
        assert_eq!(ClaimPolicy::Batch { count: 1 }.kind(), "batch");
    }

    #[test]
    fn serde_roundtrip() {
        let all = serde_json::to_string(&ClaimPolicy::All).unwrap();
        assert_eq!(all, r#""all""#);

        let batch = serde_json::to_string(&ClaimPolicy::Batch { count: 2 }).unwrap();
        assert_eq!(batch, r#"{"batch":{"count":2}}"#);

        let back: ClaimPolicy = serde_json::from_str(&batch).unwrap();
        assert_eq!(back, ClaimPolicy::Batch { count: 2 });
    }
}
