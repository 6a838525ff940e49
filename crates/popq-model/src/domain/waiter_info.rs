use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{ClaimPolicy, Key};

/// Snapshot of one blocked caller, for introspection.
///
/// Produced by the registry on demand; the live waiter record stays owned
/// by its key's queue and is never exposed directly. Only pending waiters
/// are ever listed: a resolved waiter leaves its queue atomically, so
/// there is no terminal state to report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiterInfo {
    /// Unique waiter identifier.
    pub id: String,
    /// Key the waiter is queued against.
    pub key: Key,
    /// Claim policy the waiter registered with.
    pub policy: ClaimPolicy,
    /// When the waiter was queued.
    #[serde(with = "time_serde")]
    pub registered_at: SystemTime,
    /// When the waiter will expire, if it carries a deadline.
    #[serde(default, with = "opt_time_serde", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<SystemTime>,
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        u64::try_from(since_epoch.as_millis())
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

mod opt_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            None => serializer.serialize_none(),
            Some(t) => {
                let since_epoch = t
                    .duration_since(UNIX_EPOCH)
                    .map_err(serde::ser::Error::custom)?;
                let millis =
                    u64::try_from(since_epoch.as_millis()).map_err(serde::ser::Error::custom)?;
                Some(millis).serialize(serializer)
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(|m| UNIX_EPOCH + Duration::from_millis(m)))
    }
}
