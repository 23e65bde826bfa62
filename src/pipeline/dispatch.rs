//! Send-or-suppress decisions against the dispatch ledger.

use chrono::{DateTime, Duration, Utc};

use crate::models::{DispatchPolicy, DispatchRecord};

/// Outcome of checking a payload against the last recorded send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Send,
    /// Same payload as the last successful send
    Duplicate,
    /// Inside the cooldown window of the last successful send
    CoolingDown,
}

impl Decision {
    pub fn should_send(&self) -> bool {
        matches!(self, Decision::Send)
    }
}

/// Decide whether a payload with `fingerprint` may be sent at `now`.
pub fn decide(
    policy: DispatchPolicy,
    last: Option<&DispatchRecord>,
    fingerprint: &str,
    now: DateTime<Utc>,
) -> Decision {
    let Some(last) = last else {
        return Decision::Send;
    };

    match policy {
        DispatchPolicy::ContentBased if last.fingerprint == fingerprint => Decision::Duplicate,
        DispatchPolicy::ContentBased => Decision::Send,
        DispatchPolicy::Cooldown { secs } => {
            // A window too large for chrono never expires.
            let window = i64::try_from(secs).ok().and_then(Duration::try_seconds);
            match window {
                Some(window) if now.signed_duration_since(last.last_sent_at) >= window => {
                    Decision::Send
                }
                _ => Decision::CoolingDown,
            }
        }
    }
}
