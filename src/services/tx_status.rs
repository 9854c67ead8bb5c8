//! Local transaction status model and the classifier that maps one
//! Blockfrost lookup onto it.

use crate::services::blockfrost::{BlockfrostError, TransactionContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Submitted => "submitted",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "submitted" => Some(TransactionStatus::Submitted),
            "confirmed" => Some(TransactionStatus::Confirmed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states are never mutated by the status sync job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Confirmed | TransactionStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TransactionStatus::Pending => 0,
            TransactionStatus::Submitted => 1,
            TransactionStatus::Confirmed => 2,
            TransactionStatus::Failed => 3,
        }
    }

    /// Whether moving from `current` to `self` is a forward transition.
    ///
    /// The classifier is stateless and can observe states out of order
    /// (a cached lookup, a lagging indexer), so the job only ever applies
    /// transitions that advance: pending -> submitted -> confirmed, with
    /// failed reachable from either non-terminal state.
    pub fn advances_from(&self, current: TransactionStatus) -> bool {
        !current.is_terminal() && self.rank() > current.rank()
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one remote lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: TransactionStatus,
    pub block_height: Option<i64>,
    pub slot: Option<i64>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

impl Classification {
    fn of(status: TransactionStatus) -> Self {
        Self {
            status,
            block_height: None,
            slot: None,
            error_message: None,
            error_code: None,
        }
    }
}

/// Map a single Blockfrost transaction lookup to a local status.
///
/// A lookup that succeeded with a block height is confirmed; without one
/// the transaction is known to the network but not yet in a block. A 404
/// means the hash is not visible to the indexer, which keeps the record
/// pending. Any other error marks the transaction failed with the error
/// captured for diagnostics.
pub fn classify_lookup(
    result: Result<TransactionContent, BlockfrostError>,
) -> Classification {
    match result {
        Ok(tx) => match tx.block_height {
            Some(height) => Classification {
                block_height: Some(height),
                slot: tx.slot,
                ..Classification::of(TransactionStatus::Confirmed)
            },
            None => Classification::of(TransactionStatus::Submitted),
        },
        Err(BlockfrostError::NotFound) => Classification::of(TransactionStatus::Pending),
        Err(err) => Classification {
            error_code: err.error_code(),
            error_message: Some(err.to_string()),
            ..Classification::of(TransactionStatus::Failed)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(block_height: Option<i64>, slot: Option<i64>) -> TransactionContent {
        TransactionContent {
            hash: "abc123".to_string(),
            block_height,
            slot,
        }
    }

    #[test]
    fn lookup_with_block_height_is_confirmed() {
        let classification = classify_lookup(Ok(content(Some(500), Some(12345))));
        assert_eq!(classification.status, TransactionStatus::Confirmed);
        assert_eq!(classification.block_height, Some(500));
        assert_eq!(classification.slot, Some(12345));
    }

    #[test]
    fn lookup_without_block_height_is_submitted() {
        let classification = classify_lookup(Ok(content(None, None)));
        assert_eq!(classification.status, TransactionStatus::Submitted);
        assert_eq!(classification.block_height, None);
        assert_eq!(classification.slot, None);
    }

    #[test]
    fn not_found_is_pending() {
        let classification = classify_lookup(Err(BlockfrostError::NotFound));
        assert_eq!(classification.status, TransactionStatus::Pending);
        assert_eq!(classification.error_message, None);
    }

    #[test]
    fn other_errors_are_failed_with_diagnostics() {
        let classification = classify_lookup(Err(BlockfrostError::Api {
            status: 400,
            body: "malformed hash".to_string(),
        }));
        assert_eq!(classification.status, TransactionStatus::Failed);
        assert_eq!(classification.error_code.as_deref(), Some("400"));
        assert!(classification.error_message.is_some());
    }

    #[test]
    fn transitions_only_advance() {
        use TransactionStatus::*;

        assert!(Submitted.advances_from(Pending));
        assert!(Confirmed.advances_from(Pending));
        assert!(Confirmed.advances_from(Submitted));
        assert!(Failed.advances_from(Pending));
        assert!(Failed.advances_from(Submitted));

        // No backward moves
        assert!(!Pending.advances_from(Submitted));
        assert!(!Pending.advances_from(Pending));
        assert!(!Submitted.advances_from(Submitted));

        // Terminal states never change, in either direction
        assert!(!Submitted.advances_from(Confirmed));
        assert!(!Failed.advances_from(Confirmed));
        assert!(!Confirmed.advances_from(Failed));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Submitted,
            TransactionStatus::Confirmed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::parse("unknown"), None);
    }
}
