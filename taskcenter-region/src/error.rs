/// Region error types and the tagged outcome of region calls
///
/// A region call can end three ways. It succeeds, it is rejected for a reason
/// the caller may see (a permission or owner-invariant rule), or it fails
/// internally (storage, routing). Internal failures must never reach an end
/// user verbatim, so they are kept in a separate type.
///
/// ```
/// use taskcenter_region::error::{RegionFailure, RegionOutcome, RegionRejection};
///
/// let outcome: RegionOutcome<()> = RegionOutcome::Rejected(RegionRejection::ZeroOwnerCount);
/// match outcome.into_result() {
///     Err(failure) => panic!("internal failure: {failure}"),
///     Ok(Err(rejection)) => assert!(rejection.is_invariant_violation()),
///     Ok(Ok(())) => unreachable!(),
/// }
/// ```

use serde::Serialize;
use uuid::Uuid;

/// Shard storage errors
#[derive(Debug, thiserror::Error)]
pub enum ShardStoreError {
    #[error("Shard {0} does not exist")]
    InvalidShard(i32),

    #[error("Account {0} does not exist on this shard")]
    AccountNotFound(Uuid),

    #[error("Account {0} already exists on this shard")]
    AccountExists(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A reason a region refused a call, safe to show the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RegionRejection {
    #[error("Insufficient permission")]
    InsufficientPermission,

    /// The call would leave the account without an active owner
    #[error("Operation would leave the account without an owner")]
    ZeroOwnerCount,

    #[error("Invalid operation")]
    InvalidOperation,

    #[error("Too many entities in one request")]
    MaxEntityCountExceeded,
}

impl RegionRejection {
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, RegionRejection::ZeroOwnerCount)
    }
}

/// An internal region failure; log it, never surface it
#[derive(Debug, thiserror::Error)]
pub enum RegionFailure {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Region {0} has no shards")]
    NoShards(String),

    #[error("Shard store error: {0}")]
    Store(#[from] ShardStoreError),
}

/// Outcome of a region call that can be rejected
#[derive(Debug)]
pub enum RegionOutcome<T> {
    Done(T),
    Rejected(RegionRejection),
    Failed(RegionFailure),
}

impl<T> RegionOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, RegionOutcome::Done(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RegionOutcome<U> {
        match self {
            RegionOutcome::Done(value) => RegionOutcome::Done(f(value)),
            RegionOutcome::Rejected(rejection) => RegionOutcome::Rejected(rejection),
            RegionOutcome::Failed(failure) => RegionOutcome::Failed(failure),
        }
    }

    /// Splits the outcome so that an internal failure is handled first
    pub fn into_result(self) -> Result<Result<T, RegionRejection>, RegionFailure> {
        match self {
            RegionOutcome::Done(value) => Ok(Ok(value)),
            RegionOutcome::Rejected(rejection) => Ok(Err(rejection)),
            RegionOutcome::Failed(failure) => Err(failure),
        }
    }
}

impl<T> From<RegionFailure> for RegionOutcome<T> {
    fn from(failure: RegionFailure) -> Self {
        RegionOutcome::Failed(failure)
    }
}

impl<T, E> From<Result<Result<T, RegionRejection>, E>> for RegionOutcome<T>
where
    E: Into<RegionFailure>,
{
    fn from(result: Result<Result<T, RegionRejection>, E>) -> Self {
        match result {
            Ok(Ok(value)) => RegionOutcome::Done(value),
            Ok(Err(rejection)) => RegionOutcome::Rejected(rejection),
            Err(failure) => RegionOutcome::Failed(failure.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_dominates_when_split() {
        let outcome: RegionOutcome<u8> =
            RegionOutcome::Failed(RegionFailure::InvalidRegion("mars".to_string()));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_nested_result_conversion() {
        let store_err: Result<Result<(), RegionRejection>, ShardStoreError> =
            Err(ShardStoreError::InvalidShard(9));
        assert!(matches!(
            RegionOutcome::from(store_err),
            RegionOutcome::Failed(RegionFailure::Store(ShardStoreError::InvalidShard(9)))
        ));

        let rejected: Result<Result<(), RegionRejection>, ShardStoreError> =
            Ok(Err(RegionRejection::InvalidOperation));
        assert!(matches!(
            RegionOutcome::from(rejected),
            RegionOutcome::Rejected(RegionRejection::InvalidOperation)
        ));
    }

    #[test]
    fn test_map_keeps_rejection() {
        let outcome: RegionOutcome<u8> = RegionOutcome::Rejected(RegionRejection::ZeroOwnerCount);
        assert!(matches!(
            outcome.map(|v| v + 1),
            RegionOutcome::Rejected(RegionRejection::ZeroOwnerCount)
        ));
    }

    #[test]
    fn test_rejection_serializes_as_code() {
        let json = serde_json::to_string(&RegionRejection::MaxEntityCountExceeded).unwrap();
        assert_eq!(json, "\"max_entity_count_exceeded\"");
    }
}
