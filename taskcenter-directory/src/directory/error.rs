/// Directory errors
///
/// Every variant reports an [`ErrorKind`] so the transport layer can map it
/// without matching on individual variants. Internal failures (storage,
/// region, mailer, crypto) are logged where they happen and surface only as
/// an opaque [`ErrorRef`].

use std::fmt;
use taskcenter_region::RegionRejection;
use taskcenter_shared::validation::ValidationError;
use uuid::Uuid;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Permission,
    InvariantViolation,
    Infrastructure,
}

/// Correlates a caller-facing error with its log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRef(pub Uuid);

impl ErrorRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ErrorRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No such region")]
    NoSuchRegion,

    /// The account's region no longer exists
    #[error("Region is gone")]
    RegionGone,

    #[error("No such user")]
    NoSuchUser,

    #[error("No such org")]
    NoSuchOrg,

    #[error("Invalid activation attempt")]
    InvalidActivationAttempt,

    #[error("Invalid password reset attempt")]
    InvalidResetPwdAttempt,

    #[error("Invalid new email confirmation attempt")]
    InvalidNewEmailConfirmationAttempt,

    #[error("Invalid name or password")]
    InvalidNameOrPwd,

    #[error("Incorrect password")]
    IncorrectPwd,

    #[error("User not activated")]
    UserNotActivated,

    #[error("Name already in use")]
    NameAlreadyInUse,

    #[error("Email already in use")]
    EmailAlreadyInUse,

    #[error("No new email registered")]
    NoNewEmailRegistered,

    #[error("Too many entities in one request")]
    MaxEntityCountExceeded,

    #[error("Invalid operation")]
    InvalidOperation,

    #[error("Insufficient permission")]
    InsufficientPermission,

    /// The org's task center has not been created yet
    #[error("Org is not provisioned")]
    OrgNotProvisioned,

    /// The user is the only owner of at least one org
    #[error("User is the only owner of an org")]
    OnlyOwnerMember,

    #[error("{0}")]
    Rejected(RegionRejection),

    #[error("Internal error (ref {0})")]
    Infrastructure(ErrorRef),

    #[error("Rollback failed (ref {0})")]
    CompensationFailed(ErrorRef),
}

impl DirectoryError {
    pub fn kind(&self) -> ErrorKind {
        use DirectoryError::*;
        match self {
            Validation(_) => ErrorKind::Validation,
            NoSuchRegion
            | NoSuchUser
            | NoSuchOrg
            | InvalidActivationAttempt
            | InvalidResetPwdAttempt
            | InvalidNewEmailConfirmationAttempt
            | NoNewEmailRegistered => ErrorKind::NotFound,
            NameAlreadyInUse | EmailAlreadyInUse | OrgNotProvisioned => ErrorKind::Conflict,
            InvalidNameOrPwd
            | IncorrectPwd
            | UserNotActivated
            | MaxEntityCountExceeded
            | InvalidOperation
            | InsufficientPermission => ErrorKind::Permission,
            OnlyOwnerMember => ErrorKind::InvariantViolation,
            Rejected(rejection) if rejection.is_invariant_violation() => ErrorKind::InvariantViolation,
            Rejected(_) => ErrorKind::Permission,
            RegionGone | Infrastructure(_) | CompensationFailed(_) => ErrorKind::Infrastructure,
        }
    }

    /// The log reference, for errors that carry one
    pub fn error_ref(&self) -> Option<ErrorRef> {
        match self {
            DirectoryError::Infrastructure(r) | DirectoryError::CompensationFailed(r) => Some(*r),
            _ => None,
        }
    }
}

/// Logs an internal failure and returns the opaque error that replaces it
pub(crate) fn internal(context: &str, err: impl fmt::Display) -> DirectoryError {
    let reference = ErrorRef::new();
    tracing::error!(error_ref = %reference, error = %err, "{}", context);
    DirectoryError::Infrastructure(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(DirectoryError::NoSuchUser.kind(), ErrorKind::NotFound);
        assert_eq!(DirectoryError::InvalidActivationAttempt.kind(), ErrorKind::NotFound);
        assert_eq!(DirectoryError::NameAlreadyInUse.kind(), ErrorKind::Conflict);
        assert_eq!(DirectoryError::OnlyOwnerMember.kind(), ErrorKind::InvariantViolation);
        assert_eq!(
            DirectoryError::Rejected(RegionRejection::ZeroOwnerCount).kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            DirectoryError::Rejected(RegionRejection::InsufficientPermission).kind(),
            ErrorKind::Permission
        );
        assert_eq!(DirectoryError::RegionGone.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn test_internal_hides_detail() {
        let err = internal("store failed", "connection refused on 10.0.0.7");
        let reference = err.error_ref().unwrap();
        assert_eq!(err.to_string(), format!("Internal error (ref {reference})"));
        assert!(!err.to_string().contains("10.0.0.7"));
    }
}
