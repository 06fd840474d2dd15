//! Mapping from sqlx errors to domain errors.

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// SQLSTATE for a serialization failure.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for a detected deadlock.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Classifies a sqlx error.
///
/// Contention becomes `StorageConflict`, connectivity and pool exhaustion
/// become `StorageUnavailable`, everything else is internal.
pub(crate) fn map_sqlx_error(context: &str, err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(UNIQUE_VIOLATION) => {
                DomainError::conflict(format!("{}: {}", context, err))
            }
            _ => DomainError::new(ErrorCode::InternalError, format!("{}: {}", context, err)),
        },
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            DomainError::unavailable(format!("{}: {}", context, err))
        }
        _ => DomainError::new(ErrorCode::InternalError, format!("{}: {}", context, err)),
    }
}

/// True if the error is a unique violation on `constraint`.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Wraps a row that no longer maps onto the domain.
pub(crate) fn corrupt_row(table: &'static str) -> impl Fn(ValidationError) -> DomainError {
    move |err| {
        DomainError::new(
            ErrorCode::DataCorruption,
            format!("Invalid row in {}: {}", table, err),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_unavailable() {
        let err = map_sqlx_error("redeem", sqlx::Error::PoolTimedOut);
        assert_eq!(err.code, ErrorCode::StorageUnavailable);
        assert!(err.message.contains("redeem"));
    }

    #[test]
    fn row_not_found_is_internal() {
        let err = map_sqlx_error("lookup", sqlx::Error::RowNotFound);
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn non_database_error_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::PoolClosed, "promo_codes_code_key"));
    }

    #[test]
    fn corrupt_row_names_table() {
        let err = corrupt_row("promo_codes")(ValidationError::empty_field("code"));
        assert_eq!(err.code, ErrorCode::DataCorruption);
        assert!(err.message.contains("promo_codes"));
    }
}
