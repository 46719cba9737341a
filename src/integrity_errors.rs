use crate::AppError;

/// Stable taxonomy of integrity engine error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityErrorCode {
    /// An update or delete touched a different number of rows than expected.
    UnexpectedAffectedRowCount,
    /// A check found a violation an earlier check in the pipeline should have removed.
    PrerequisiteViolated,
    /// A check identifier is not part of the catalogue.
    UnknownCheck,
    /// The catalogue lists a check before one of its declared prerequisites.
    InvalidCheckOrder,
    /// The schema document is malformed or references unknown identifiers.
    SchemaInvalid,
}

impl IntegrityErrorCode {
    /// Returns the stable machine-readable code string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrityErrorCode::UnexpectedAffectedRowCount => "INTEGRITY/UNEXPECTED_ROW_COUNT",
            IntegrityErrorCode::PrerequisiteViolated => "INTEGRITY/PREREQUISITE",
            IntegrityErrorCode::UnknownCheck => "INTEGRITY/UNKNOWN_CHECK",
            IntegrityErrorCode::InvalidCheckOrder => "INTEGRITY/CHECK_ORDER",
            IntegrityErrorCode::SchemaInvalid => "INTEGRITY/SCHEMA_INVALID",
        }
    }

    /// Returns the canonical developer-facing message associated with the code.
    #[must_use]
    pub fn developer_message(self) -> &'static str {
        match self {
            IntegrityErrorCode::UnexpectedAffectedRowCount => {
                "A repair statement affected an unexpected number of rows."
            }
            IntegrityErrorCode::PrerequisiteViolated => {
                "A prerequisite check has not been applied. Re-run the pipeline from the first check."
            }
            IntegrityErrorCode::UnknownCheck => "The requested check does not exist.",
            IntegrityErrorCode::InvalidCheckOrder => {
                "A check is ordered before one of the checks it depends on."
            }
            IntegrityErrorCode::SchemaInvalid => "The schema document is invalid.",
        }
    }

    /// Convenience helper to create an [`AppError`] with this taxonomy entry.
    #[must_use]
    pub fn into_error(self) -> AppError {
        AppError::new(self.as_str(), self.developer_message())
    }
}

/// Builds the fatal error raised when a later check trips over a violation
/// owned by `prerequisite`.
pub fn prerequisite_violated(check: &str, prerequisite: &str, table: &str, uid: i64) -> AppError {
    IntegrityErrorCode::PrerequisiteViolated
        .into_error()
        .with_context("check", check)
        .with_context("prerequisite", prerequisite)
        .with_context("table", table)
        .with_context("uid", uid.to_string())
}

/// Builds the fatal error raised when a statement did not touch exactly `expected` rows.
pub fn unexpected_row_count(
    operation: &str,
    table: &str,
    uid: i64,
    expected: usize,
    actual: usize,
) -> AppError {
    IntegrityErrorCode::UnexpectedAffectedRowCount
        .into_error()
        .with_context("operation", operation)
        .with_context("table", table)
        .with_context("uid", uid.to_string())
        .with_context("expected", expected.to_string())
        .with_context("actual", actual.to_string())
}

/// Looks an [`AppError`] code back up in the taxonomy.
pub fn classify(error: &AppError) -> Option<IntegrityErrorCode> {
    const ALL: [IntegrityErrorCode; 5] = [
        IntegrityErrorCode::UnexpectedAffectedRowCount,
        IntegrityErrorCode::PrerequisiteViolated,
        IntegrityErrorCode::UnknownCheck,
        IntegrityErrorCode::InvalidCheckOrder,
        IntegrityErrorCode::SchemaInvalid,
    ];
    ALL.into_iter().find(|code| code.as_str() == error.code())
}
