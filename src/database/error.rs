use std::fmt::{self, Display};

use potion::{Error, HtmlError};
use warp::reject::{Reject, Rejection};

use super::validation::ValidationRule;

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Query failed: {}", value.info);
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// Shorthand for the `map_err` every query goes through.
pub fn query_error(e: sqlx::Error) -> Error {
    Error::from(QueryError::from(e))
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

/// A recipe write rejected by one of the named rules in [`ValidationRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    rule: ValidationRule,
    info: String,
}

impl ValidationError {
    pub fn new(rule: ValidationRule, info: impl Into<String>) -> Self {
        Self {
            rule,
            info: info.into(),
        }
    }

    pub fn rule(&self) -> ValidationRule {
        self.rule
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule.as_str(), self.info)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Error {
            code: 400,
            info: Some(value.to_string()),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct NotFoundError {
    info: String,
}

impl NotFoundError {
    pub fn new(entity: &str, id: i32) -> Self {
        Self {
            info: format!("No {entity} exists with specified id ({id})"),
        }
    }
}

impl From<NotFoundError> for Error {
    fn from(value: NotFoundError) -> Self {
        Error {
            code: 404,
            info: Some(value.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct ConflictError {
    info: String,
}

impl ConflictError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<ConflictError> for Error {
    fn from(value: ConflictError) -> Self {
        Error {
            code: 409,
            info: Some(value.info),
            redirect: None,
        }
    }
}

#[derive(Debug)]
pub struct ForbiddenError {
    info: String,
}

impl ForbiddenError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<ForbiddenError> for Error {
    fn from(value: ForbiddenError) -> Self {
        Error {
            code: 403,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// Missing, malformed or expired credentials.
#[derive(Debug)]
pub struct UnauthenticatedError {
    info: String,
}

impl UnauthenticatedError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<UnauthenticatedError> for Error {
    fn from(value: UnauthenticatedError) -> Self {
        Error {
            code: 401,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// A `potion::Error` flattened into a warp rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: u16,
    pub detail: String,
}

impl From<Error> for Failure {
    fn from(value: Error) -> Self {
        Self {
            status: value.code as u16,
            detail: value
                .info
                .clone()
                .unwrap_or_else(|| String::from("Request failed")),
        }
    }
}

impl Reject for Failure {}

pub fn reject(e: Error) -> Rejection {
    warp::reject::custom(Failure::from(e))
}
