use thiserror::Error;

pub type SheetResult<T> = Result<T, SheetError>;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Login required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Could not read spreadsheet: {0}")]
    Parse(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("File saved, but logging to the database failed: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SheetError {
    pub fn not_found(what: impl Into<String>) -> Self {
        SheetError::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        SheetError::Validation(what.into())
    }
}

impl From<calamine::Error> for SheetError {
    fn from(e: calamine::Error) -> Self {
        SheetError::Parse(e.to_string())
    }
}

impl From<csv::Error> for SheetError {
    fn from(e: csv::Error) -> Self {
        SheetError::Parse(e.to_string())
    }
}

impl From<sqlx::Error> for SheetError {
    fn from(e: sqlx::Error) -> Self {
        SheetError::Persistence(e.to_string())
    }
}
