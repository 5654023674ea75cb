use derive_more::derive::Display;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Display)]
pub enum AppError {
    /// Could not reach or authenticate with an external collaborator before the run
    #[display("setup failed: {_0}")]
    Setup(anyhow::Error),
    #[display("mailbox error: {_0}")]
    Mailbox(anyhow::Error),
    #[display("parser error: {_0}")]
    Parser(anyhow::Error),
    #[display("store error: {_0}")]
    Store(anyhow::Error),
    #[display("failure report error: {_0}")]
    Report(anyhow::Error),
    #[display("internal error: {_0}")]
    Internal(anyhow::Error),
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl AppError {
    /// True for failures that must abort the run instead of becoming a failure entry
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Setup(_))
    }
}
