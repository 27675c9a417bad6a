use crate::model::CommentId;

/// Errors produced by forest and store operations.
///
/// None of these are fatal: a rejected operation leaves the forest as it was.
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("comment {0} not found")]
    NotFound(CommentId),

    #[error("comment content must not be blank")]
    EmptyContent,

    #[error("comment id {0} appears more than once")]
    DuplicateId(CommentId),

    #[error("no comment ids left after {0}")]
    IdsExhausted(CommentId),

    #[error("invalid forest json: {0}")]
    Json(#[from] serde_json::Error),
}

impl CommentError {
    /// True for a miss on an id lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommentError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CommentError>;
