pub mod chat;
pub mod learn_box;
pub mod scribbles;
pub mod settings;
pub mod task_track;

use crate::conversation::ChatError;
use crate::db::StoreError;
use crate::learn_box::LearnBoxError;
use crate::scribbles::ScribbleError;
use crate::task_track::TaskTrackError;

/// Everything a front end can get back from a command.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    LearnBox(#[from] LearnBoxError),
    #[error(transparent)]
    TaskTrack(#[from] TaskTrackError),
    #[error(transparent)]
    Scribbles(#[from] ScribbleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Settings(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::media::MediaError> for AppError {
    fn from(err: crate::media::MediaError) -> Self {
        AppError::Chat(ChatError::Media(err))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_serialize_as_their_message() {
        let err = AppError::from(ChatError::UnknownConversation("abc".into()));
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#""conversation not found: abc""#
        );
    }
}
