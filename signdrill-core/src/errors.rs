use crate::CardId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid quality {0}: expected 0..=5")]
    InvalidQuality(u8),
    #[error("card already answered in this session: {0}")]
    AlreadyAnswered(CardId),
    #[error("card is not part of this session: {0}")]
    NotInSession(CardId),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("storage error: {0}")]
    Storage(&'static str),
}
