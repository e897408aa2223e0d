use thiserror::Error;

use crate::scene::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShadowError {
    /// Fatal for the frame: nothing is drawn until the settings are fixed.
    #[error("slice min resolution {min} is greater than max resolution {max}")]
    InvalidResolutionRange { min: u32, max: u32 },
    #[error("object {0:?} is missing or destroyed and cannot be registered")]
    InvalidObject(ObjectId),
}
