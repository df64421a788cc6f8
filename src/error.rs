use crate::scene::{AnchorId, AvatarId, GrabberId, ObjectId};
use thiserror::Error;

/// Reasons a manipulation request was rejected. Nothing changed when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManipulationError {
    #[error("unknown avatar {0:?}")]
    UnknownAvatar(AvatarId),

    #[error("unknown grabber {0:?}")]
    UnknownGrabber(GrabberId),

    #[error("unknown grabbable object {0:?}")]
    UnknownObject(ObjectId),

    #[error("unknown anchor {0:?}")]
    UnknownAnchor(AnchorId),

    #[error("grab point {index} out of range for {object:?} ({count} points)")]
    GrabPointOutOfRange {
        object: ObjectId,
        index: usize,
        count: usize,
    },

    #[error("anchor {anchor:?} already holds {occupant:?}")]
    AnchorOccupied { anchor: AnchorId, occupant: ObjectId },

    #[error("anchor {anchor:?} does not accept {object:?}")]
    IncompatibleAnchor { anchor: AnchorId, object: ObjectId },

    #[error("{0:?} has no active manipulation")]
    NotGrabbed(ObjectId),

    #[error("{grabber:?} is not holding {object:?}")]
    NotHeldBy { grabber: GrabberId, object: ObjectId },
}

/// Errors loading [`crate::ManipulationSettings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
