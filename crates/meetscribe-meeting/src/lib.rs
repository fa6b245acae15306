//! MeetScribe Meeting Tracking
//!
//! One meeting context at a time, owned by the tab that reported it.
//! The toolbar badge is a projection of (meeting present, session valid)
//! recomputed on every triggering event.

mod error;
mod meeting;
mod state;
mod tracker;

pub use error::MeetingError;
pub use meeting::{MeetingDetails, MeetingInfo};
pub use state::{Badge, MeetingState};
pub use tracker::{BadgeSink, MeetingLifecycleTracker, TabId};

pub type Result<T> = std::result::Result<T, MeetingError>;
