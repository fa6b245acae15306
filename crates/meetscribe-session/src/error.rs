//! Session error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No valid session: open the recording and let it play to capture credentials")]
    NoValidSession,

    #[error("Stale write: session was cleared after epoch {ticket_epoch} (now {current_epoch})")]
    StaleWrite {
        ticket_epoch: u64,
        current_epoch: u64,
    },

    #[error("Superseded write: cookies stored at version {stored_version}, after ticket version {ticket_version}")]
    Superseded {
        ticket_version: u64,
        stored_version: u64,
    },
}
