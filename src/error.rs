use std::{error, fmt, io, path::PathBuf};

use thiserror::Error;

use crate::event::EventType;

/// Errors reported by this crate.
///
/// Only [`Error::DeviceOpenFailed`], [`Error::GrabFailed`] and [`Error::Io`] are ever returned to
/// callers. The other variants describe conditions that are recovered from (with defaults or by
/// discarding a single event) and are only reported through the `log` facade.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Fewer bytes than one event record were available for decoding.
    #[error("malformed event record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    /// Querying the supported event types or codes failed.
    #[error("failed to query supported {event_type:?} codes")]
    CapabilityQueryFailed {
        /// The queried type; [`EventType::SYN`] stands for the event type list itself.
        event_type: EventType,
        #[source]
        source: io::Error,
    },

    /// Querying the device ID or name failed.
    #[error("failed to query device {what}")]
    IdentityQueryFailed {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The device file could not be opened.
    #[error("failed to open '{}'", path.display())]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Grabbing or ungrabbing the device failed.
    #[error("failed to {} device", if *grab { "grab" } else { "ungrab" })]
    GrabFailed {
        /// `true` for a grab, `false` for an ungrab.
        grab: bool,
        #[source]
        source: io::Error,
    },

    /// The device sent an event code it did not advertise.
    #[error("{event_type:?} code {code:#x} is missing from the device capabilities")]
    UnmappedEventCode { event_type: EventType, code: u16 },

    /// Reading from the device failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match &e {
            Error::Io(e) => e.kind(),
            Error::MalformedRecord { .. } | Error::UnmappedEventCode { .. } => {
                io::ErrorKind::InvalidData
            }
            Error::DeviceOpenFailed { source, .. }
            | Error::GrabFailed { source, .. }
            | Error::CapabilityQueryFailed { source, .. }
            | Error::IdentityQueryFailed { source, .. } => source.kind(),
        };
        match e {
            Error::Io(e) => e,
            e => io::Error::new(kind, e),
        }
    }
}

/// Formats an error followed by its chain of sources, for logging.
pub(crate) struct Chain<'a>(pub &'a dyn error::Error);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(e) = source {
            write!(f, ": {e}")?;
            source = e.source();
        }
        Ok(())
    }
}
