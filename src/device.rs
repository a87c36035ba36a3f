//! The operations a [`Session`][crate::Session] needs from an input device.

use std::{io, time::Duration};

use crate::{
    AbsInfo,
    bits::Word,
    event::{Abs, EventType},
    identity::{InputId, Version},
};

/// An open input device.
///
/// [`Evdev`][crate::Evdev] implements this for real `/dev/input/event*` nodes. Other
/// implementations can feed a [`Session`][crate::Session] from any byte source that speaks the
/// `struct input_event` format, such as recorded traces or test doubles.
///
/// All methods take `&self`: the session calls [`Device::read`] from its reading thread while
/// other threads may grab the device or query axis information at the same time.
pub trait Device: Send + Sync + 'static {
    /// Reads raw event bytes into `buf`.
    ///
    /// Like [`io::Read::read`], this may return fewer bytes than requested. Returning `Ok(0)`
    /// signals end-of-file, which terminates the session's reading loop.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Blocks for at most `timeout` until [`Device::read`] has data available.
    ///
    /// Returns `Ok(false)` if the timeout elapsed first. The reading loop calls this before every
    /// read, so the timeout bounds how long closing a session takes. The default implementation
    /// returns `Ok(true)` immediately, making every read a plain blocking read.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let _ = timeout;
        Ok(true)
    }

    /// Fetches device hardware information as an [`InputId`] (`EVIOCGID`).
    fn input_id(&self) -> io::Result<InputId>;

    /// Fetches the device name (`EVIOCGNAME`).
    fn name(&self) -> io::Result<String>;

    /// Fetches the evdev protocol version (`EVIOCGVERSION`).
    fn driver_version(&self) -> io::Result<Version>;

    /// Fills `words` with the capability bitmask for `event_type` (`EVIOCGBIT`).
    ///
    /// `EventType::SYN` (type 0) requests the set of supported event types instead of a set of
    /// codes. Bit *n* of the result lives in `words[n / Word::BITS]`, at offset
    /// `n % Word::BITS`.
    fn event_bits(&self, event_type: EventType, words: &mut [Word]) -> io::Result<()>;

    /// Fetches range and resolution information of an absolute axis (`EVIOCGABS`).
    fn abs_info(&self, axis: Abs) -> io::Result<AbsInfo>;

    /// Grabs (`true`) or releases (`false`) exclusive access to the device (`EVIOCGRAB`).
    fn set_grab(&self, grab: bool) -> io::Result<()>;
}
