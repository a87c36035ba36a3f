//! Event types and the event codes this crate interprets.
//!
//! Every [`EventRecord`] carries an [`EventType`], a raw `u16` code and a raw `i32` value. Only
//! three event types carry meaning for joystick consolidation:
//!
//! - [`EventType::SYN`]: a synchronization marker. The code is a [`Syn`]; a [`Syn::REPORT`] ends
//!   one atomic input frame.
//! - [`EventType::KEY`]: a key or button changed state. The code is the kernel key code (`KEY_*`
//!   or `BTN_*`), the value is 0 (released), 1 (pressed) or 2 (autorepeat).
//! - [`EventType::ABS`]: an absolute axis changed. The code is an [`Abs`] axis, the value is the
//!   new axis position.
//!
//! All other event types are passed through to listeners untouched.
//!
//! [`EventRecord`]: crate::record::EventRecord

#[cfg(any(test, feature = "serde"))]
mod serde;

use std::{error::Error, fmt, io};

/// The highest key code the kernel can report (`KEY_MAX`).
///
/// This is also the largest code space of any event type, so capability bit vectors sized for it
/// can hold the codes of every type.
pub const KEY_MAX: u16 = 0x2ff;

ffi_enum! {
    /// Types of [`EventRecord`][crate::record::EventRecord]s.
    pub enum EventType: u16 {
        /// Synchronization event.
        SYN = 0x00,
        /// A key press, release, or repeat.
        KEY = 0x01,
        /// A relative axis movement.
        REL = 0x02,
        /// An absolute axis change.
        ABS = 0x03,
        /// A miscellaneous event.
        MSC = 0x04,
        /// A switch changed state.
        SW  = 0x05,
        /// An LED changed state.
        LED = 0x11,
        /// A sound started or stopped playing.
        SND = 0x12,
        /// The autorepeat settings have changed.
        REP = 0x14,
        /// Force-feedback control.
        FF  = 0x15,
        /// Power-management events.
        PWR = 0x16,
        /// Force-feedback status.
        FF_STATUS = 0x17,
    }
}

impl EventType {
    /// The highest event type the kernel can report (`EV_MAX`).
    pub const MAX: Self = Self(0x1f);

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}
prefixed_names!(EventType, "EV_");

ffi_enum! {
    /// Synchronization event codes.
    ///
    /// The *value* of a `SYN` event is unspecified. Only its position in the event stream and its
    /// code matter.
    pub enum Syn: u16 {
        /// Marks the end of a group of events.
        REPORT = 0,
        CONFIG = 1,
        /// Used by the legacy ("type A") multitouch protocol.
        MT_REPORT = 2,
        /// Indicates that one or more events were dropped due to overflow of the kernel buffer.
        DROPPED = 3,
    }
}

impl Syn {
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}
prefixed_names!(Syn, "SYN_");

ffi_enum! {
    /// `ABS_*`: An absolute axis identifier.
    ///
    /// Only the axes commonly found on joysticks, gamepads, wheels and pedals have names here;
    /// any other `u16` is still a valid (unnamed) axis.
    pub enum Abs: u16 {
        X              = 0x00,
        Y              = 0x01,
        Z              = 0x02,
        RX             = 0x03,
        RY             = 0x04,
        RZ             = 0x05,
        THROTTLE       = 0x06,
        RUDDER         = 0x07,
        WHEEL          = 0x08,
        GAS            = 0x09,
        BRAKE          = 0x0a,
        HAT0X          = 0x10,
        HAT0Y          = 0x11,
        HAT1X          = 0x12,
        HAT1Y          = 0x13,
        HAT2X          = 0x14,
        HAT2Y          = 0x15,
        HAT3X          = 0x16,
        HAT3Y          = 0x17,
        PRESSURE       = 0x18,
        DISTANCE       = 0x19,
        TILT_X         = 0x1a,
        TILT_Y         = 0x1b,
        TOOL_WIDTH     = 0x1c,
        VOLUME         = 0x20,
        PROFILE        = 0x21,
        MISC           = 0x28,
    }
}

impl Abs {
    /// The highest axis code the kernel can report (`ABS_MAX`).
    pub const MAX: Self = Self(0x3f);

    #[inline]
    pub const fn from_raw(code: u16) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}
prefixed_names!(Abs, "ABS_");

/// A decoded view of an event, returned by [`EventRecord::kind`].
///
/// [`EventRecord::kind`]: crate::record::EventRecord::kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventKind {
    /// A synchronization marker.
    Syn(Syn),
    /// A key or button changed state.
    Key {
        /// Raw kernel key code.
        code: u16,
        /// 0 = released, 1 = pressed, 2 = autorepeat.
        value: i32,
    },
    /// An absolute axis changed.
    Abs { axis: Abs, value: i32 },
    /// Any other event type; not interpreted by this crate.
    Other {
        event_type: EventType,
        code: u16,
        value: i32,
    },
}

/// Error returned by [`FromStr`][std::str::FromStr] implementations when no matching constant
/// name was found.
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownVariant {
    pub(crate) _p: (),
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown variant name")
    }
}
impl Error for UnknownVariant {}
impl From<UnknownVariant> for io::Error {
    fn from(value: UnknownVariant) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}

/// The kernel constant name of a code, like `EV_KEY` or `ABS_HAT0X`.
#[derive(Clone, Copy)]
pub struct VariantName {
    prefix: &'static str,
    variant: &'static str,
}

impl VariantName {
    pub(crate) fn new(prefix: &'static str, variant: &'static str) -> Self {
        Self { prefix, variant }
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix)?;
        f.write_str(self.variant)
    }
}

impl fmt::Debug for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_repr() {
        assert_eq!(format!("{:?}", EventType::ABS), "EV_ABS");
        assert_eq!(format!("{:?}", EventType::from_raw(0x1e)), "EventType(0x1e)");
        assert_eq!(format!("{:?}", Syn::REPORT), "SYN_REPORT");
        assert_eq!(format!("{:?}", Abs::HAT0X), "ABS_HAT0X");
        assert_eq!(format!("{:?}", Abs::from_raw(0x3f)), "Abs(0x3f)");

        assert_eq!("EV_KEY".parse::<EventType>(), Ok(EventType::KEY));
        assert_eq!("ABS_RZ".parse::<Abs>(), Ok(Abs::RZ));
        assert!("KEY".parse::<EventType>().is_err());
        assert!("ABS_NOPE".parse::<Abs>().is_err());
    }
}
