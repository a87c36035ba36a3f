//! The binary `struct input_event` record read from an event device.
//!
//! The kernel writes one fixed-size record per event:
//!
//! ```text
//! struct input_event {
//!     struct timeval time;   // seconds + microseconds, each one `long` wide
//!     __u16 type;
//!     __u16 code;
//!     __s32 value;
//! };
//! ```
//!
//! The width of the two timestamp fields follows the word size of the running kernel's ABI, so a
//! reader has to be told which [`Layout`] to expect. It cannot be inferred from the bytes.

use std::{
    ffi::c_ulong,
    fmt,
    time::{Duration, SystemTime},
};

use crate::{
    Error,
    event::{Abs, EventKind, EventType, Syn},
};

/// The in-memory layout of an event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// 32-bit `tv_sec` and `tv_usec` fields (16-byte records), used by 32-bit targets.
    Narrow,
    /// 64-bit `tv_sec` and `tv_usec` fields (24-byte records), used by 64-bit targets.
    Wide,
}

impl Layout {
    /// Returns the layout used by the kernel ABI this crate was compiled for.
    ///
    /// This is only a default. A 32-bit process running on a 64-bit kernel through a compat layer
    /// still receives narrow records, and the layout can always be overridden explicitly via
    /// [`SessionBuilder::layout`][crate::SessionBuilder::layout].
    pub const fn native() -> Self {
        if size_of::<c_ulong>() == 8 {
            Self::Wide
        } else {
            Self::Narrow
        }
    }

    /// Returns the size of one record in bytes.
    #[inline]
    pub const fn record_size(self) -> usize {
        match self {
            Self::Narrow => 16,
            Self::Wide => 24,
        }
    }

    /// Width of each of the two timestamp fields.
    const fn time_field_size(self) -> usize {
        match self {
            Self::Narrow => 4,
            Self::Wide => 8,
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::native()
    }
}

/// One event read from (or destined for) an event device.
///
/// Records are plain values: they are decoded once per read, handed to every listener by
/// reference, and not retained by the session.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventRecord {
    sec: i64,
    usec: i64,
    event_type: EventType,
    code: u16,
    value: i32,
}

impl EventRecord {
    /// Creates an [`EventRecord`] from raw values.
    ///
    /// The timestamp of the event will be set to 0.
    #[inline]
    pub const fn new(event_type: EventType, code: u16, value: i32) -> Self {
        Self {
            sec: 0,
            usec: 0,
            event_type,
            code,
            value,
        }
    }

    /// Returns a copy of `self` with the given timestamp.
    #[inline]
    pub const fn with_timestamp(mut self, sec: i64, usec: i64) -> Self {
        self.sec = sec;
        self.usec = usec;
        self
    }

    /// Decodes one record from the start of `bytes`.
    ///
    /// Exactly [`Layout::record_size`] bytes are consumed; anything after them is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRecord`] if `bytes` is shorter than one record.
    pub fn decode(bytes: &[u8], layout: Layout) -> Result<Self, Error> {
        let expected = layout.record_size();
        let Some(bytes) = bytes.get(..expected) else {
            return Err(Error::MalformedRecord {
                expected,
                actual: bytes.len(),
            });
        };

        let (sec, usec, rest) = match layout {
            Layout::Narrow => {
                let (sec, rest) = take::<4>(bytes);
                let (usec, rest) = take::<4>(rest);
                (
                    i32::from_ne_bytes(sec).into(),
                    i32::from_ne_bytes(usec).into(),
                    rest,
                )
            }
            Layout::Wide => {
                let (sec, rest) = take::<8>(bytes);
                let (usec, rest) = take::<8>(rest);
                (i64::from_ne_bytes(sec), i64::from_ne_bytes(usec), rest)
            }
        };
        let (ty, rest) = take::<2>(rest);
        let (code, rest) = take::<2>(rest);
        let (value, _) = take::<4>(rest);

        Ok(Self {
            sec,
            usec,
            event_type: EventType(u16::from_ne_bytes(ty)),
            code: u16::from_ne_bytes(code),
            value: i32::from_ne_bytes(value),
        })
    }

    /// Encodes `self` into the first [`Layout::record_size`] bytes of `out`.
    ///
    /// Timestamps that don't fit into a [`Layout::Narrow`] field are truncated, like the kernel
    /// does when it hands out compat records.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than one record.
    pub fn encode(&self, layout: Layout, out: &mut [u8]) {
        let out = &mut out[..layout.record_size()];
        let time = layout.time_field_size();
        match layout {
            Layout::Narrow => {
                out[..4].copy_from_slice(&(self.sec as i32).to_ne_bytes());
                out[4..8].copy_from_slice(&(self.usec as i32).to_ne_bytes());
            }
            Layout::Wide => {
                out[..8].copy_from_slice(&self.sec.to_ne_bytes());
                out[8..16].copy_from_slice(&self.usec.to_ne_bytes());
            }
        }
        let rest = &mut out[time * 2..];
        rest[..2].copy_from_slice(&self.event_type.0.to_ne_bytes());
        rest[2..4].copy_from_slice(&self.code.to_ne_bytes());
        rest[4..8].copy_from_slice(&self.value.to_ne_bytes());
    }

    /// Encodes `self` into a freshly allocated buffer.
    pub fn to_bytes(&self, layout: Layout) -> Vec<u8> {
        let mut buf = vec![0; layout.record_size()];
        self.encode(layout, &mut buf);
        buf
    }

    /// Returns the seconds part of the timestamp.
    #[inline]
    pub fn sec(&self) -> i64 {
        self.sec
    }

    /// Returns the microseconds part of the timestamp.
    #[inline]
    pub fn usec(&self) -> i64 {
        self.usec
    }

    /// Returns the timestamp as a [`SystemTime`].
    ///
    /// The kernel stamps events with `CLOCK_REALTIME` by default, which is the clock
    /// [`SystemTime::now`] uses as well.
    pub fn time(&self) -> SystemTime {
        match self.try_time() {
            Some(time) => time,
            None => {
                log::warn!(
                    "event timestamp out of range of `SystemTime`: sec={} usec={}",
                    self.sec,
                    self.usec,
                );
                SystemTime::UNIX_EPOCH
            }
        }
    }
    fn try_time(&self) -> Option<SystemTime> {
        let usec = self.usec.clamp(0, 999_999);
        let dur = Duration::new(
            self.sec.unsigned_abs(),
            (usec * 1000) as u32, // 999_999_000 fits in u32
        );

        if self.sec >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(dur)
        } else {
            SystemTime::UNIX_EPOCH.checked_sub(dur)
        }
    }

    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    #[inline]
    pub fn raw_code(&self) -> u16 {
        self.code
    }

    #[inline]
    pub fn raw_value(&self) -> i32 {
        self.value
    }

    /// Returns a `match`able view of this record.
    pub fn kind(&self) -> EventKind {
        match self.event_type {
            EventType::SYN => EventKind::Syn(Syn(self.code)),
            EventType::KEY => EventKind::Key {
                code: self.code,
                value: self.value,
            },
            EventType::ABS => EventKind::Abs {
                axis: Abs(self.code),
                value: self.value,
            },
            event_type => EventKind::Other {
                event_type,
                code: self.code,
                value: self.value,
            },
        }
    }
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("EventRecord");
        s.field("time", &format_args!("{}.{:06}", self.sec, self.usec));
        match self.kind() {
            EventKind::Syn(syn) => s.field("syn", &syn),
            EventKind::Abs { axis, value } => s.field("abs", &axis).field("value", &value),
            _ => s
                .field("type", &self.event_type)
                .field("code", &self.code)
                .field("value", &self.value),
        };
        s.finish()
    }
}

fn take<const N: usize>(bytes: &[u8]) -> ([u8; N], &[u8]) {
    let (head, rest) = bytes.split_at(N);
    let mut out = [0; N];
    out.copy_from_slice(head);
    (out, rest)
}
