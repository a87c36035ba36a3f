//! Decoding of a device's advertised event types and codes.

use std::{collections::BTreeMap, fmt, io};

use crate::{
    Error,
    bits::{BitSet, Word},
    error::Chain,
    event::{EventType, KEY_MAX},
};

/// The event types and codes a device advertises, built from its `EVIOCGBIT` bitmasks.
///
/// Maps each supported [`EventType`] to the codes supported for it, in ascending order. Types
/// that are not supported are absent; a present type always has at least one code.
/// [`EventType::SYN`] is never listed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    types: BTreeMap<EventType, Vec<u16>>,
}

impl Capabilities {
    /// Builds the capability table by calling `query` for every bitmask it needs.
    ///
    /// `query(ty, words)` has to fill `words` with the kernel bitmask for `ty`, as
    /// [`Device::event_bits`][crate::Device::event_bits] does. It is first called with
    /// [`EventType::SYN`] to get the set of supported event types, then once per supported type.
    ///
    /// Failures are logged and never fatal: if the event type list can't be queried the table is
    /// empty, and a type whose code list can't be queried is left out.
    pub fn query<F>(mut query: F) -> Self
    where
        F: FnMut(EventType, &mut [Word]) -> io::Result<()>,
    {
        let mut this = Self::default();

        let mut type_bits = BitSet::new(EventType::MAX.raw().into());
        if let Err(source) = query(EventType::SYN, type_bits.words_mut()) {
            log::warn!(
                "{}",
                Chain(&Error::CapabilityQueryFailed {
                    event_type: EventType::SYN,
                    source,
                })
            );
            return this;
        }

        for ty in type_bits.iter() {
            // `EventType::MAX` fits in a `u16`, and the set can't hold larger values.
            let ty = EventType::from_raw(ty as u16);
            if ty == EventType::SYN {
                continue;
            }

            let mut code_bits = BitSet::new(KEY_MAX.into());
            if let Err(source) = query(ty, code_bits.words_mut()) {
                log::warn!(
                    "{}",
                    Chain(&Error::CapabilityQueryFailed {
                        event_type: ty,
                        source,
                    })
                );
                continue;
            }

            let codes: Vec<u16> = code_bits.iter().map(|code| code as u16).collect();
            if codes.is_empty() {
                log::debug!("device advertises {ty:?} without any codes; treating it as unsupported");
                continue;
            }
            this.types.insert(ty, codes);
        }

        log::trace!("device capabilities: {this:?}");
        this
    }

    /// Returns the supported codes for `event_type`, in ascending order.
    ///
    /// Returns an empty slice if the type is not supported.
    pub fn codes(&self, event_type: EventType) -> &[u16] {
        self.types.get(&event_type).map_or(&[], Vec::as_slice)
    }

    /// Returns whether the device supports `event_type`.
    pub fn supports(&self, event_type: EventType) -> bool {
        self.types.contains_key(&event_type)
    }

    /// Returns whether the device supports `code` under `event_type`.
    pub fn supports_code(&self, event_type: EventType, code: u16) -> bool {
        self.codes(event_type).binary_search(&code).is_ok()
    }

    /// Returns an iterator over the supported event types and their codes, ordered by type.
    pub fn iter(&self) -> impl Iterator<Item = (EventType, &[u16])> + '_ {
        self.types.iter().map(|(ty, codes)| (*ty, &**codes))
    }

    /// Returns the number of supported event types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns whether the device advertises no event types at all.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.types.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        device::Device,
        event::Abs,
        test::TestDevice,
    };

    use super::*;

    fn set_bits(words: &mut [Word], bits: &[usize]) {
        let mut set = BitSet::from_words(words.to_vec());
        for &bit in bits {
            set.insert(bit);
        }
        words.copy_from_slice(set.words());
    }

    #[test]
    fn types_without_codes_are_absent() {
        let mut queried = Vec::new();
        let caps = Capabilities::query(|ty, words| {
            queried.push(ty.raw());
            match ty.raw() {
                0 => set_bits(words, &[1, 5, 9]),
                1 => set_bits(words, &[0, 2]),
                _ => {}
            }
            Ok(())
        });

        assert_eq!(queried, &[0, 1, 5, 9]);
        assert_eq!(caps.len(), 1);
        assert_eq!(caps.codes(EventType::KEY), &[0, 2]);
        assert!(!caps.supports(EventType::SW));
        assert!(!caps.supports(EventType::from_raw(9)));
        assert_eq!(format!("{caps:?}"), "{EV_KEY: [0, 2]}");
    }

    #[test]
    fn buffer_sizes() {
        let caps = Capabilities::query(|ty, words| {
            let bits = words.len() * Word::BITS as usize;
            if ty == EventType::SYN {
                assert!(bits > usize::from(EventType::MAX.raw()));
                set_bits(words, &[3]);
            } else {
                assert!(bits > usize::from(KEY_MAX));
                // The highest code in the largest code space must make it through.
                set_bits(words, &[0, 1, usize::from(KEY_MAX)]);
            }
            Ok(())
        });
        assert_eq!(caps.codes(EventType::ABS), &[0, 1, KEY_MAX]);
    }

    #[test]
    fn type_query_failure() {
        let caps = Capabilities::query(|_, _| Err(io::ErrorKind::PermissionDenied.into()));
        assert!(caps.is_empty());
        assert_eq!(caps.codes(EventType::KEY), &[] as &[u16]);
    }

    #[test]
    fn code_query_failure() {
        let caps = Capabilities::query(|ty, words| match ty {
            EventType::SYN => {
                set_bits(words, &[1, 3]);
                Ok(())
            }
            EventType::KEY => Err(io::ErrorKind::InvalidInput.into()),
            _ => {
                set_bits(words, &[0x10, 0x11]);
                Ok(())
            }
        });
        assert!(!caps.supports(EventType::KEY));
        assert_eq!(caps.codes(EventType::ABS), &[0x10, 0x11]);
        assert!(caps.supports_code(EventType::ABS, 0x11));
        assert!(!caps.supports_code(EventType::ABS, 0x12));
    }

    #[test]
    fn syn_is_never_listed() {
        let caps = Capabilities::query(|ty, words| {
            assert_eq!(ty, EventType::SYN, "SYN codes must not be queried");
            set_bits(words, &[0]);
            Ok(())
        });
        assert!(caps.is_empty());
    }

    #[test]
    fn from_device() {
        let dev = TestDevice::builder()
            .codes(EventType::KEY, &[0x131, 0x130, 0x13c])
            .abs(Abs::X, crate::AbsInfo::new(-32768, 32767))
            .abs(Abs::HAT0X, crate::AbsInfo::new(-1, 1))
            .build();
        let caps = Capabilities::query(|ty, words| dev.event_bits(ty, words));
        assert_eq!(
            caps.iter().collect::<Vec<_>>(),
            &[
                (EventType::KEY, &[0x130, 0x131, 0x13c][..]),
                (EventType::ABS, &[0x00, 0x10][..]),
            ]
        );
    }
}
