use std::{any::type_name, fmt, marker::PhantomData, str::FromStr};

use serde::{Deserialize, Serialize, de};

use crate::{
    event::{Abs, EventType, Syn},
    record::Layout,
};

struct NamedOrRawVisitor<T: FromStr, F: Fn(u16) -> T> {
    from_raw: F,
    _p: PhantomData<T>,
}

impl<T: FromStr, F: Fn(u16) -> T> NamedOrRawVisitor<T, F> {
    fn new(from_raw: F) -> Self {
        Self {
            from_raw,
            _p: PhantomData,
        }
    }
}

impl<'de, T: FromStr, F: Fn(u16) -> T> de::Visitor<'de> for NamedOrRawVisitor<T, F> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("named constant or raw code")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        T::from_str(v).map_err(|_| {
            E::custom(format!(
                "unknown constant '{v}' for type '{}'",
                type_name::<T>()
            ))
        })
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match u16::try_from(v) {
            Ok(v) => Ok((self.from_raw)(v)),
            Err(_) => Err(E::invalid_value(
                de::Unexpected::Unsigned(v),
                &"unsigned 16-bit value",
            )),
        }
    }
}

macro_rules! serde_impls {
    ( $($t:ident),* ) => {
        $(
            /// Deserialization from a raw 16-bit code or a named constant.
            impl<'a> Deserialize<'a> for $t {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'a>,
                {
                    if deserializer.is_human_readable() {
                        // Human-readable formats accept names (`EV_ABS`, `ABS_X`, ...) as well as
                        // raw `u16` values, which requires a self-describing format.
                        deserializer.deserialize_any(NamedOrRawVisitor::new(<$t>::from_raw))
                    } else {
                        let raw = u16::deserialize(deserializer)?;
                        Ok(<$t>::from_raw(raw))
                    }
                }
            }

            impl Serialize for $t {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    if serializer.is_human_readable() {
                        match self.name() {
                            Some(name) => serializer.collect_str(&name),
                            None => self.raw().serialize(serializer),
                        }
                    } else {
                        self.raw().serialize(serializer)
                    }
                }
            }
        )*
    };
}

serde_impls!(EventType, Syn, Abs);

impl Layout {
    const NAMES: [&str; 2] = ["narrow", "wide"];

    fn index(self) -> u8 {
        match self {
            Layout::Narrow => 0,
            Layout::Wide => 1,
        }
    }
}

struct LayoutVisitor;

impl<'de> de::Visitor<'de> for LayoutVisitor {
    type Value = Layout;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("`narrow` or `wide`")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "narrow" => Ok(Layout::Narrow),
            "wide" => Ok(Layout::Wide),
            _ => Err(E::unknown_variant(v, &Layout::NAMES)),
        }
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            0 => Ok(Layout::Narrow),
            1 => Ok(Layout::Wide),
            _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
        }
    }
}

/// `narrow` or `wide` in human-readable formats, 0 or 1 in binary formats.
impl<'a> Deserialize<'a> for Layout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(LayoutVisitor)
        } else {
            deserializer.deserialize_u8(LayoutVisitor)
        }
    }
}

impl Serialize for Layout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(Self::NAMES[usize::from(self.index())])
        } else {
            serializer.serialize_u8(self.index())
        }
    }
}

#[cfg(test)]
mod tests {
    use csv::{ReaderBuilder, WriterBuilder};

    use super::*;

    #[test]
    fn csv() {
        let mut out = Vec::new();
        let mut w = WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut out);
        w.serialize((EventType::ABS, Abs::HAT0X, Layout::Wide)).unwrap();
        w.serialize((EventType::from_raw(0x1e), Abs::from_raw(0x3f), Layout::Narrow))
            .unwrap();
        w.flush().unwrap();
        drop(w);

        let s = String::from_utf8(out).unwrap();
        assert_eq!(s, "EV_ABS,ABS_HAT0X,wide\n30,63,narrow\n");

        let mut r = ReaderBuilder::new()
            .has_headers(false)
            .from_reader(s.as_bytes());
        let mut iter = r.deserialize::<(EventType, Abs, Layout)>();
        assert_eq!(
            iter.next().unwrap().unwrap(),
            (EventType::ABS, Abs::HAT0X, Layout::Wide)
        );
        assert_eq!(
            iter.next().unwrap().unwrap(),
            (EventType::from_raw(0x1e), Abs::from_raw(0x3f), Layout::Narrow)
        );
        assert!(iter.next().is_none());

        let mut r = ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&b"ABS_NOPE"[..]);
        assert!(r.deserialize::<Abs>().next().unwrap().is_err());
    }

    #[test]
    fn postcard() {
        let b = postcard::to_allocvec(&(Syn::REPORT, Abs::RZ, Layout::Wide)).unwrap();
        assert_eq!(
            postcard::from_bytes::<(Syn, Abs, Layout)>(&b).unwrap(),
            (Syn::REPORT, Abs::RZ, Layout::Wide)
        );

        let b = postcard::to_allocvec(&EventType::from_raw(0xffff)).unwrap();
        assert_eq!(
            postcard::from_bytes::<EventType>(&b).unwrap(),
            EventType::from_raw(0xffff)
        );

        assert!(postcard::from_bytes::<Layout>(&[2]).is_err());
    }
}
