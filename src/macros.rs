/// ffi_enum! {}
macro_rules! ffi_enum {
    (
        $( #[$attrs:meta] )*
        $v:vis enum $name:ident: $native:ty {
            $(
                $( #[$variant_attrs:meta] )*
                $variant:ident = $value:expr
            ),+
            $(,)?
        }
    ) => {
        $( #[$attrs] )*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $v struct $name(pub(crate) $native);

        impl $name {
            $(
                $( #[$variant_attrs] )*
                $v const $variant: Self = Self($value);
            )+

            #[allow(dead_code, unreachable_patterns)]
            fn variant_name(&self) -> Option<&'static str> {
                match self {
                    $(
                        &Self::$variant => Some(stringify!($variant)),
                    )*
                    _ => None,
                }
            }

            #[allow(dead_code)]
            fn from_variant_name(name: &str) -> Option<Self> {
                match name {
                    $(
                        stringify!($variant) => Some(Self::$variant),
                    )*
                    _ => None,
                }
            }
        }
    };
}

/// Implements `Debug` and `FromStr` for an `ffi_enum!` type whose constants share a C prefix.
macro_rules! prefixed_names {
    ($type:ident, $prefix:literal) => {
        impl $type {
            /// Returns the kernel constant name of this value (eg. `EV_ABS` or `ABS_X`), if it has one.
            pub fn name(self) -> Option<$crate::event::VariantName> {
                Some($crate::event::VariantName::new(
                    $prefix,
                    self.variant_name()?,
                ))
            }
        }

        impl ::std::str::FromStr for $type {
            type Err = $crate::event::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.strip_prefix($prefix)
                    .and_then(Self::from_variant_name)
                    .ok_or($crate::event::UnknownVariant { _p: () })
            }
        }

        impl ::std::fmt::Debug for $type {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self.name() {
                    Some(name) => ::std::fmt::Display::fmt(&name, f),
                    None => write!(f, "{}({:#x})", stringify!($type), self.0),
                }
            }
        }
    };
}
