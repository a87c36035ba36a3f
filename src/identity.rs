//! Device identification: bus, vendor/product IDs, name and driver version.

use std::{
    ffi::c_int,
    fmt::{self, LowerHex},
};

use crate::{
    Error,
    device::Device,
    error::Chain,
    raw::input::input_id,
};

/// Name reported for devices whose name can't be queried.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Input device ID.
///
/// `uinput` devices, devices exported by ALSA, and other devices often leave this structure empty
/// (all-zeroes).
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct InputId(pub(crate) input_id);

impl InputId {
    /// Creates an [`InputId`] from its components.
    #[inline]
    pub const fn new(bus: Bus, vendor: u16, product: u16, version: u16) -> Self {
        Self(input_id {
            bustype: bus.0,
            vendor,
            product,
            version,
        })
    }

    /// An all-zero ID, used when the device doesn't report one.
    pub const ZERO: Self = Self::new(Bus(0), 0, 0, 0);

    /// Returns the bus type this device is attached to the system with.
    #[inline]
    pub fn bus(&self) -> Bus {
        Bus(self.0.bustype)
    }

    /// Returns the vendor ID.
    #[inline]
    pub fn vendor(&self) -> u16 {
        self.0.vendor
    }

    /// Returns the product ID.
    #[inline]
    pub fn product(&self) -> u16 {
        self.0.product
    }

    /// The device or transport version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.0.version
    }
}

impl Default for InputId {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Hex<T: LowerHex>(T);
        impl<T: LowerHex> fmt::Debug for Hex<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#06x}", self.0)
            }
        }

        f.debug_struct("InputId")
            .field("bustype", &self.bus())
            .field("vendor", &Hex(self.vendor()))
            .field("product", &Hex(self.product()))
            .field("version", &Hex(self.version()))
            .finish()
    }
}

ffi_enum! {
    /// Bus types that devices can be attached to the system with.
    pub enum Bus: u16 {
        PCI         = 0x01,
        ISAPNP      = 0x02,
        USB         = 0x03,
        HIL         = 0x04,
        BLUETOOTH   = 0x05,
        VIRTUAL     = 0x06,
        ISA         = 0x10,
        I8042       = 0x11,
        XTKBD       = 0x12,
        RS232       = 0x13,
        GAMEPORT    = 0x14,
        PARPORT     = 0x15,
        AMIGA       = 0x16,
        ADB         = 0x17,
        I2C         = 0x18,
        HOST        = 0x19,
        GSC         = 0x1A,
        ATARI       = 0x1B,
        SPI         = 0x1C,
        RMI         = 0x1D,
        CEC         = 0x1E,
        INTEL_ISHTP = 0x1F,
        AMD_SFH     = 0x20,
    }
}

impl Bus {
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}
prefixed_names!(Bus, "BUS_");

/// An `evdev` subsystem version.
///
/// This is the version of the `evdev` input system core, not the version of a device-specific
/// driver.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Version(pub(crate) c_int);

impl Version {
    #[inline]
    pub const fn raw(self) -> c_int {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in self.0.to_be_bytes().into_iter().skip_while(|b| *b == 0) {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "{part}")?;
        }
        if first {
            f.write_str("0")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Version")
            .field(&format!("{:#x}", self.0))
            .finish()
    }
}

/// Everything a device says about itself, fetched once when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: InputId,
    name: String,
    driver_version: Version,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            id: InputId::ZERO,
            name: UNKNOWN_DEVICE_NAME.to_string(),
            driver_version: Version(0),
        }
    }
}

impl DeviceIdentity {
    /// Queries the identity of `device`.
    ///
    /// Failures are not fatal: many devices under-report, so each part that can't be queried is
    /// logged and replaced with its default (all-zero IDs, [`UNKNOWN_DEVICE_NAME`], version 0).
    pub(crate) fn query(device: &dyn Device) -> Self {
        let mut this = Self::default();

        match device.input_id() {
            Ok(id) => this.id = id,
            Err(source) => log::warn!(
                "{}",
                Chain(&Error::IdentityQueryFailed { what: "ID", source })
            ),
        }
        match device.name() {
            Ok(name) => this.name = name,
            Err(source) => log::warn!(
                "{}",
                Chain(&Error::IdentityQueryFailed {
                    what: "name",
                    source
                })
            ),
        }
        match device.driver_version() {
            Ok(version) => this.driver_version = version,
            Err(e) => log::debug!("failed to query driver version: {e}"),
        }

        this
    }

    #[inline]
    pub fn input_id(&self) -> InputId {
        self.id
    }

    #[inline]
    pub fn bus(&self) -> Bus {
        self.id.bus()
    }

    #[inline]
    pub fn vendor(&self) -> u16 {
        self.id.vendor()
    }

    #[inline]
    pub fn product(&self) -> u16 {
        self.id.product()
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.id.version()
    }

    /// The human-readable device name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version of the kernel's `evdev` protocol.
    #[inline]
    pub fn driver_version(&self) -> Version {
        self.driver_version
    }
}
