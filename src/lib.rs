#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;


mod axis;
pub mod bits;
mod capabilities;
mod device;
mod drop;
pub mod enumerate;
mod error;
mod evdev;
pub mod event;
mod identity;
mod joystick;
mod listeners;
mod raw;
pub mod record;
mod session;
mod util;

pub use axis::{AbsInfo, AxisParameters};
pub use capabilities::Capabilities;
pub use device::Device;
#[doc(inline)]
pub use enumerate::enumerate;
pub use error::Error;
pub use evdev::Evdev;
pub use event::UnknownVariant;
pub use identity::{Bus, DeviceIdentity, InputId, UNKNOWN_DEVICE_NAME, Version};
pub use joystick::{ChangeMask, JoystickFilter, JoystickListener, JoystickState};
pub use record::{EventRecord, Layout};
pub use session::{DEFAULT_POLL_INTERVAL, EventListener, Session, SessionBuilder, SessionState};
