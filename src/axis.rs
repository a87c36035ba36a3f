//! Absolute axis parameters.

use std::{
    fmt, io, mem,
    sync::{Mutex, PoisonError, Weak},
};

use crate::{device::Device, event::Abs, raw::input::input_absinfo};

/// Information about an absolute axis ([`Abs`]).
///
/// Contains the axis' current value, as well as range and resolution information.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct AbsInfo(pub(crate) input_absinfo);

impl AbsInfo {
    /// Creates a new [`AbsInfo`] with a minimum and maximum value.
    ///
    /// All other fields start out as zero.
    #[inline]
    pub const fn new(minimum: i32, maximum: i32) -> Self {
        Self(input_absinfo {
            minimum,
            maximum,
            ..unsafe { mem::zeroed() }
        })
    }

    /// Returns a copy of `self` with the given axis value.
    #[inline]
    pub const fn with_raw_value(mut self, value: i32) -> Self {
        self.0.value = value;
        self
    }

    /// Returns a copy of `self` with the given fuzz value.
    #[inline]
    pub const fn with_fuzz(mut self, fuzz: i32) -> Self {
        self.0.fuzz = fuzz;
        self
    }

    /// Returns a copy of `self` with the given flat value.
    #[inline]
    pub const fn with_flat(mut self, flat: i32) -> Self {
        self.0.flat = flat;
        self
    }

    /// Returns a copy of `self` with the given axis resolution.
    #[inline]
    pub const fn with_resolution(mut self, resolution: i32) -> Self {
        self.0.resolution = resolution;
        self
    }

    /// Returns the axis' current value, clamped to the valid range.
    #[inline]
    pub fn value(&self) -> i32 {
        let [min, max] = [self.minimum(), self.maximum()];
        let [min, max] = if min <= max { [min, max] } else { [max, min] };
        self.raw_value().clamp(min, max)
    }

    /// Returns the raw value of the axis, without clamping.
    #[inline]
    pub const fn raw_value(&self) -> i32 {
        self.0.value
    }

    #[inline]
    pub const fn minimum(&self) -> i32 {
        self.0.minimum
    }

    #[inline]
    pub const fn maximum(&self) -> i32 {
        self.0.maximum
    }

    /// Returns the *fuzz* value of the axis.
    ///
    /// The kernel drops changes smaller than the fuzz value to filter out noise.
    #[inline]
    pub const fn fuzz(&self) -> i32 {
        self.0.fuzz
    }

    /// Returns the *flat* value of the axis (the size of its deadzone).
    #[inline]
    pub const fn flat(&self) -> i32 {
        self.0.flat
    }

    /// Returns the resolution of this axis, in units per millimeter (or per radian for
    /// rotational axes).
    ///
    /// **Note**: This value is commonly reported incorrectly.
    #[inline]
    pub const fn resolution(&self) -> i32 {
        self.0.resolution
    }
}

impl fmt::Debug for AbsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbsInfo")
            .field("value", &self.raw_value())
            .field("minimum", &self.minimum())
            .field("maximum", &self.maximum())
            .field("fuzz", &self.fuzz())
            .field("flat", &self.flat())
            .field("resolution", &self.resolution())
            .finish()
    }
}

/// The parameters of one absolute axis of a [`Session`]'s device.
///
/// Obtained from [`Session::axis_parameters`], which hands out the same instance for the same
/// axis for as long as the session exists.
///
/// [`Session`]: crate::Session
/// [`Session::axis_parameters`]: crate::Session::axis_parameters
pub struct AxisParameters {
    axis: Abs,
    device: Weak<dyn Device>,
    info: Mutex<Option<AbsInfo>>,
}

impl AxisParameters {
    /// Creates the parameter object and fetches the axis information once.
    ///
    /// A failed fetch is logged and leaves [`AxisParameters::info`] empty until the next
    /// successful [`AxisParameters::refresh`].
    pub(crate) fn new(axis: Abs, device: Weak<dyn Device>) -> Self {
        let this = Self {
            axis,
            device,
            info: Mutex::new(None),
        };
        if let Err(e) = this.refresh() {
            log::warn!("failed to fetch parameters of axis {axis:?}: {e}");
        }
        this
    }

    /// Returns the axis these parameters belong to.
    #[inline]
    pub fn axis(&self) -> Abs {
        self.axis
    }

    /// Returns the most recently fetched [`AbsInfo`], if any fetch succeeded so far.
    pub fn info(&self) -> Option<AbsInfo> {
        *self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the current [`AbsInfo`] from the device.
    ///
    /// # Errors
    ///
    /// Fails with [`io::ErrorKind::NotConnected`] once the session has been closed, or with the
    /// error of the underlying `EVIOCGABS` query.
    pub fn refresh(&self) -> io::Result<AbsInfo> {
        let Some(device) = self.device.upgrade() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "device session has been closed",
            ));
        };
        let info = device.abs_info(self.axis)?;
        *self.info.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);
        Ok(info)
    }
}

impl fmt::Debug for AxisParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisParameters")
            .field("axis", &self.axis)
            .field("info", &self.info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::test::TestDevice;

    use super::*;

    #[test]
    fn clamped_value() {
        let info = AbsInfo::new(-100, 100).with_raw_value(250);
        assert_eq!(info.raw_value(), 250);
        assert_eq!(info.value(), 100);

        // Inverted ranges are clamped too.
        let info = AbsInfo::new(100, -100).with_raw_value(-250);
        assert_eq!(info.value(), -100);
    }

    #[test]
    fn refresh() {
        let dev: Arc<dyn Device> = Arc::new(
            TestDevice::builder()
                .abs(Abs::X, AbsInfo::new(0, 255).with_flat(15).with_raw_value(128))
                .build(),
        );
        let params = AxisParameters::new(Abs::X, Arc::downgrade(&dev));
        let info = params.info().unwrap();
        assert_eq!(info.maximum(), 255);
        assert_eq!(info.flat(), 15);
        assert_eq!(info.value(), 128);

        // Unknown axes fail to fetch, but still get a parameter object.
        let params = AxisParameters::new(Abs::RUDDER, Arc::downgrade(&dev));
        assert_eq!(params.info(), None);
        assert!(params.refresh().is_err());

        let params = AxisParameters::new(Abs::X, Arc::downgrade(&dev));
        drop(dev);
        assert_eq!(
            params.refresh().unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert!(params.info().is_some(), "keeps the last fetched info");
    }
}
