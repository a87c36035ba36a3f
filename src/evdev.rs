use std::{
    error::Error,
    ffi::{c_char, c_int},
    fmt,
    fs::File,
    io::{self, Read as _},
    mem::MaybeUninit,
    os::{
        fd::{AsFd, AsRawFd, IntoRawFd},
        unix::prelude::{BorrowedFd, RawFd},
    },
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use uoctl::Ioctl;

use crate::{
    AbsInfo,
    bits::Word,
    device::Device,
    event::{Abs, EventType},
    identity::{InputId, Version},
    raw::input::{EVIOCGABS, EVIOCGBIT, EVIOCGID, EVIOCGNAME, EVIOCGRAB, EVIOCGVERSION},
    util::wait_readable,
};

/// A handle to an *event device*.
///
/// This is the [`Device`] implementation backing [`Session::open`][crate::Session::open]. It
/// can also be opened directly via [`Evdev::open`] and handed to
/// [`Session::with_device`][crate::Session::with_device].
#[derive(Debug)]
pub struct Evdev {
    file: File,
    path: PathBuf,
}

impl AsFd for Evdev {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for Evdev {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl IntoRawFd for Evdev {
    #[inline]
    fn into_raw_fd(self) -> RawFd {
        self.file.into_raw_fd()
    }
}

impl Evdev {
    /// Opens a filesystem path referring to an `evdev` node.
    ///
    /// The path must belong to an `evdev` device like `/dev/input/event*` (symlinks such as the
    /// ones in `/dev/input/by-id/` are resolved first), not to a legacy *"joydev"* device
    /// (`/dev/input/js*`).
    ///
    /// # Permissions
    ///
    /// This method will attempt to open `path` with read-write permissions, and fall back to
    /// read-only permissions if the current user does not have read and write permissions.
    /// Reading events, querying the device and grabbing it all work on a read-only handle.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        Self::open_impl(path)
    }

    fn open_impl(path: &Path) -> io::Result<Self> {
        let path = path.canonicalize()?;
        if !path
            .as_os_str()
            .as_encoded_bytes()
            .starts_with(b"/dev/input/event")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "evdev device path '{}' must match '/dev/input/event*'",
                    path.display()
                ),
            ));
        }

        let now = Instant::now();
        let file = Self::try_open(&path)?;
        let this = Self { file, path };
        log::debug!("opened '{}' in {:?}", this.path().display(), now.elapsed());
        Ok(this)
    }

    fn try_open(path: &Path) -> io::Result<File> {
        match File::options().read(true).write(true).open(path) {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::debug!(
                    "no permission to open '{}' in read-write mode, retrying in read-only",
                    path.display()
                );
            }
            Err(e) => return Err(e),
        }

        File::options().read(true).open(path)
    }

    /// Returns the (canonicalized) file system path this [`Evdev`] has been created from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executes `ioctl` and adds context to the error.
    unsafe fn ioctl<T>(&self, name: &'static str, ioctl: Ioctl<T>, arg: T) -> io::Result<c_int> {
        match unsafe { ioctl.ioctl(self, arg) } {
            Ok(ok) => Ok(ok),
            Err(e) => {
                #[derive(Debug)]
                struct WrappedError {
                    cause: io::Error,
                    msg: String,
                }

                impl fmt::Display for WrappedError {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str(&self.msg)
                    }
                }
                impl Error for WrappedError {
                    fn source(&self) -> Option<&(dyn Error + 'static)> {
                        Some(&self.cause)
                    }
                }

                let msg = format!(
                    "ioctl {name} failed for device {} ({:?})",
                    self.path().display(),
                    e.kind()
                );
                Err(io::Error::new(e.kind(), WrappedError { cause: e, msg }))
            }
        }
    }

    unsafe fn fetch_string(
        &self,
        ioctl_name: &'static str,
        ioctl: fn(usize) -> Ioctl<*mut c_char>,
    ) -> io::Result<String> {
        // "fetch string" ioctls will return the number of bytes they've copied into our buffer.
        // This will be at most the length of the buffer. If that happens, some bytes might be lost,
        // so we retry the call after doubling the buffer size.

        const INITIAL_LEN: usize = 64;
        let mut buf = vec![0_u8; INITIAL_LEN];
        let len = loop {
            let len = unsafe {
                self.ioctl(
                    ioctl_name,
                    ioctl(buf.len()),
                    buf.as_mut_ptr() as *mut c_char,
                )?
            };
            if len as usize == buf.len() {
                // Not enough space; double the buffer size and retry.
                buf.resize(buf.len() * 2, 0);
            } else {
                break len;
            }
        };

        // `len` includes the trailing 0 byte
        buf.truncate(len.saturating_sub(1) as usize);

        let string =
            String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(string)
    }
}

impl Device for Evdev {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        wait_readable(self.as_raw_fd(), timeout)
    }

    fn input_id(&self) -> io::Result<InputId> {
        let mut out = MaybeUninit::uninit();
        unsafe {
            self.ioctl("EVIOCGID", EVIOCGID, out.as_mut_ptr())?;
            Ok(InputId(out.assume_init()))
        }
    }

    fn name(&self) -> io::Result<String> {
        unsafe { self.fetch_string("EVIOCGNAME", EVIOCGNAME) }
    }

    fn driver_version(&self) -> io::Result<Version> {
        unsafe {
            let mut version = 0;
            self.ioctl("EVIOCGVERSION", EVIOCGVERSION, &mut version)?;
            Ok(Version(version))
        }
    }

    fn event_bits(&self, event_type: EventType, words: &mut [Word]) -> io::Result<()> {
        if event_type.raw() > EventType::MAX.raw() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("event type {event_type:?} exceeds maximum event type"),
            ));
        }

        unsafe {
            self.ioctl(
                "EVIOCGBIT",
                EVIOCGBIT(event_type.raw() as u8, size_of_val(words)),
                words.as_mut_ptr().cast(),
            )?;
        }
        Ok(())
    }

    fn abs_info(&self, axis: Abs) -> io::Result<AbsInfo> {
        if axis.raw() > Abs::MAX.raw() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("absolute axis {axis:?} exceeds maximum axis value"),
            ));
        }

        unsafe {
            let mut out = MaybeUninit::uninit();
            self.ioctl("EVIOCGABS", EVIOCGABS(axis.raw() as u8), out.as_mut_ptr())?;
            Ok(AbsInfo(out.assume_init()))
        }
    }

    fn set_grab(&self, grab: bool) -> io::Result<()> {
        unsafe {
            self.ioctl("EVIOCGRAB", EVIOCGRAB, c_int::from(grab))?;
        }
        Ok(())
    }
}
