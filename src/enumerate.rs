//! Device enumeration.
//!
//! Enumeration only lists the event device nodes, it doesn't open them. Opening a device often
//! needs permissions the current user doesn't have, so callers decide which devices to open (with
//! [`Session::open`][crate::Session::open]) and how to handle failures.

use std::{
    fs::{self, ReadDir},
    io,
    os::unix::fs::FileTypeExt as _,
    path::{Path, PathBuf},
};

const INPUT_DIR: &str = "/dev/input";

/// Enumerates the paths of all currently plugged-in event devices (`/dev/input/event*`).
///
/// The paths are yielded in directory order, which is unspecified.
///
/// # Examples
///
/// ```no_run
/// use evjoy::{Session, enumerate};
///
/// for res in enumerate()? {
///     let path = res?;
///     match Session::open(&path) {
///         Ok(session) => println!("{} – {}", path.display(), session.identity().name()),
///         Err(e) => eprintln!("{}: {e}", path.display()),
///     }
/// }
/// # Ok::<_, std::io::Error>(())
/// ```
pub fn enumerate() -> io::Result<Enumerate> {
    enumerate_in(Path::new(INPUT_DIR))
}

fn enumerate_in(dir: &Path) -> io::Result<Enumerate> {
    Ok(Enumerate {
        read_dir: fs::read_dir(dir)?,
    })
}

/// Iterator over event device paths.
///
/// Returned by [`enumerate`].
#[derive(Debug)]
pub struct Enumerate {
    read_dir: ReadDir,
}

impl Enumerate {
    /// Collects the remaining paths, sorted by device number (`event2` before `event10`).
    pub fn sorted(self) -> io::Result<Vec<PathBuf>> {
        let mut paths = self.collect::<io::Result<Vec<_>>>()?;
        paths.sort_by_key(|path| (event_number(path), path.clone()));
        Ok(paths)
    }
}

impl Iterator for Enumerate {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.read_dir.next()? {
                Ok(ent) => ent,
                Err(e) => return Some(Err(e)),
            };

            // Valid evdev devices are named `eventN`. `/dev/input` also contains some other
            // devices like `/dev/input/js0` or `/dev/input/mice` that we have to skip.
            if !entry.file_name().as_encoded_bytes().starts_with(b"event") {
                continue;
            }

            let path = entry.path();
            let ty = match entry.file_type() {
                Ok(ty) => ty,
                Err(e) => {
                    return Some(Err(io::Error::new(
                        e.kind(),
                        format!("failed to access '{}': {}", path.display(), e),
                    )));
                }
            };
            if !ty.is_char_device() {
                log::debug!("skipping '{}': not a character device", path.display());
                continue;
            }

            return Some(Ok(path));
        }
    }
}

fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}
