use std::{
    ffi::c_int,
    io,
    os::fd::{AsRawFd, RawFd},
    time::Duration,
};

/// Uses `poll(2)` to wait at most `timeout` until reading from `fd` is possible without
/// blocking.
///
/// Returns whether `fd` is readable. Hangups and errors count as readable, so that the following
/// `read(2)` reports them.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let timeout_ms = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
    let mut poll = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut poll, 1, timeout_ms) };
    if ret == -1 {
        let e = io::Error::last_os_error();
        if e.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(e);
    }

    Ok(poll.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0)
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write, os::unix::net::UnixStream};

    use super::*;

    #[test]
    fn timeout_and_ready() -> io::Result<()> {
        let (mut a, b) = UnixStream::pair()?;
        assert!(!wait_readable(b.as_raw_fd(), Duration::from_millis(10))?);

        a.write_all(&[1])?;
        assert!(wait_readable(b.as_raw_fd(), Duration::from_secs(5))?);

        // Regular files are always readable.
        let file = File::open("/dev/null")?;
        assert!(wait_readable(file.as_raw_fd(), Duration::ZERO)?);
        Ok(())
    }
}
