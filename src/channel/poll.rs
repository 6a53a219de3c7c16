//! Readiness wait over a small set of descriptors.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Wait until at least one of `fds` is readable or `timeout` elapses.
///
/// Returns one flag per descriptor, in the order given. A hang-up or error
/// condition counts as readable so the next read reports it. `EINTR` is
/// surfaced as [`io::ErrorKind::Interrupted`]; callers re-check their
/// shutdown flag and wait again.
pub fn wait_readable(fds: &[RawFd], timeout: Duration) -> io::Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd { fd, events: libc::POLLIN, revents: 0 })
        .collect();
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    // SAFETY: `pollfds` is a live, correctly sized array of `pollfd` for the
    // whole call and the kernel only writes `revents`.
    let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(pollfds
        .iter()
        .map(|p| p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn times_out_when_idle() {
        let (a, _b) = UnixStream::pair().unwrap();
        let ready = wait_readable(&[a.as_raw_fd()], Duration::from_millis(10)).unwrap();
        assert_eq!(ready, vec![false]);
    }

    #[test]
    fn reports_only_the_ready_descriptor() {
        let (a, mut b) = UnixStream::pair().unwrap();
        let (c, _d) = UnixStream::pair().unwrap();
        b.write_all(b"x").unwrap();
        let ready =
            wait_readable(&[c.as_raw_fd(), a.as_raw_fd()], Duration::from_secs(1)).unwrap();
        assert_eq!(ready, vec![false, true]);
    }

    #[test]
    fn hang_up_counts_as_readable() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(b);
        let ready = wait_readable(&[a.as_raw_fd()], Duration::from_secs(1)).unwrap();
        assert_eq!(ready, vec![true]);
    }
}
