//! Readiness waiting for the capture task.
//!
//! The device descriptor is registered with the tokio reactor; the capture
//! task then races "data is readable" against its cancellation token. A
//! fired token wins without claiming readiness, so shutdown never has to
//! wait for the next frame to arrive.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use tokio::io::unix::{AsyncFd, AsyncFdReadyGuard};
use tokio::io::Interest;
use tokio_util::sync::CancellationToken;

/// Borrowed view of the device descriptor for reactor registration.
///
/// Deliberately does not implement `Drop`: the descriptor stays owned by the
/// device handle and is only deregistered when the `AsyncFd` goes away.
pub(crate) struct DeviceFd(RawFd);

impl AsRawFd for DeviceFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Registers the descriptor for read readiness with the current runtime.
pub(crate) fn register(fd: RawFd) -> io::Result<AsyncFd<DeviceFd>> {
    AsyncFd::with_interest(DeviceFd(fd), Interest::READABLE)
}

pub(crate) enum Readable<'a> {
    /// The driver has a buffer ready (or readiness is still cached from an
    /// earlier wakeup; dequeueing decides).
    Ready(AsyncFdReadyGuard<'a, DeviceFd>),
    /// The cancel token fired first.
    Cancelled,
}

/// Waits until the device becomes readable or the token is cancelled,
/// whichever happens first.
///
/// Cancellation takes priority: when the token has fired, the wait resolves
/// [`Readable::Cancelled`] even if data is already pending, so a task being
/// stopped never claims readiness against memory that is about to be
/// unmapped.
pub(crate) async fn wait_for_read<'a>(
    fd: &'a AsyncFd<DeviceFd>,
    cancel: &CancellationToken,
) -> io::Result<Readable<'a>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Ok(Readable::Cancelled),
        guard = fd.readable() => guard.map(Readable::Ready),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// A non-blocking pipe stands in for the device node; writing to `tx`
    /// makes `rx` readable.
    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(ret, 0);
        (fds[0], fds[1])
    }

    fn make_readable(tx: RawFd) {
        let ret = unsafe { libc::write(tx, b"x".as_ptr().cast(), 1) };
        assert_eq!(ret, 1);
    }

    fn close(fd: RawFd) {
        unsafe { libc::close(fd) };
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_readiness() {
        let (rx, tx) = pipe();
        make_readable(tx);

        let afd = register(rx).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Both sides are ready; the fired token must win so the caller
        // never touches buffers once shutdown has begun.
        match wait_for_read(&afd, &cancel).await {
            Ok(Readable::Cancelled) => {}
            Ok(Readable::Ready(_)) => panic!("readiness claimed despite a cancelled token"),
            Err(err) => panic!("wait failed: {err}"),
        }

        drop(afd);
        close(rx);
        close(tx);
    }

    #[tokio::test]
    async fn readiness_resolves_without_cancellation() {
        let (rx, tx) = pipe();
        make_readable(tx);

        let afd = register(rx).unwrap();
        let cancel = CancellationToken::new();

        match wait_for_read(&afd, &cancel).await {
            Ok(Readable::Ready(_)) => {}
            Ok(Readable::Cancelled) => panic!("wait cancelled without a fired token"),
            Err(err) => panic!("wait failed: {err}"),
        }

        drop(afd);
        close(rx);
        close(tx);
    }

    #[tokio::test]
    async fn cancel_releases_a_wait_with_no_data_in_sight() {
        let (rx, tx) = pipe();

        let afd = register(rx).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        // Nothing is ever written; only the token can end this wait.
        match wait_for_read(&afd, &cancel).await {
            Ok(Readable::Cancelled) => {}
            Ok(Readable::Ready(_)) => panic!("spurious readiness on a silent pipe"),
            Err(err) => panic!("wait failed: {err}"),
        }

        drop(afd);
        close(rx);
        close(tx);
    }
}
