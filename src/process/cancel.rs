use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Creates a connected cancellation pair.
#[must_use]
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = mpsc::channel();
    (
        CancelHandle { tx },
        CancelToken {
            rx,
            cancelled: Cell::new(false),
        },
    )
}

/// Sending side of a cancellation channel; held by the host.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Sender<()>,
}

impl CancelHandle {
    /// Requests cancellation. Has no effect once the run has finished.
    pub fn cancel(&self) {
        let _ = self.tx.send(());
    }
}

/// Receiving side of a cancellation channel; held by the running pipeline.
///
/// Once a cancel message has been observed the token stays cancelled.
/// Dropping every [`CancelHandle`] never cancels.
#[derive(Debug)]
pub struct CancelToken {
    rx: Receiver<()>,
    cancelled: Cell<bool>,
}

impl CancelToken {
    /// A token that can never be cancelled.
    #[must_use]
    pub fn never() -> Self {
        cancel_channel().1
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        if !self.cancelled.get() && self.rx.try_recv().is_ok() {
            self.cancelled.set(true);
        }
        self.cancelled.get()
    }

    /// Blocks for at most `timeout`, returning early if cancellation arrives.
    ///
    /// Returns `true` if the token is cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.cancelled.get() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) => self.cancelled.set(true),
            Err(RecvTimeoutError::Timeout) => {}
            // No handle left: nobody can cancel any more, so just sleep.
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(timeout),
        }
        self.cancelled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_latched() {
        let (handle, token) = cancel_channel();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_waits_out_the_timeout() {
        let token = CancelToken::never();
        assert!(!token.wait(Duration::from_millis(5)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn wait_returns_early_on_cancel() {
        let (handle, token) = cancel_channel();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });
        let started = std::time::Instant::now();
        while !token.wait(Duration::from_millis(10)) {
            assert!(started.elapsed() < Duration::from_secs(5));
        }
        sender.join().ok();
    }
}
