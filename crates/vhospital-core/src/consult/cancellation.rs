//! Stopping a consultation request
//!
//! Each question (first try or manual retry) runs under its own token. Starting
//! the next one cancels whatever was still streaming, so a stale stream can never
//! publish into the new session.

use tokio_util::sync::CancellationToken;

/// Handle shared by the request and the Ctrl-C watcher
#[derive(Clone, Default)]
pub struct ConsultCancellation {
    current: CancellationToken,
}

impl ConsultCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, cancelling the previous one, and return its token
    pub fn begin(&mut self) -> CancellationToken {
        self.current.cancel();
        self.current = CancellationToken::new();
        self.current.child_token()
    }

    /// Stop the request started by the last `begin`
    pub fn cancel(&self) {
        self.current.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_running_request() {
        let mut cancellation = ConsultCancellation::new();
        let request = cancellation.begin();
        let watcher = cancellation.clone();

        watcher.cancel();
        assert!(request.is_cancelled());
        assert!(!cancellation.begin().is_cancelled());
    }

    #[test]
    fn test_retry_discards_previous_request() {
        let mut cancellation = ConsultCancellation::new();
        let first = cancellation.begin();
        let retry = cancellation.begin();

        assert!(first.is_cancelled());
        assert!(!retry.is_cancelled());
    }
}
