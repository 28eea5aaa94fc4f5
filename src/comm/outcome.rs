//! Request outcomes — what one send to one node came back as.

/// Terminal result of a single request. Exactly one of these exists per
/// target per communication step, whatever went right or wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 2xx from the agent; `payload` is the raw response body.
    Success { payload: String },
    /// The node could not be reached on any of its addresses.
    ConnectError { reason: String },
    /// The per-request or whole-call time limit ran out.
    Timeout,
    /// The node answered with a non-success status.
    RemoteError { status: u16, output: String },
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success { .. })
    }

    /// Connectivity failures are the ones `--skip-offline` tolerates; a node
    /// that answered with an error was very much online.
    pub fn is_connectivity_failure(&self) -> bool {
        matches!(
            self,
            RequestOutcome::ConnectError { .. } | RequestOutcome::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_covers_connect_errors_and_timeouts_only() {
        assert!(RequestOutcome::Timeout.is_connectivity_failure());
        assert!(RequestOutcome::ConnectError {
            reason: "refused".into()
        }
        .is_connectivity_failure());
        assert!(!RequestOutcome::RemoteError {
            status: 500,
            output: String::new()
        }
        .is_connectivity_failure());
        assert!(!RequestOutcome::Success {
            payload: String::new()
        }
        .is_connectivity_failure());
    }
}
