use eyre::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Why the process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM from the orchestrator
    Terminate,
    /// Programmatic trigger (tests, fatal errors)
    Requested,
}

/// Coordinates process shutdown. In-flight requests are left to drain; any
/// breaker or limiter state updates from their late completions still apply
/// because that state is process-wide, not per-request.
pub struct GracefulShutdown {
    token: CancellationToken,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token handed to tasks that should stop when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Programmatic shutdown trigger.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for SIGINT/SIGTERM (or a programmatic trigger) and return why.
    pub async fn wait_for_shutdown_signal(&self) -> Result<ShutdownReason> {
        #[cfg(unix)]
        {
            let mut sigterm =
                signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                _ = signal::ctrl_c() => {
                    tracing::info!("SIGINT received, shutting down");
                    self.token.cancel();
                    Ok(ShutdownReason::Interrupt)
                }
                _ = sigterm.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    self.token.cancel();
                    Ok(ShutdownReason::Terminate)
                }
                _ = self.token.cancelled() => Ok(ShutdownReason::Requested),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received, shutting down");
                    self.token.cancel();
                    Ok(ShutdownReason::Interrupt)
                }
                _ = self.token.cancelled() => Ok(ShutdownReason::Requested),
            }
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_trigger_resolves_wait() {
        let shutdown = GracefulShutdown::new();
        let token = shutdown.shutdown_token();
        shutdown.trigger();
        assert!(token.is_cancelled());
        let reason = shutdown.wait_for_shutdown_signal().await.unwrap();
        assert_eq!(reason, ShutdownReason::Requested);
    }
}
