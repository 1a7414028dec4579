use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CapabilityError;

/// Cancellation and deadline scope passed unchanged into every Sign/Verify call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context that is cancelled through `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails fast if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), CapabilityError> {
        if self.token.is_cancelled() {
            return Err(CapabilityError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CapabilityError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `fut` until it completes, the token is cancelled, or the deadline passes.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CapabilityError::Cancelled),
            _ = deadline => Err(CapabilityError::DeadlineExceeded),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_completes_when_not_cancelled() {
        let ctx = Context::new();
        let out = ctx.run(async { Ok::<_, CapabilityError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn cancelled_context_aborts_pending_call() {
        let ctx = Context::new();
        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let res = ctx
            .run(std::future::pending::<Result<(), CapabilityError>>())
            .await;
        assert!(matches!(res, Err(CapabilityError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_aborts_pending_call() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let res = ctx
            .run(std::future::pending::<Result<(), CapabilityError>>())
            .await;
        assert!(matches!(res, Err(CapabilityError::DeadlineExceeded)));
    }
}
