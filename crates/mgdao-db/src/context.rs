//! Cancellation context attached to database and collection handles

use super::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-controlled cancellation signal and optional deadline
///
/// Every operation issued through a handle runs under its context: a
/// cancelled context fails the operation with [`Error::Cancelled`], an
/// expired deadline with [`Error::DeadlineExceeded`].
///
/// # Example
///
/// ```rust
/// use mgdao_db::Context;
/// use std::time::Duration;
///
/// let ctx = Context::background().with_timeout(Duration::from_secs(5));
/// let child = ctx.child();
/// ctx.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
}

impl Context {
	/// A context that is never cancelled and has no deadline
	pub fn background() -> Self {
		Self::default()
	}

	/// Context driven by an existing token
	pub fn with_token(token: CancellationToken) -> Self {
		Self {
			token,
			deadline: None,
		}
	}

	/// Derived context: cancelled with its parent, cancellable on its own
	pub fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
			deadline: self.deadline,
		}
	}

	/// Tighten the deadline to `now + timeout`; a sooner deadline is kept
	pub fn with_timeout(self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(current) if current < deadline => current,
			_ => deadline,
		});
		self
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn token(&self) -> &CancellationToken {
		&self.token
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Run `operation` unless the context is cancelled or expires first
	pub async fn run<T, F>(&self, operation: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		if self.token.is_cancelled() {
			return Err(Error::Cancelled);
		}
		if self.deadline.is_some_and(|d| d <= Instant::now()) {
			return Err(Error::DeadlineExceeded);
		}

		let deadline = self.deadline;
		let expired = async move {
			match deadline {
				Some(at) => tokio::time::sleep_until(at).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.token.cancelled() => Err(Error::Cancelled),
			_ = expired => Err(Error::DeadlineExceeded),
			result = operation => result,
		}
	}
}
