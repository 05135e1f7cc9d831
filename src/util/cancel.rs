//! Request cancellation signal, in the manner the teacher's API layer wires
//! client-disconnect detection through to long-running streaming operations.
//!
//! Spec §5 ("Cancellation"): every request carries a cancellation signal; the
//! GET path's decryption worker observes it to terminate deterministically
//! instead of leaking a background task when the reader is abandoned.

use tokio::sync::watch;

/// Producer-side handle: call [`cancel`](CancellationSource::cancel) when the
/// owning request is aborted (client disconnect, timeout, ...).
#[derive(Clone)]
pub struct CancellationSource(watch::Sender<bool>);

/// Consumer-side handle, cheaply cloneable, passed down into streaming
/// adapters (e.g. `maxiofs_crypt`'s decrypt pipe).
#[derive(Clone)]
pub struct CancellationToken(watch::Receiver<bool>);

impl CancellationSource {
	pub fn new() -> (CancellationSource, CancellationToken) {
		let (tx, rx) = watch::channel(false);
		(CancellationSource(tx), CancellationToken(rx))
	}

	pub fn cancel(&self) {
		let _ = self.0.send(true);
	}
}

impl Default for CancellationSource {
	fn default() -> Self {
		CancellationSource::new().0
	}
}

impl CancellationToken {
	/// A token that never cancels, for callers (tests, offline tools) that
	/// have no real request lifecycle to bind to.
	pub fn never() -> CancellationToken {
		CancellationSource::new().1
	}

	pub fn is_cancelled(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once the source has called `cancel()`. Safe to call from
	/// multiple clones concurrently.
	pub async fn cancelled(&mut self) {
		let _ = self.0.wait_for(|v| *v).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn cancel_is_observed_by_clones() {
		let (source, token) = CancellationSource::new();
		let mut a = token.clone();
		let mut b = token.clone();
		assert!(!a.is_cancelled());
		source.cancel();
		a.cancelled().await;
		b.cancelled().await;
		assert!(a.is_cancelled());
		assert!(b.is_cancelled());
	}

	#[test]
	fn never_is_never_cancelled() {
		let token = CancellationToken::never();
		assert!(!token.is_cancelled());
	}
}
