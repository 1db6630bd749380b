// std
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process counters for login-flow events.
#[derive(Debug, Default)]
pub struct FlowMetrics {
	logins_started: AtomicU64,
	exchanges_attempted: AtomicU64,
	callbacks_accepted: AtomicU64,
	callbacks_rejected: AtomicU64,
	credentials_expired: AtomicU64,
}
impl FlowMetrics {
	/// Authorization URLs handed out.
	pub fn logins_started(&self) -> u64 {
		self.logins_started.load(Ordering::Relaxed)
	}

	/// Authorization codes sent to the token endpoint.
	pub fn exchanges_attempted(&self) -> u64 {
		self.exchanges_attempted.load(Ordering::Relaxed)
	}

	/// Callbacks that ended with a stored token.
	pub fn callbacks_accepted(&self) -> u64 {
		self.callbacks_accepted.load(Ordering::Relaxed)
	}

	/// Callbacks that failed for any reason.
	pub fn callbacks_rejected(&self) -> u64 {
		self.callbacks_rejected.load(Ordering::Relaxed)
	}

	/// Tokens dropped because they expired or a resource server rejected them.
	pub fn credentials_expired(&self) -> u64 {
		self.credentials_expired.load(Ordering::Relaxed)
	}

	pub(crate) fn record_login_started(&self) {
		self.logins_started.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange_attempt(&self) {
		self.exchanges_attempted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_callback_accepted(&self) {
		self.callbacks_accepted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_callback_rejected(&self) {
		self.callbacks_rejected.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_credential_expired(&self) {
		self.credentials_expired.fetch_add(1, Ordering::Relaxed);
	}
}
