use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::progress::BatchProgress;

/// `Accept` value sent with every request unless overridden.
pub const DEFAULT_ACCEPT: &str = "application/json";

pub const DEFAULT_USER_AGENT: &str = concat!("dexsync/", env!("CARGO_PKG_VERSION"));

/// Callback invoked with a progress snapshot after each scheduling tick.
pub type ProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Configuration for the fetch engine.
///
/// # Examples
///
/// ```
/// use dexsync_fetch::EngineOptions;
/// use std::time::Duration;
///
/// let options = EngineOptions::default()
///     .window(8)
///     .transfer_timeout(Duration::from_secs(10))
///     .accept("image/*");
/// assert_eq!(options.window, 8);
/// ```
#[derive(Clone)]
pub struct EngineOptions {
    /// Maximum number of transfers open at the same time.
    ///
    /// This is a hard ceiling enforced by the scheduler, independent of how
    /// the transport pools or multiplexes connections. Never below 1.
    ///
    /// Default: 50
    pub window: usize,

    /// Deadline for one transfer, from request start to the last body byte.
    ///
    /// Default: 30s
    pub transfer_timeout: Duration,

    /// Upper bound of a single wait for transfer progress.
    ///
    /// The scheduler never blocks longer than this before it re-checks the
    /// window and reports progress.
    ///
    /// Default: 100ms
    pub poll_interval: Duration,

    /// `Accept` header value.
    ///
    /// Default: `application/json`
    pub accept: String,

    /// `User-Agent` used by transports built from these options.
    pub user_agent: String,

    /// Send stored validators even when the destination file is missing.
    ///
    /// When `false`, a request whose destination does not exist is sent
    /// without conditional headers so the file is recreated. When `true`, a
    /// `304` answer leaves no file behind.
    ///
    /// Default: false
    pub revalidate_missing: bool,

    /// Progress callback.
    ///
    /// Default: None
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("window", &self.window)
            .field("transfer_timeout", &self.transfer_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("accept", &self.accept)
            .field("user_agent", &self.user_agent)
            .field("revalidate_missing", &self.revalidate_missing)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            window: 50,
            transfer_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            accept: DEFAULT_ACCEPT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            revalidate_missing: false,
            on_progress: None,
        }
    }
}

impl EngineOptions {
    /// Set the concurrency window. Values below 1 are raised to 1.
    pub fn window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn revalidate_missing(mut self, revalidate: bool) -> Self {
        self.revalidate_missing = revalidate;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub(crate) fn effective_window(&self) -> usize { self.window.max(1) }
}
