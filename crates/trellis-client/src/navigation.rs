//! Navigation capability for unauthorized handling
//!
//! The default unauthorized behavior redirects to a fixed route. Rather than
//! reaching into ambient host state, the pipeline takes an explicit
//! [`Navigator`] injected at client construction, keeping it host-independent
//! and unit-testable.

/// Route navigated to when an unauthorized response is observed and no
/// callback is configured. A `reason` query parameter is appended.
pub const UNAUTHORIZED_ROUTE: &str = "/unauthorized";

/// Host navigation capability.
pub trait Navigator: Send + Sync {
    /// Redirect the current navigation to `location`.
    fn navigate(&self, location: &str);
}

/// Default navigator: records the requested redirect in the log stream.
///
/// Hosts embed a real capability through `ClientBuilder::with_navigator`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, location: &str) {
        tracing::warn!(location, "navigation requested but no navigator is configured");
    }
}
