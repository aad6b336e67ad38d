//! Per-call options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::handle::CallHandle;
use crate::ports::{CompletionContext, Encryptor, ProgressCallback};

/// Options of a single `post`.
#[derive(Clone, Default)]
pub struct PostOptions {
    /// Extra headers. They override the default headers.
    pub headers: Vec<(String, String)>,
    pub encryptor: Option<Arc<dyn Encryptor>>,
    /// Overrides the configured timeout.
    pub timeout: Option<Duration>,
    pub progress: Option<ProgressCallback>,
    /// Where the completion runs; the service default applies when `None`.
    pub completion_context: Option<Arc<dyn CompletionContext>>,
    /// Calls that must be done before this one starts.
    pub dependencies: Vec<CallHandle>,
}

impl PostOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn encrypted_with(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn on_progress(mut self, progress: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    #[must_use]
    pub fn complete_on(mut self, context: Arc<dyn CompletionContext>) -> Self {
        self.completion_context = Some(context);
        self
    }

    #[must_use]
    pub fn after(mut self, dependency: &CallHandle) -> Self {
        self.dependencies.push(dependency.clone());
        self
    }
}

impl fmt::Debug for PostOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostOptions")
            .field("headers", &self.headers)
            .field("encryptor", &self.encryptor)
            .field("timeout", &self.timeout)
            .field("progress", &self.progress.is_some())
            .field("completion_context", &self.completion_context.is_some())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
