//! Interception of authentication and authorization failures.
//!
//! A 401 or 403 means the session is gone or never existed. The dispatcher
//! stops there instead of parsing the body and lets an injected
//! `UnauthorizedHook` react (drop local session state, send the user to a
//! login view). What that reaction is belongs to the application.

use std::sync::Arc;

/// Capability invoked every time a response is intercepted.
pub trait UnauthorizedHook: Send + Sync {
    fn on_unauthorized(&self);
}

/// Hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl UnauthorizedHook for NoopHook {
    fn on_unauthorized(&self) {}
}

impl<F> UnauthorizedHook for F
where
    F: Fn() + Send + Sync,
{
    fn on_unauthorized(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Normal,
    Intercepted,
}

impl AuthState {
    pub fn for_status(status: u16) -> Self {
        match status {
            401 | 403 => AuthState::Intercepted,
            _ => AuthState::Normal,
        }
    }
}

#[derive(Clone)]
pub struct AuthInterceptor {
    hook: Arc<dyn UnauthorizedHook>,
}

impl AuthInterceptor {
    pub fn new(hook: Arc<dyn UnauthorizedHook>) -> Self {
        Self { hook }
    }

    /// Classify `status`, firing the hook on interception.
    pub fn inspect(&self, status: u16) -> AuthState {
        let state = AuthState::for_status(status);
        if state == AuthState::Intercepted {
            tracing::info!(status, "request intercepted as unauthorized");
            self.hook.on_unauthorized();
        }
        state
    }
}

impl Default for AuthInterceptor {
    fn default() -> Self {
        Self::new(Arc::new(NoopHook))
    }
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor").finish_non_exhaustive()
    }
}
