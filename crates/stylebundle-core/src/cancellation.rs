/*
 * cancellation.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Build cancellation token.
 */

//! Cancellation for builds.
//!
//! [`Cancellation`] wraps `tokio_util::sync::CancellationToken`. The build
//! driver races its discovery loop against [`Cancellation::cancelled`] and
//! aborts every in-flight worker once the token fires.

/// A cloneable cancellation token; clones share state.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: tokio_util::sync::CancellationToken,
}

impl Cancellation {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Request cancellation.
    ///
    /// After this is called, `is_cancelled()` will return `true`.
    pub fn cancel(&self) {
        self.inner.cancel()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// A token that is cancelled with this one but can also be cancelled
    /// on its own.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }
}

impl From<tokio_util::sync::CancellationToken> for Cancellation {
    fn from(token: tokio_util::sync::CancellationToken) -> Self {
        Self { inner: token }
    }
}
