//! Shared execution context
//!
//! A context owns the engine resources (worker threads, buffers) that peers
//! attach to. It is cheap to clone; every clone refers to the same context.
//! Peers keep a clone for their whole lifetime, so the engine handle is only
//! released once the last peer is gone and every user clone has dropped, or
//! earlier by an explicit [`Context::close`].

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{ContextConfig, MediaEncoding, PeerConfig};
use crate::engine::{check, ContextHandle, Engine, EngineCode, LoopbackEngine, PeerHandle};
use crate::error::{Error, Result};

/// Handle to an open execution context
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    engine: Arc<dyn Engine>,
    /// `None` once closed
    handle: RwLock<Option<ContextHandle>>,
    attached: AtomicUsize,
}

impl Context {
    /// Open a context on the built-in loopback engine
    pub fn open(config: &ContextConfig) -> Result<Self> {
        Self::with_engine(Arc::new(LoopbackEngine::new()), config)
    }

    /// Open a context on the given engine
    pub fn with_engine(engine: Arc<dyn Engine>, config: &ContextConfig) -> Result<Self> {
        tracing::debug!(?config, "opening context");

        let handle = check("context_open", engine.context_open(config)).map_err(|e| match e {
            Error::Engine { code, .. } => {
                Error::InvalidConfig(format!("engine rejected context config with code {code}"))
            }
            other => other,
        })?;

        tracing::debug!(handle = handle.raw(), "context opened");
        Ok(Self {
            inner: Arc::new(ContextInner {
                engine,
                handle: RwLock::new(Some(handle)),
                attached: AtomicUsize::new(0),
            }),
        })
    }

    /// Register a custom encoding under `id`, for use as
    /// `PacketEncoding::Registered(id)` by senders of this context
    pub fn register_encoding(&self, id: i32, encoding: &MediaEncoding) -> Result<()> {
        let guard = self.inner.handle.read();
        let handle = guard.ok_or(Error::ContextClosed)?;

        tracing::debug!(id, ?encoding, "registering encoding");
        check(
            "context_register_encoding",
            self.inner.engine.context_register_encoding(handle, id, encoding),
        )
    }

    /// Release the engine context
    ///
    /// Fails with [`Error::ResourceBusy`] while peers are attached. Closing a
    /// closed context is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.handle.write();
        let Some(handle) = *guard else {
            return Ok(());
        };

        let attached = self.attached_peers();
        if attached > 0 {
            tracing::debug!(attached, "context close refused");
            return Err(Error::ResourceBusy(attached));
        }

        tracing::debug!(handle = handle.raw(), "closing context");
        match self.inner.engine.context_close(handle) {
            Err(EngineCode::BUSY) => Err(Error::ResourceBusy(self.attached_peers())),
            result => {
                check("context_close", result)?;
                *guard = None;
                tracing::debug!("context closed");
                Ok(())
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.handle.read().is_none()
    }

    /// Number of peers currently attached
    pub fn attached_peers(&self) -> usize {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub(crate) fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.inner.engine)
    }

    /// Open a peer on this context and count it as attached
    ///
    /// Runs under the read lock so it cannot interleave with `close`.
    pub(crate) fn attach_peer(&self, config: &PeerConfig) -> Result<PeerHandle> {
        let guard = self.inner.handle.read();
        let handle = guard.ok_or(Error::ContextClosed)?;

        let peer = check("peer_open", self.inner.engine.peer_open(handle, config))?;
        self.inner.attached.fetch_add(1, Ordering::SeqCst);
        Ok(peer)
    }

    pub(crate) fn detach_peer(&self) {
        self.inner.attached.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("closed", &self.is_closed())
            .field("attached", &self.attached_peers())
            .finish()
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            if let Err(code) = self.engine.context_close(handle) {
                tracing::warn!(code = code.code(), "failed to close context on drop");
            }
        }
    }
}
