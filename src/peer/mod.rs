//! Senders and receivers
//!
//! Both peer kinds share one state machine, [`PeerCore`]:
//!
//! ```text
//!   open ──► configure* ──► bind / connect ──► frame I/O ──► close
//!                 ▲                │
//!                 └──── unlink ◄───┘
//! ```
//!
//! Every operation takes the peer lock for reading and fails with
//! [`Error::PeerClosed`] once the engine handle is gone. `close` takes it for
//! writing, so it waits for in-flight calls and no call ever sees a half
//! closed peer.

mod slot;

#[cfg(feature = "receiver")]
pub mod receiver;
#[cfg(feature = "sender")]
pub mod sender;

pub use slot::InterfaceState;

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

use crate::config::{InterfaceConfig, PeerConfig};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::engine::{check, Engine, PeerHandle};
use crate::error::{Error, Result};
use crate::interface::{Interface, Slot};
use slot::SlotTable;

/// Lifecycle shared by [`Sender`](sender::Sender) and [`Receiver`](receiver::Receiver)
pub(crate) struct PeerCore {
    kind: &'static str,
    context: Context,
    engine: Arc<dyn Engine>,
    /// `None` once closed
    handle: RwLock<Option<PeerHandle>>,
    slots: Mutex<SlotTable>,
}

impl PeerCore {
    pub fn open(kind: &'static str, context: Option<&Context>, config: PeerConfig) -> Result<Self> {
        let context = context.ok_or(Error::ContextNil)?;
        tracing::debug!(kind, encoding = ?config.frame_encoding(), "opening peer");

        let handle = context.attach_peer(&config)?;

        tracing::debug!(kind, handle = handle.raw(), "peer opened");
        Ok(Self {
            kind,
            context: context.clone(),
            engine: context.engine(),
            handle: RwLock::new(Some(handle)),
            slots: Mutex::new(SlotTable::default()),
        })
    }

    pub fn configure(&self, slot: Slot, interface: Interface, config: &InterfaceConfig) -> Result<()> {
        let guard = self.handle.read();
        let handle = guard.ok_or(Error::PeerClosed)?;
        config.validate()?;

        tracing::debug!(kind = self.kind, %slot, %interface, ?config, "configuring interface");
        let mut slots = self.slots.lock();
        slots.ensure_usable(slot, interface)?;

        let result = check(
            "peer_configure",
            self.engine.peer_configure(handle, slot, interface, config),
        );
        slots.record(slot, interface, InterfaceState::Configured, result)
    }

    /// Bind and write the resolved port back into `endpoint`
    pub fn bind(&self, slot: Slot, interface: Interface, endpoint: Option<&mut Endpoint>) -> Result<()> {
        let guard = self.handle.read();
        let handle = guard.ok_or(Error::PeerClosed)?;
        let endpoint = endpoint.ok_or(Error::EndpointNil)?;
        endpoint.to_uri()?;

        tracing::debug!(kind = self.kind, %slot, %interface, %endpoint, "binding");
        let mut slots = self.slots.lock();
        slots.ensure_usable(slot, interface)?;

        let result = check(
            "peer_bind",
            self.engine.peer_bind(handle, slot, interface, endpoint),
        );
        let bound = slots.record(slot, interface, InterfaceState::Linked, result)?;

        endpoint.port = bound.port;
        tracing::debug!(kind = self.kind, %slot, %interface, port = endpoint.port, "bound");
        Ok(())
    }

    pub fn connect(&self, slot: Slot, interface: Interface, endpoint: Option<&Endpoint>) -> Result<()> {
        let guard = self.handle.read();
        let handle = guard.ok_or(Error::PeerClosed)?;
        let endpoint = endpoint.ok_or(Error::EndpointNil)?;
        endpoint.to_uri()?;

        tracing::debug!(kind = self.kind, %slot, %interface, %endpoint, "connecting");
        let mut slots = self.slots.lock();
        slots.ensure_usable(slot, interface)?;

        let result = check(
            "peer_connect",
            self.engine.peer_connect(handle, slot, interface, endpoint),
        );
        slots.record(slot, interface, InterfaceState::Linked, result)?;
        tracing::debug!(kind = self.kind, %slot, %interface, "connected");
        Ok(())
    }

    pub fn unlink(&self, slot: Slot) -> Result<()> {
        let guard = self.handle.read();
        let handle = guard.ok_or(Error::PeerClosed)?;

        let mut slots = self.slots.lock();
        if !slots.contains(slot) {
            return Err(Error::UnknownSlot(slot));
        }

        tracing::debug!(kind = self.kind, %slot, "unlinking");
        check("peer_unlink", self.engine.peer_unlink(handle, slot))?;
        slots.remove(slot);
        tracing::debug!(kind = self.kind, %slot, "unlinked");
        Ok(())
    }

    pub fn read_frame(&self, frame: Option<&mut [f32]>) -> Result<()> {
        let guard = self.handle.read();
        let handle = guard.ok_or(Error::PeerClosed)?;
        let frame = frame.ok_or(Error::FrameNil)?;
        if frame.is_empty() {
            return Ok(());
        }

        tracing::trace!(samples = frame.len(), "read frame");
        check("frame_read", self.engine.frame_read(handle, frame))
    }

    pub fn write_frame(&self, frame: Option<&[f32]>) -> Result<()> {
        let guard = self.handle.read();
        let handle = guard.ok_or(Error::PeerClosed)?;
        let frame = frame.ok_or(Error::FrameNil)?;
        if frame.is_empty() {
            return Ok(());
        }

        tracing::trace!(samples = frame.len(), "write frame");
        check("frame_write", self.engine.frame_write(handle, frame))
    }

    /// Close the peer and detach it from its context, no-op when closed
    pub fn close(&self) -> Result<()> {
        let mut guard = self.handle.write();
        let Some(handle) = *guard else {
            return Ok(());
        };

        tracing::debug!(kind = self.kind, handle = handle.raw(), "closing peer");
        check("peer_close", self.engine.peer_close(handle))?;
        self.finish_close(&mut guard);
        Ok(())
    }

    fn finish_close(&self, handle: &mut Option<PeerHandle>) {
        *handle = None;
        self.slots.lock().clear();
        self.context.detach_peer();
        tracing::debug!(kind = self.kind, "peer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.handle.read().is_none()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn slot_state(&self, slot: Slot, interface: Interface) -> Option<InterfaceState> {
        self.slots.lock().state(slot, interface)
    }

    pub fn is_slot_broken(&self, slot: Slot) -> bool {
        self.slots.lock().is_broken(slot)
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.slots.lock().slots()
    }
}

impl fmt::Debug for PeerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerCore")
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .field("slots", &self.slots())
            .finish()
    }
}

impl Drop for PeerCore {
    fn drop(&mut self) {
        let mut guard = self.handle.write();
        let Some(handle) = *guard else {
            return;
        };

        // no panics here, even for codes outside of the engine contract
        match self.engine.peer_close(handle) {
            Ok(()) => self.finish_close(&mut guard),
            Err(code) => tracing::warn!(kind = self.kind, code = code.code(), "failed to close peer on drop"),
        }
    }
}
