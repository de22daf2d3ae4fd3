//! Engines shared by the integration suites

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;

use audio_peer_session::config::PeerConfig;
use audio_peer_session::engine::{ContextHandle, EngineResult, PeerHandle};
use audio_peer_session::{
    Context, ContextConfig, Endpoint, Engine, EngineCode, Interface, InterfaceConfig,
    LoopbackEngine, MediaEncoding, ReceiverConfig, SenderConfig, Slot,
};

/// Loopback engine that records the name of every call it receives
#[derive(Default)]
pub struct SpyEngine {
    inner: LoopbackEngine,
    calls: Mutex<Vec<&'static str>>,
}

impl SpyEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == name).count()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    pub fn inner(&self) -> &LoopbackEngine {
        &self.inner
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().push(name);
    }
}

impl Engine for SpyEngine {
    fn context_open(&self, config: &ContextConfig) -> EngineResult<ContextHandle> {
        self.record("context_open");
        self.inner.context_open(config)
    }

    fn context_register_encoding(
        &self,
        context: ContextHandle,
        id: i32,
        encoding: &MediaEncoding,
    ) -> EngineResult<()> {
        self.record("context_register_encoding");
        self.inner.context_register_encoding(context, id, encoding)
    }

    fn context_close(&self, context: ContextHandle) -> EngineResult<()> {
        self.record("context_close");
        self.inner.context_close(context)
    }

    fn peer_open(&self, context: ContextHandle, config: &PeerConfig) -> EngineResult<PeerHandle> {
        self.record("peer_open");
        self.inner.peer_open(context, config)
    }

    fn peer_configure(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        config: &InterfaceConfig,
    ) -> EngineResult<()> {
        self.record("peer_configure");
        self.inner.peer_configure(peer, slot, interface, config)
    }

    fn peer_bind(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        endpoint: &Endpoint,
    ) -> EngineResult<Endpoint> {
        self.record("peer_bind");
        self.inner.peer_bind(peer, slot, interface, endpoint)
    }

    fn peer_connect(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        endpoint: &Endpoint,
    ) -> EngineResult<()> {
        self.record("peer_connect");
        self.inner.peer_connect(peer, slot, interface, endpoint)
    }

    fn peer_unlink(&self, peer: PeerHandle, slot: Slot) -> EngineResult<()> {
        self.record("peer_unlink");
        self.inner.peer_unlink(peer, slot)
    }

    fn peer_close(&self, peer: PeerHandle) -> EngineResult<()> {
        self.record("peer_close");
        self.inner.peer_close(peer)
    }

    fn frame_read(&self, peer: PeerHandle, frame: &mut [f32]) -> EngineResult<()> {
        self.record("frame_read");
        self.inner.frame_read(peer, frame)
    }

    fn frame_write(&self, peer: PeerHandle, frame: &[f32]) -> EngineResult<()> {
        self.record("frame_write");
        self.inner.frame_write(peer, frame)
    }
}

/// Engine that answers `peer_open` with a code outside of the contract
#[derive(Default)]
pub struct RogueEngine {
    inner: LoopbackEngine,
}

impl Engine for RogueEngine {
    fn context_open(&self, config: &ContextConfig) -> EngineResult<ContextHandle> {
        self.inner.context_open(config)
    }

    fn context_register_encoding(
        &self,
        context: ContextHandle,
        id: i32,
        encoding: &MediaEncoding,
    ) -> EngineResult<()> {
        self.inner.context_register_encoding(context, id, encoding)
    }

    fn context_close(&self, context: ContextHandle) -> EngineResult<()> {
        self.inner.context_close(context)
    }

    fn peer_open(&self, _context: ContextHandle, _config: &PeerConfig) -> EngineResult<PeerHandle> {
        Err(EngineCode(7))
    }

    fn peer_configure(&self, _: PeerHandle, _: Slot, _: Interface, _: &InterfaceConfig) -> EngineResult<()> {
        Err(EngineCode::NOT_FOUND)
    }

    fn peer_bind(&self, _: PeerHandle, _: Slot, _: Interface, _: &Endpoint) -> EngineResult<Endpoint> {
        Err(EngineCode::NOT_FOUND)
    }

    fn peer_connect(&self, _: PeerHandle, _: Slot, _: Interface, _: &Endpoint) -> EngineResult<()> {
        Err(EngineCode::NOT_FOUND)
    }

    fn peer_unlink(&self, _: PeerHandle, _: Slot) -> EngineResult<()> {
        Err(EngineCode::NOT_FOUND)
    }

    fn peer_close(&self, _: PeerHandle) -> EngineResult<()> {
        Err(EngineCode::NOT_FOUND)
    }

    fn frame_read(&self, _: PeerHandle, _: &mut [f32]) -> EngineResult<()> {
        Err(EngineCode::NOT_FOUND)
    }

    fn frame_write(&self, _: PeerHandle, _: &[f32]) -> EngineResult<()> {
        Err(EngineCode::NOT_FOUND)
    }
}

pub fn spy_context() -> (Arc<SpyEngine>, Context) {
    let spy = SpyEngine::new();
    let context = Context::with_engine(spy.clone(), &ContextConfig::default())
        .expect("context should open");
    (spy, context)
}

pub fn sender_config() -> SenderConfig {
    SenderConfig {
        frame_encoding: MediaEncoding::stereo(44100),
        ..Default::default()
    }
}

pub fn receiver_config() -> ReceiverConfig {
    ReceiverConfig {
        frame_encoding: MediaEncoding::stereo(44100),
        ..Default::default()
    }
}
