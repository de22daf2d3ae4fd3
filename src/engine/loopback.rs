//! In-process engine streaming raw float samples over UDP
//!
//! ```text
//!  Sender                                         Receiver
//!  write_frame -> pending -> packets --UDP--> worker -> inbox -> fifo -> read_frame
//!                           (source + repair)   (one per bound interface)
//! ```
//!
//! Repair interfaces carry a duplicate of every source packet; the receiver
//! keeps whichever copy arrives first and drops the other by sequence number.
//! Sequence numbers are tracked per slot and per sender stream, so a new
//! sender on the same endpoint is heard right away.

use crossbeam_channel::{bounded, Receiver as ChannelRx, Sender as ChannelTx, TrySendError};
use dashmap::DashMap;
use parking_lot::Mutex;
use socket2::{Domain, SockAddr, Socket, Type};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

use super::clock::Pacer;
use super::packet::{self, AudioPacket, PacketKind};
use super::{ContextHandle, Engine, EngineCode, EngineResult, PeerHandle};
use crate::config::{
    ChannelLayout, ClockSource, ContextConfig, FecEncoding, InterfaceConfig, MediaEncoding,
    PacketEncoding, PeerConfig, ReceiverConfig, SenderConfig,
};
use crate::constants::{
    DEFAULT_MAX_PACKET_SIZE, DEFAULT_PACKET_LENGTH_MS, DEFAULT_TARGET_LATENCY_MS, ENCODING_ID_MAX,
    ENCODING_ID_MIN, MAX_TARGET_LATENCY_MS, MAX_TRACKS, MIN_FRAME_SIZE, MIN_PACKET_SIZE,
};
use crate::endpoint::Endpoint;
use crate::interface::{Interface, Slot};

/// How often receive workers look at their stop flag
const WORKER_POLL: Duration = Duration::from_millis(50);

/// Packets queued between a receive worker and `frame_read`
const INBOX_CAPACITY: usize = 1024;

/// Largest datagram a receive worker accepts
const MAX_DATAGRAM: usize = 65536;

/// A sequence number this far behind the last one starts over
const RESYNC_GAP: i32 = 64;

/// Packet tagged with the slot whose socket received it
type Inbound = (Slot, AudioPacket);

/// Engine that moves audio between peers with plain UDP datagrams
///
/// Handles are numbers from a single counter and are never reused.
pub struct LoopbackEngine {
    next_id: AtomicU64,
    contexts: DashMap<u64, Arc<ContextEntry>>,
    peers: DashMap<u64, Arc<PeerEntry>>,
}

struct ContextEntry {
    max_packet_size: usize,
    encodings: Mutex<HashMap<i32, MediaEncoding>>,
    peers: AtomicUsize,
}

struct PeerEntry {
    id: u64,
    context: Arc<ContextEntry>,
    role: Role,
    channels: usize,
    slots: Mutex<HashMap<Slot, EngineSlot>>,
    io: Mutex<PeerIo>,
    /// Cloned into every receive worker
    inbox: ChannelTx<Inbound>,
}

#[derive(Default)]
struct EngineSlot {
    broken: bool,
    configs: HashMap<Interface, InterfaceConfig>,
    links: HashMap<Interface, Link>,
}

enum Link {
    Bound(BoundSocket),
    Connected(UdpSocket),
}

impl Link {
    fn local_port(&self) -> Option<u16> {
        match self {
            Link::Bound(socket) => Some(socket.local.port()),
            Link::Connected(socket) => socket.local_addr().ok().map(|addr| addr.port()),
        }
    }
}

/// Receiving socket owned by a worker thread
struct BoundSocket {
    local: SocketAddr,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        tracing::debug!(local = %self.local, "receive worker stopped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Sender(FecEncoding),
    Receiver,
}

enum PeerIo {
    Sender(SenderIo),
    Receiver(ReceiverIo),
}

struct SenderIo {
    pacer: Option<Pacer>,
    pending: Vec<f32>,
    packet_samples: usize,
    stream: u32,
    seq: u32,
}

struct ReceiverIo {
    pacer: Option<Pacer>,
    inbox: ChannelRx<Inbound>,
    fifo: VecDeque<f32>,
    /// Last accepted packet of each slot
    positions: HashMap<Slot, StreamPosition>,
    prebuffer: usize,
    capacity: usize,
    playing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamPosition {
    stream: u32,
    seq: u32,
}

impl ReceiverIo {
    fn accept(&mut self, slot: Slot, packet: AudioPacket) {
        match self.positions.get(&slot) {
            Some(last) if last.stream == packet.stream => {
                let delta = packet.seq.wrapping_sub(last.seq) as i32;
                // duplicates, repair copies of delivered packets, and late arrivals
                if delta <= 0 && delta > -RESYNC_GAP {
                    return;
                }
                if delta <= -RESYNC_GAP {
                    tracing::debug!(%slot, from = last.seq, to = packet.seq, "sequence jumped back, resyncing");
                }
            }
            Some(last) => {
                tracing::debug!(%slot, old = last.stream, new = packet.stream, "sender changed, resyncing");
            }
            None => tracing::debug!(%slot, stream = packet.stream, "stream started"),
        }
        self.positions.insert(
            slot,
            StreamPosition {
                stream: packet.stream,
                seq: packet.seq,
            },
        );
        self.fifo.extend(packet.samples);

        let excess = self.fifo.len().saturating_sub(self.capacity);
        if excess > 0 {
            tracing::trace!(excess, "receive queue overflow, dropping oldest samples");
            self.fifo.drain(..excess);
        }
    }

    fn drain_inbox(&mut self) {
        while let Ok((slot, packet)) = self.inbox.try_recv() {
            self.accept(slot, packet);
        }
    }

    /// Drop the sequence state of an unlinked slot
    fn forget(&mut self, slot: Slot) {
        self.drain_inbox();
        self.positions.remove(&slot);
    }

    fn fill(&mut self, frame: &mut [f32]) {
        self.drain_inbox();

        if !self.playing {
            if self.fifo.len() < self.prebuffer {
                frame.fill(0.0);
                return;
            }
            tracing::debug!(buffered = self.fifo.len(), "playback started");
            self.playing = true;
        }

        let available = self.fifo.len().min(frame.len());
        for (dst, src) in frame[..available].iter_mut().zip(self.fifo.drain(..available)) {
            *dst = src;
        }
        if available < frame.len() {
            tracing::trace!(missing = frame.len() - available, "receive underrun");
            frame[available..].fill(0.0);
        }
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            contexts: DashMap::new(),
            peers: DashMap::new(),
        }
    }

    /// Number of open contexts
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Number of open peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn context(&self, handle: ContextHandle) -> EngineResult<Arc<ContextEntry>> {
        self.contexts
            .get(&handle.raw())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineCode::NOT_FOUND)
    }

    // The map guard is released before returning so frame I/O can block
    // without holding a shard lock.
    fn peer(&self, handle: PeerHandle) -> EngineResult<Arc<PeerEntry>> {
        self.peers
            .get(&handle.raw())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineCode::NOT_FOUND)
    }
}

fn validate_encoding(encoding: &MediaEncoding) -> EngineResult<()> {
    if encoding.rate == 0 {
        return Err(EngineCode::INVALID_ARGUMENT);
    }
    let tracks_ok = match encoding.channels {
        ChannelLayout::Multitrack => (1..=MAX_TRACKS).contains(&encoding.tracks),
        ChannelLayout::Mono | ChannelLayout::Stereo => encoding.tracks == 0,
    };
    if !tracks_ok {
        return Err(EngineCode::INVALID_ARGUMENT);
    }
    Ok(())
}

fn samples_for(rate: u32, channels: usize, duration: Duration) -> EngineResult<usize> {
    let frames = u128::from(rate) * duration.as_nanos() / 1_000_000_000;
    usize::try_from(frames)
        .ok()
        .and_then(|frames| frames.max(1).checked_mul(channels))
        .ok_or(EngineCode::INVALID_ARGUMENT)
}

fn open_sender(
    context: &ContextEntry,
    config: &SenderConfig,
    channels: usize,
    pacer: Option<Pacer>,
) -> EngineResult<SenderIo> {
    let packet_encoding = match config.packet_encoding {
        Some(PacketEncoding::Registered(id)) => {
            let encodings = context.encodings.lock();
            Some(*encodings.get(&id).ok_or(EngineCode::INVALID_ARGUMENT)?)
        }
        Some(encoding) => encoding.builtin(),
        None => None,
    };
    // samples go on the wire exactly as written
    if let Some(encoding) = packet_encoding {
        if encoding.rate != config.frame_encoding.rate || encoding.channel_count() != channels {
            return Err(EngineCode::INVALID_ARGUMENT);
        }
    }

    let per_packet = packet::max_samples(context.max_packet_size) / channels * channels;
    if per_packet == 0 {
        return Err(EngineCode::INVALID_ARGUMENT);
    }

    let length = match config.packet_length {
        d if d.is_zero() => Duration::from_millis(DEFAULT_PACKET_LENGTH_MS),
        d => d,
    };
    let packet_samples = samples_for(config.frame_encoding.rate, channels, length)?;

    Ok(SenderIo {
        pacer,
        pending: Vec::new(),
        packet_samples: packet_samples.min(per_packet),
        stream: Uuid::new_v4().as_u128() as u32,
        seq: 0,
    })
}

fn open_receiver(
    config: &ReceiverConfig,
    channels: usize,
    inbox: ChannelRx<Inbound>,
    pacer: Option<Pacer>,
) -> EngineResult<ReceiverIo> {
    let latency = match config.target_latency {
        d if d.is_zero() => Duration::from_millis(DEFAULT_TARGET_LATENCY_MS),
        d => d,
    };
    if latency > Duration::from_millis(MAX_TARGET_LATENCY_MS) {
        return Err(EngineCode::INVALID_ARGUMENT);
    }

    let rate = config.frame_encoding.rate;
    let prebuffer = samples_for(rate, channels, latency)?;
    // one second on top of the target latency
    let capacity = samples_for(rate, channels, Duration::from_secs(1))?
        .checked_add(prebuffer)
        .ok_or(EngineCode::INVALID_ARGUMENT)?;

    Ok(ReceiverIo {
        pacer,
        inbox,
        fifo: VecDeque::new(),
        positions: HashMap::new(),
        prebuffer,
        capacity,
        playing: false,
    })
}

fn parse_ip(value: &str) -> EngineResult<Option<IpAddr>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map(Some)
        .map_err(|_| EngineCode::INVALID_ARGUMENT)
}

fn resolve(endpoint: &Endpoint, allow_ephemeral: bool) -> EngineResult<SocketAddr> {
    let port = endpoint.effective_port().ok_or(EngineCode::INVALID_ARGUMENT)?;
    if port == 0 && !allow_ephemeral {
        return Err(EngineCode::INVALID_ARGUMENT);
    }
    (endpoint.bare_host(), port)
        .to_socket_addrs()
        .map_err(|_| EngineCode::ADDRESS_UNAVAILABLE)?
        .next()
        .ok_or(EngineCode::ADDRESS_UNAVAILABLE)
}

fn new_socket(addr: &SocketAddr, config: &InterfaceConfig) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(*addr), Type::DGRAM, Some(socket2::Protocol::UDP))?;
    socket.set_reuse_address(config.reuse_address)?;
    Ok(socket)
}

fn join_group(socket: &Socket, group: IpAddr, local: &SocketAddr) -> io::Result<()> {
    match (group, local.ip()) {
        (IpAddr::V4(group), IpAddr::V4(iface)) => {
            let iface = if iface.is_multicast() { Ipv4Addr::UNSPECIFIED } else { iface };
            socket.join_multicast_v4(&group, &iface)
        }
        (IpAddr::V6(group), IpAddr::V6(_)) => socket.join_multicast_v6(&group, 0),
        _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "address family mismatch")),
    }
}

fn address_error(context: &str, err: io::Error) -> EngineCode {
    tracing::debug!(error = %err, "{context}");
    EngineCode::ADDRESS_UNAVAILABLE
}

fn bind_socket(
    peer: &PeerEntry,
    slot: Slot,
    interface: Interface,
    endpoint: &Endpoint,
    config: &InterfaceConfig,
) -> EngineResult<(Endpoint, BoundSocket)> {
    let addr = resolve(endpoint, true)?;
    let group = parse_ip(&config.multicast_group)?;

    let socket = new_socket(&addr, config).map_err(|e| address_error("socket creation failed", e))?;
    socket
        .bind(&SockAddr::from(addr))
        .map_err(|e| address_error("bind failed", e))?;
    if let Some(group) = group {
        join_group(&socket, group, &addr).map_err(|e| address_error("multicast join failed", e))?;
    }

    let local = socket
        .local_addr()
        .map_err(|e| address_error("local address unavailable", e))?
        .as_socket()
        .ok_or(EngineCode::ADDRESS_UNAVAILABLE)?;

    let socket: UdpSocket = socket.into();
    socket
        .set_read_timeout(Some(WORKER_POLL))
        .map_err(|e| address_error("read timeout", e))?;

    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let stop = Arc::clone(&stop);
        let inbox = peer.inbox.clone();
        let channels = peer.channels;
        thread::Builder::new()
            .name(format!("loopback-rx-{}-{}-{}", peer.id, slot.index(), interface.name()))
            .spawn(move || receive_loop(socket, slot, inbox, stop, channels))
            .map_err(|_| EngineCode::ADDRESS_UNAVAILABLE)?
    };

    let mut bound = endpoint.clone();
    bound.port = i32::from(local.port());

    Ok((
        bound,
        BoundSocket {
            local,
            stop,
            worker: Some(worker),
        },
    ))
}

fn receive_loop(
    socket: UdpSocket,
    slot: Slot,
    inbox: ChannelTx<Inbound>,
    stop: Arc<AtomicBool>,
    channels: usize,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while !stop.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => match packet::decode(&buf[..len]) {
                Some(packet) if packet.samples.len() % channels == 0 => {
                    match inbox.try_send((slot, packet)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => tracing::trace!("inbox full, dropping packet"),
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                _ => tracing::trace!(len, "dropping malformed datagram"),
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => {
                tracing::trace!(error = %e, "receive failed");
                thread::sleep(WORKER_POLL);
            }
        }
    }
}

fn connect_socket(endpoint: &Endpoint, config: &InterfaceConfig) -> EngineResult<UdpSocket> {
    let remote = resolve(endpoint, false)?;
    let outgoing = parse_ip(&config.outgoing_address)?;
    let multicast_if = parse_ip(&config.multicast_group)?;

    let local_ip = match outgoing {
        Some(ip) => ip,
        None if remote.is_ipv4() => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        None => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };

    let socket = new_socket(&remote, config).map_err(|e| address_error("socket creation failed", e))?;
    socket
        .bind(&SockAddr::from(SocketAddr::new(local_ip, 0)))
        .map_err(|e| address_error("bind failed", e))?;
    if let Some(IpAddr::V4(iface)) = multicast_if {
        socket
            .set_multicast_if_v4(&iface)
            .map_err(|e| address_error("multicast interface", e))?;
    }
    socket
        .connect(&SockAddr::from(remote))
        .map_err(|e| address_error("connect failed", e))?;

    Ok(socket.into())
}

impl SenderIo {
    fn push(&mut self, frame: &[f32]) -> Vec<(u32, Vec<f32>)> {
        self.pending.extend_from_slice(frame);

        let mut ready = Vec::new();
        while self.pending.len() >= self.packet_samples {
            let chunk: Vec<f32> = self.pending.drain(..self.packet_samples).collect();
            ready.push((self.seq, chunk));
            self.seq = self.seq.wrapping_add(1);
        }
        ready
    }
}

fn send_all(slots: &HashMap<Slot, EngineSlot>, kind: PacketKind, bytes: &[u8]) {
    let target = match kind {
        PacketKind::Source => Interface::AudioSource,
        PacketKind::Repair => Interface::AudioRepair,
    };
    for (slot, state) in slots.iter().filter(|(_, state)| !state.broken) {
        if let Some(Link::Connected(socket)) = state.links.get(&target) {
            // the other side may not be listening yet
            if let Err(e) = socket.send(bytes) {
                tracing::trace!(%slot, interface = %target, error = %e, "send failed");
            }
        }
    }
}

impl Engine for LoopbackEngine {
    fn context_open(&self, config: &ContextConfig) -> EngineResult<ContextHandle> {
        if config.max_packet_size != 0 && (config.max_packet_size as usize) < MIN_PACKET_SIZE {
            return Err(EngineCode::INVALID_ARGUMENT);
        }
        if config.max_frame_size != 0 && (config.max_frame_size as usize) < MIN_FRAME_SIZE {
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        let max_packet_size = match config.max_packet_size {
            0 => DEFAULT_MAX_PACKET_SIZE,
            size => size as usize,
        };

        let id = self.next_id();
        self.contexts.insert(
            id,
            Arc::new(ContextEntry {
                max_packet_size,
                encodings: Mutex::new(HashMap::new()),
                peers: AtomicUsize::new(0),
            }),
        );
        tracing::debug!(id, max_packet_size, "loopback context opened");
        Ok(ContextHandle::from_raw(id))
    }

    fn context_register_encoding(
        &self,
        context: ContextHandle,
        id: i32,
        encoding: &MediaEncoding,
    ) -> EngineResult<()> {
        let context = self.context(context)?;
        if !(ENCODING_ID_MIN..=ENCODING_ID_MAX).contains(&id) {
            return Err(EngineCode::INVALID_ARGUMENT);
        }
        validate_encoding(encoding)?;
        context.encodings.lock().insert(id, *encoding);
        Ok(())
    }

    fn context_close(&self, context: ContextHandle) -> EngineResult<()> {
        let entry = self.context(context)?;
        if entry.peers.load(Ordering::SeqCst) > 0 {
            return Err(EngineCode::BUSY);
        }
        self.contexts.remove(&context.raw());
        tracing::debug!(id = context.raw(), "loopback context closed");
        Ok(())
    }

    fn peer_open(&self, context: ContextHandle, config: &PeerConfig) -> EngineResult<PeerHandle> {
        let context = self.context(context)?;
        let encoding = config.frame_encoding();
        validate_encoding(encoding)?;
        let channels = encoding.channel_count();
        let pacer = (config.clock_source() == ClockSource::Internal).then(|| Pacer::new(encoding.rate, channels));

        let (inbox_tx, inbox_rx) = bounded(INBOX_CAPACITY);
        let (role, io) = match config {
            PeerConfig::Sender(sender) => (
                Role::Sender(sender.fec_encoding),
                PeerIo::Sender(open_sender(&context, sender, channels, pacer)?),
            ),
            PeerConfig::Receiver(receiver) => (
                Role::Receiver,
                PeerIo::Receiver(open_receiver(receiver, channels, inbox_rx, pacer)?),
            ),
        };

        let id = self.next_id();
        context.peers.fetch_add(1, Ordering::SeqCst);
        self.peers.insert(
            id,
            Arc::new(PeerEntry {
                id,
                context,
                role,
                channels,
                slots: Mutex::new(HashMap::new()),
                io: Mutex::new(io),
                inbox: inbox_tx,
            }),
        );
        tracing::debug!(id, channels, "loopback peer opened");
        Ok(PeerHandle::from_raw(id))
    }

    fn peer_configure(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        config: &InterfaceConfig,
    ) -> EngineResult<()> {
        let peer = self.peer(peer)?;
        let mut slots = peer.slots.lock();
        let state = slots.entry(slot).or_default();
        if state.broken {
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        let valid = !state.links.contains_key(&interface)
            && parse_ip(&config.outgoing_address).is_ok()
            && parse_ip(&config.multicast_group).is_ok();
        if !valid {
            state.broken = true;
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        state.configs.insert(interface, config.clone());
        Ok(())
    }

    fn peer_bind(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        endpoint: &Endpoint,
    ) -> EngineResult<Endpoint> {
        let peer = self.peer(peer)?;
        if peer.role != Role::Receiver {
            return Err(EngineCode::UNSUPPORTED);
        }

        let mut slots = peer.slots.lock();
        let state = slots.entry(slot).or_default();
        if state.broken {
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        let result = (|| -> EngineResult<(Endpoint, BoundSocket)> {
            let protocol = endpoint.protocol.ok_or(EngineCode::INVALID_ARGUMENT)?;
            if state.links.contains_key(&interface) || !interface.supports(protocol) {
                return Err(EngineCode::INVALID_ARGUMENT);
            }
            if interface == Interface::Consolidated {
                return Err(EngineCode::UNSUPPORTED);
            }
            let config = state.configs.get(&interface).cloned().unwrap_or_default();
            bind_socket(&peer, slot, interface, endpoint, &config)
        })();

        match result {
            Ok((bound, socket)) => {
                tracing::debug!(peer = peer.id, %slot, %interface, local = %socket.local, "interface bound");
                state.links.insert(interface, Link::Bound(socket));
                Ok(bound)
            }
            Err(code) => {
                state.broken = true;
                Err(code)
            }
        }
    }

    fn peer_connect(
        &self,
        peer: PeerHandle,
        slot: Slot,
        interface: Interface,
        endpoint: &Endpoint,
    ) -> EngineResult<()> {
        let peer = self.peer(peer)?;
        let Role::Sender(fec) = peer.role else {
            return Err(EngineCode::UNSUPPORTED);
        };

        let mut slots = peer.slots.lock();
        let state = slots.entry(slot).or_default();
        if state.broken {
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        let result = (|| -> EngineResult<UdpSocket> {
            let protocol = endpoint.protocol.ok_or(EngineCode::INVALID_ARGUMENT)?;
            if state.links.contains_key(&interface) || !interface.supports(protocol) {
                return Err(EngineCode::INVALID_ARGUMENT);
            }
            let paired = match interface {
                Interface::Consolidated => return Err(EngineCode::UNSUPPORTED),
                Interface::AudioSource => protocol == fec.source_protocol(),
                Interface::AudioRepair => fec.repair_protocol() == Some(protocol),
                Interface::AudioControl => true,
            };
            if !paired {
                return Err(EngineCode::INVALID_ARGUMENT);
            }
            let config = state.configs.get(&interface).cloned().unwrap_or_default();
            connect_socket(endpoint, &config)
        })();

        match result {
            Ok(socket) => {
                tracing::debug!(peer = peer.id, %slot, %interface, remote = %endpoint, "interface connected");
                state.links.insert(interface, Link::Connected(socket));
                Ok(())
            }
            Err(code) => {
                state.broken = true;
                Err(code)
            }
        }
    }

    fn peer_unlink(&self, peer: PeerHandle, slot: Slot) -> EngineResult<()> {
        let peer = self.peer(peer)?;
        // workers are joined after the lock is released
        let removed = peer.slots.lock().remove(&slot);
        match removed {
            Some(state) => {
                let ports: Vec<u16> = state.links.values().filter_map(Link::local_port).collect();
                drop(state);
                if let PeerIo::Receiver(io) = &mut *peer.io.lock() {
                    io.forget(slot);
                }
                tracing::debug!(peer = peer.id, %slot, ?ports, "slot unlinked");
                Ok(())
            }
            None => Err(EngineCode::NOT_FOUND),
        }
    }

    fn peer_close(&self, peer: PeerHandle) -> EngineResult<()> {
        let (_, entry) = self.peers.remove(&peer.raw()).ok_or(EngineCode::NOT_FOUND)?;
        let slots = std::mem::take(&mut *entry.slots.lock());
        drop(slots);
        entry.context.peers.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(id = entry.id, "loopback peer closed");
        Ok(())
    }

    fn frame_read(&self, peer: PeerHandle, frame: &mut [f32]) -> EngineResult<()> {
        let peer = self.peer(peer)?;
        if frame.len() % peer.channels != 0 {
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        let mut io = peer.io.lock();
        let PeerIo::Receiver(io) = &mut *io else {
            return Err(EngineCode::UNSUPPORTED);
        };
        if let Some(pacer) = io.pacer.as_mut() {
            pacer.wait(frame.len());
        }
        io.fill(frame);
        Ok(())
    }

    fn frame_write(&self, peer: PeerHandle, frame: &[f32]) -> EngineResult<()> {
        let peer = self.peer(peer)?;
        if frame.len() % peer.channels != 0 {
            return Err(EngineCode::INVALID_ARGUMENT);
        }

        let mut io = peer.io.lock();
        let PeerIo::Sender(io) = &mut *io else {
            return Err(EngineCode::UNSUPPORTED);
        };
        if let Some(pacer) = io.pacer.as_mut() {
            pacer.wait(frame.len());
        }

        let ready = io.push(frame);
        if ready.is_empty() {
            return Ok(());
        }

        let fec = matches!(peer.role, Role::Sender(fec) if fec.is_enabled());
        let stream = io.stream;
        let slots = peer.slots.lock();
        for (seq, samples) in ready {
            let source = packet::encode(PacketKind::Source, stream, seq, &samples);
            send_all(&slots, PacketKind::Source, &source);
            if fec {
                let repair = packet::encode(PacketKind::Repair, stream, seq, &samples);
                send_all(&slots, PacketKind::Repair, &repair);
            }
        }
        Ok(())
    }
}
