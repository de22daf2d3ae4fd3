//! Receiving peer

use crate::config::{InterfaceConfig, PeerConfig, ReceiverConfig};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::interface::{Interface, Slot};

use super::{InterfaceState, PeerCore};

/// Peer that accepts streams on bound endpoints and returns decoded frames
///
/// Dropping an open receiver closes it.
#[derive(Debug)]
pub struct Receiver {
    core: PeerCore,
}

impl Receiver {
    /// Open a receiver attached to `context`
    pub fn open<'a>(context: impl Into<Option<&'a Context>>, config: &ReceiverConfig) -> Result<Self> {
        let core = PeerCore::open("receiver", context.into(), PeerConfig::Receiver(config.clone()))?;
        Ok(Self { core })
    }

    /// Set socket options of an interface, before it is bound
    pub fn configure(&self, slot: Slot, interface: Interface, config: &InterfaceConfig) -> Result<()> {
        self.core.configure(slot, interface, config)
    }

    /// Bind an interface of a slot to a local endpoint
    ///
    /// On success `endpoint.port` holds the port actually bound, so an
    /// endpoint with port 0 can be handed to a sender afterwards.
    pub fn bind<'a>(
        &self,
        slot: Slot,
        interface: Interface,
        endpoint: impl Into<Option<&'a mut Endpoint>>,
    ) -> Result<()> {
        self.core.bind(slot, interface, endpoint.into())
    }

    /// Close every socket of a slot and free its index
    pub fn unlink(&self, slot: Slot) -> Result<()> {
        self.core.unlink(slot)
    }

    /// Fill `frame` with interleaved samples, silence where nothing arrived
    ///
    /// With the internal clock this blocks for up to one frame period.
    pub fn read_frame<'a>(&self, frame: impl Into<Option<&'a mut [f32]>>) -> Result<()> {
        self.core.read_frame(frame.into())
    }

    pub fn close(&self) -> Result<()> {
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn context(&self) -> &Context {
        self.core.context()
    }

    pub fn slot_state(&self, slot: Slot, interface: Interface) -> Option<InterfaceState> {
        self.core.slot_state(slot, interface)
    }

    pub fn is_slot_broken(&self, slot: Slot) -> bool {
        self.core.is_slot_broken(slot)
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.core.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextConfig, MediaEncoding};
    use crate::endpoint::PORT_EPHEMERAL;
    use crate::error::Error;

    fn config() -> ReceiverConfig {
        ReceiverConfig {
            frame_encoding: MediaEncoding::stereo(44100),
            ..Default::default()
        }
    }

    #[test]
    fn test_bind_writes_back_port() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let receiver = Receiver::open(&context, &config()).unwrap();

        let mut endpoint = Endpoint::parse("rtp://127.0.0.1:0").unwrap();
        assert_eq!(endpoint.port, PORT_EPHEMERAL);
        receiver.bind(Slot::DEFAULT, Interface::AudioSource, &mut endpoint).unwrap();
        assert!(endpoint.port > 0);
        assert_eq!(endpoint.to_uri().unwrap(), format!("rtp://127.0.0.1:{}", endpoint.port));
    }

    #[test]
    fn test_bind_nil_endpoint() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let receiver = Receiver::open(&context, &config()).unwrap();
        assert_eq!(
            receiver.bind(Slot::DEFAULT, Interface::AudioSource, None),
            Err(Error::EndpointNil)
        );
        assert!(receiver.slots().is_empty());
    }

    #[test]
    fn test_unsupported_interface_breaks_slot() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let receiver = Receiver::open(&context, &config()).unwrap();

        let mut repair = Endpoint::parse("rs8m://127.0.0.1:0").unwrap();
        let err = receiver.bind(Slot(3), Interface::AudioSource, &mut repair).unwrap_err();
        assert_eq!(err.engine_code(), Some(-1));
        assert!(receiver.is_slot_broken(Slot(3)));

        let mut source = Endpoint::parse("rtp://127.0.0.1:0").unwrap();
        assert_eq!(
            receiver.bind(Slot(3), Interface::AudioSource, &mut source),
            Err(Error::SlotBroken(Slot(3)))
        );

        receiver.unlink(Slot(3)).unwrap();
        receiver.bind(Slot(3), Interface::AudioSource, &mut source).unwrap();
    }

    #[test]
    fn test_read_before_anything_arrives() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let receiver = Receiver::open(&context, &config()).unwrap();
        let mut frame = vec![1.0f32; 64];
        receiver.read_frame(&mut frame[..]).unwrap();
        assert!(frame.iter().all(|&s| s == 0.0));
    }
}
