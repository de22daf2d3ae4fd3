//! Sending peer

use crate::config::{InterfaceConfig, PeerConfig, SenderConfig};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::interface::{Interface, Slot};

use super::{InterfaceState, PeerCore};

/// Peer that writes frames and streams them to connected receivers
///
/// ```no_run
/// use audio_peer_session::{Context, ContextConfig, Endpoint, Interface, MediaEncoding, Sender, SenderConfig, Slot};
///
/// # fn main() -> audio_peer_session::Result<()> {
/// let context = Context::open(&ContextConfig::default())?;
/// let config = SenderConfig {
///     frame_encoding: MediaEncoding::stereo(44100),
///     ..Default::default()
/// };
/// let sender = Sender::open(&context, &config)?;
/// sender.connect(Slot::DEFAULT, Interface::AudioSource, &Endpoint::parse("rtp+rs8m://192.168.0.2:10001")?)?;
/// sender.connect(Slot::DEFAULT, Interface::AudioRepair, &Endpoint::parse("rs8m://192.168.0.2:10002")?)?;
///
/// let frame = [0.0f32; 882];
/// sender.write_frame(&frame[..])?;
///
/// sender.close()?;
/// context.close()?;
/// # Ok(())
/// # }
/// ```
///
/// Dropping an open sender closes it.
#[derive(Debug)]
pub struct Sender {
    core: PeerCore,
}

impl Sender {
    /// Open a sender attached to `context`
    pub fn open<'a>(context: impl Into<Option<&'a Context>>, config: &SenderConfig) -> Result<Self> {
        let core = PeerCore::open("sender", context.into(), PeerConfig::Sender(config.clone()))?;
        Ok(Self { core })
    }

    /// Set socket options of an interface, before it is connected
    pub fn configure(&self, slot: Slot, interface: Interface, config: &InterfaceConfig) -> Result<()> {
        self.core.configure(slot, interface, config)
    }

    /// Connect an interface of a slot to a remote receiver
    pub fn connect<'a>(
        &self,
        slot: Slot,
        interface: Interface,
        endpoint: impl Into<Option<&'a Endpoint>>,
    ) -> Result<()> {
        self.core.connect(slot, interface, endpoint.into())
    }

    /// Drop every connection of a slot and free its index
    pub fn unlink(&self, slot: Slot) -> Result<()> {
        self.core.unlink(slot)
    }

    /// Encode and send interleaved samples
    ///
    /// With the internal clock this blocks for up to one frame period.
    pub fn write_frame<'a>(&self, frame: impl Into<Option<&'a [f32]>>) -> Result<()> {
        self.core.write_frame(frame.into())
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

    /// Slots currently in use, broken ones included
    pub fn slots(&self) -> Vec<Slot> {
        self.core.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextConfig, FecEncoding, MediaEncoding};
    use crate::error::Error;

    fn config() -> SenderConfig {
        SenderConfig {
            frame_encoding: MediaEncoding::stereo(44100),
            fec_encoding: FecEncoding::Disable,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_requires_context() {
        assert!(matches!(Sender::open(None, &config()), Err(Error::ContextNil)));
    }

    #[test]
    fn test_open_on_closed_context() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        context.close().unwrap();
        assert!(matches!(Sender::open(&context, &config()), Err(Error::ContextClosed)));
    }

    #[test]
    fn test_missing_encoding_rejected() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let err = Sender::open(&context, &SenderConfig::default()).unwrap_err();
        assert_eq!(err, Error::Engine { op: "peer_open", code: -1 });
        assert_eq!(context.attached_peers(), 0);
    }

    #[test]
    fn test_connect_twice() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let sender = Sender::open(&context, &config()).unwrap();
        let endpoint = Endpoint::parse("rtp://127.0.0.1:10500").unwrap();

        sender.connect(Slot::DEFAULT, Interface::AudioSource, &endpoint).unwrap();
        assert_eq!(
            sender.slot_state(Slot::DEFAULT, Interface::AudioSource),
            Some(InterfaceState::Linked)
        );
        assert_eq!(
            sender.connect(Slot::DEFAULT, Interface::AudioSource, &endpoint),
            Err(Error::InterfaceLinked {
                slot: Slot::DEFAULT,
                interface: Interface::AudioSource
            })
        );
        assert!(!sender.is_slot_broken(Slot::DEFAULT));
    }

    #[test]
    fn test_drop_detaches() {
        let context = Context::open(&ContextConfig::default()).unwrap();
        let sender = Sender::open(&context, &config()).unwrap();
        assert_eq!(context.attached_peers(), 1);
        drop(sender);
        assert_eq!(context.attached_peers(), 0);
        context.close().unwrap();
    }
}
