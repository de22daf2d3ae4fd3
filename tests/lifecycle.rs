//! Context and peer lifecycle, checked against a recording engine

mod common;

use std::sync::Arc;

use audio_peer_session::{
    Context, ContextConfig, Endpoint, Error, Interface, InterfaceConfig, MediaEncoding, Receiver,
    Sender, Slot,
};
use common::{receiver_config, sender_config, spy_context, RogueEngine};

#[test]
fn test_context_busy_until_peers_close() {
    let (_spy, context) = spy_context();
    let sender = Sender::open(&context, &sender_config()).unwrap();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    assert_eq!(context.attached_peers(), 2);

    assert_eq!(context.close(), Err(Error::ResourceBusy(2)));
    assert!(!context.is_closed());

    sender.close().unwrap();
    assert_eq!(context.close(), Err(Error::ResourceBusy(1)));

    receiver.close().unwrap();
    context.close().unwrap();
    assert!(context.is_closed());
}

#[test]
fn test_busy_close_does_not_reach_engine() {
    let (spy, context) = spy_context();
    let _sender = Sender::open(&context, &sender_config()).unwrap();
    spy.reset();

    assert!(matches!(context.close(), Err(Error::ResourceBusy(1))));
    assert_eq!(spy.count("context_close"), 0);
}

#[test]
fn test_closed_context_is_fenced() {
    let (spy, context) = spy_context();
    context.close().unwrap();
    spy.reset();

    assert_eq!(
        context.register_encoding(100, &MediaEncoding::stereo(48000)),
        Err(Error::ContextClosed)
    );
    assert!(matches!(Sender::open(&context, &sender_config()), Err(Error::ContextClosed)));
    assert!(matches!(Receiver::open(&context, &receiver_config()), Err(Error::ContextClosed)));
    context.close().unwrap();

    assert_eq!(spy.call_count(), 0, "unexpected engine calls: {:?}", spy.calls());
}

#[test]
fn test_closed_sender_is_fenced() {
    let (spy, context) = spy_context();
    let sender = Sender::open(&context, &sender_config()).unwrap();
    sender.close().unwrap();
    assert!(sender.is_closed());
    spy.reset();

    let endpoint = Endpoint::parse("rtp+rs8m://127.0.0.1:10600").unwrap();
    let frame = [0.5f32; 4];

    assert_eq!(
        sender.configure(Slot::DEFAULT, Interface::AudioSource, &InterfaceConfig::default()),
        Err(Error::PeerClosed)
    );
    assert_eq!(sender.connect(Slot::DEFAULT, Interface::AudioSource, &endpoint), Err(Error::PeerClosed));
    assert_eq!(sender.connect(Slot::DEFAULT, Interface::AudioSource, None), Err(Error::PeerClosed));
    assert_eq!(sender.unlink(Slot::DEFAULT), Err(Error::PeerClosed));
    assert_eq!(sender.write_frame(&frame[..]), Err(Error::PeerClosed));
    assert_eq!(sender.write_frame(None), Err(Error::PeerClosed));
    sender.close().unwrap();

    assert_eq!(spy.call_count(), 0, "unexpected engine calls: {:?}", spy.calls());
    assert_eq!(context.attached_peers(), 0);
}

#[test]
fn test_closed_receiver_is_fenced() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    receiver.close().unwrap();
    spy.reset();

    let mut endpoint = Endpoint::parse("rtp://127.0.0.1:0").unwrap();
    let mut frame = [0.0f32; 4];

    assert_eq!(
        receiver.configure(Slot::DEFAULT, Interface::AudioSource, &InterfaceConfig::default()),
        Err(Error::PeerClosed)
    );
    assert_eq!(
        receiver.bind(Slot::DEFAULT, Interface::AudioSource, &mut endpoint),
        Err(Error::PeerClosed)
    );
    assert_eq!(receiver.unlink(Slot(1)), Err(Error::PeerClosed));
    assert_eq!(receiver.read_frame(&mut frame[..]), Err(Error::PeerClosed));
    receiver.close().unwrap();

    assert_eq!(spy.call_count(), 0, "unexpected engine calls: {:?}", spy.calls());
    assert_eq!(endpoint.port, 0);
}

#[test]
fn test_close_is_idempotent() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();

    receiver.close().unwrap();
    receiver.close().unwrap();
    drop(receiver);
    assert_eq!(spy.count("peer_close"), 1);

    context.close().unwrap();
    context.close().unwrap();
    assert_eq!(spy.count("context_close"), 1);
}

#[test]
fn test_frame_edge_cases() {
    let (spy, context) = spy_context();
    let sender = Sender::open(&context, &sender_config()).unwrap();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    spy.reset();

    assert_eq!(sender.write_frame(None), Err(Error::FrameNil));
    assert_eq!(receiver.read_frame(None), Err(Error::FrameNil));

    let empty: [f32; 0] = [];
    sender.write_frame(&empty[..]).unwrap();
    let mut empty_mut: [f32; 0] = [];
    receiver.read_frame(&mut empty_mut[..]).unwrap();
    assert_eq!(spy.call_count(), 0);

    // stereo frames need an even sample count
    let odd = [0.1f32; 3];
    assert_eq!(
        sender.write_frame(&odd[..]),
        Err(Error::Engine { op: "frame_write", code: -1 })
    );
    let mut odd_mut = [0.0f32; 5];
    assert_eq!(
        receiver.read_frame(&mut odd_mut[..]),
        Err(Error::Engine { op: "frame_read", code: -1 })
    );
    assert_eq!(spy.calls(), vec!["frame_write", "frame_read"]);
}

#[test]
fn test_nil_arguments() {
    let (spy, context) = spy_context();
    spy.reset();
    assert!(matches!(Sender::open(None, &sender_config()), Err(Error::ContextNil)));
    assert!(matches!(Receiver::open(None, &receiver_config()), Err(Error::ContextNil)));
    assert_eq!(spy.call_count(), 0);

    let sender = Sender::open(&context, &sender_config()).unwrap();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    spy.reset();
    assert_eq!(sender.connect(Slot::DEFAULT, Interface::AudioSource, None), Err(Error::EndpointNil));
    assert_eq!(receiver.bind(Slot::DEFAULT, Interface::AudioSource, None), Err(Error::EndpointNil));
    assert_eq!(spy.call_count(), 0);
}

#[test]
fn test_invalid_strings_stop_before_engine() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    spy.reset();

    let config = InterfaceConfig {
        multicast_group: "239.0.0.1\0".into(),
        ..Default::default()
    };
    assert_eq!(
        receiver.configure(Slot::DEFAULT, Interface::AudioSource, &config),
        Err(Error::InvalidString { field: "multicast_group" })
    );

    let mut endpoint = Endpoint::parse("rtp://127.0.0.1:0").unwrap();
    endpoint.host.push('\0');
    assert_eq!(
        receiver.bind(Slot::DEFAULT, Interface::AudioSource, &mut endpoint),
        Err(Error::InvalidString { field: "host" })
    );

    assert_eq!(spy.call_count(), 0);
    assert!(!receiver.is_slot_broken(Slot::DEFAULT));
}

#[test]
fn test_engine_failure_breaks_slot() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();

    // rtcp belongs to the control interface
    let mut control = Endpoint::parse("rtcp://127.0.0.1:0").unwrap();
    let err = receiver.bind(Slot(2), Interface::AudioSource, &mut control).unwrap_err();
    assert_eq!(err, Error::Engine { op: "peer_bind", code: -1 });
    assert!(receiver.is_slot_broken(Slot(2)));

    spy.reset();
    let config = InterfaceConfig::default();
    assert_eq!(
        receiver.configure(Slot(2), Interface::AudioControl, &config),
        Err(Error::SlotBroken(Slot(2)))
    );
    assert_eq!(
        receiver.bind(Slot(2), Interface::AudioControl, &mut control),
        Err(Error::SlotBroken(Slot(2)))
    );
    assert_eq!(spy.call_count(), 0);

    receiver.unlink(Slot(2)).unwrap();
    receiver.bind(Slot(2), Interface::AudioControl, &mut control).unwrap();
    assert!(control.port > 0);
}

#[test]
fn test_rejected_configure_breaks_slot() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    let config = InterfaceConfig {
        multicast_group: "not-an-ip".to_string(),
        ..Default::default()
    };

    assert_eq!(
        receiver.configure(Slot(2), Interface::AudioSource, &config),
        Err(Error::Engine { op: "peer_configure", code: -1 })
    );
    assert!(receiver.is_slot_broken(Slot(2)));

    // every interface of the slot is unusable, not only the configured one
    spy.reset();
    let mut repair = Endpoint::parse("rs8m://127.0.0.1:0").unwrap();
    assert_eq!(
        receiver.bind(Slot(2), Interface::AudioRepair, &mut repair),
        Err(Error::SlotBroken(Slot(2)))
    );
    let mut source = Endpoint::parse("rtp://127.0.0.1:0").unwrap();
    assert_eq!(
        receiver.bind(Slot(2), Interface::AudioSource, &mut source),
        Err(Error::SlotBroken(Slot(2)))
    );
    assert_eq!(spy.call_count(), 0);

    receiver.unlink(Slot(2)).unwrap();
    assert!(!receiver.is_slot_broken(Slot(2)));
    receiver.bind(Slot(2), Interface::AudioSource, &mut source).unwrap();
    assert!(source.port > 0);
}

#[test]
fn test_consolidated_is_exclusive() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();

    let mut source = Endpoint::parse("rtp://127.0.0.1:0").unwrap();
    receiver.bind(Slot::DEFAULT, Interface::AudioSource, &mut source).unwrap();
    spy.reset();

    let mut rtsp = Endpoint::parse("rtsp://127.0.0.1:0").unwrap();
    assert_eq!(
        receiver.bind(Slot::DEFAULT, Interface::Consolidated, &mut rtsp),
        Err(Error::InterfaceConflict {
            slot: Slot::DEFAULT,
            interface: Interface::Consolidated
        })
    );
    assert_eq!(spy.call_count(), 0);
    assert!(!receiver.is_slot_broken(Slot::DEFAULT));
}

#[test]
fn test_register_encoding_for_sender() {
    let (_spy, context) = spy_context();
    let mut config = sender_config();
    config.packet_encoding = Some(audio_peer_session::PacketEncoding::Registered(120));

    assert_eq!(
        Sender::open(&context, &config).unwrap_err(),
        Error::Engine { op: "peer_open", code: -1 }
    );

    context.register_encoding(120, &MediaEncoding::stereo(44100)).unwrap();
    let sender = Sender::open(&context, &config).unwrap();
    sender.close().unwrap();
}

#[test]
fn test_context_outlives_its_handle_owner() {
    let (spy, context) = spy_context();
    let receiver = Receiver::open(&context, &receiver_config()).unwrap();
    drop(context);

    // the receiver keeps the context alive
    assert_eq!(spy.inner().context_count(), 1);
    assert!(!receiver.context().is_closed());

    drop(receiver);
    assert_eq!(spy.inner().peer_count(), 0);
    assert_eq!(spy.inner().context_count(), 0);
}

#[test]
#[should_panic(expected = "outside of the engine contract")]
fn test_contract_violation_panics() {
    let context = Context::with_engine(Arc::new(RogueEngine::default()), &ContextConfig::default()).unwrap();
    let _ = Sender::open(&context, &sender_config());
}
