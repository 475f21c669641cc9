//! Remote control session against an in-process TV.

mod common;

use atvremote_protocol::remote::{KeyCode, RemoteEvent, RemoteSession};
use atvremote_protocol::wire::{MessageDecoder, MessageEncoder, WireType};
use atvremote_protocol::{ClientConfig, IdentityStore, TVDevice};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

const EVENT_WAIT: Duration = Duration::from_secs(30);

fn top_level_field(frame: &[u8]) -> u32 {
    let mut decoder = MessageDecoder::new(frame);
    let (field, wire_type) = decoder.read_tag().unwrap();
    assert_eq!(wire_type, WireType::LengthDelimited);
    field
}

#[tokio::test]
async fn test_remote_session_startup_ping_and_keys() {
    let dir = TempDir::new().unwrap();
    let store = IdentityStore::open_dir(dir.path()).unwrap();
    store.get_or_create_identity().unwrap();

    let (tv_rsa, tv_cert) = common::tv_credentials();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control_port = listener.local_addr().unwrap().port();
    let acceptor = common::tv_acceptor(&tv_rsa, &tv_cert);

    let tv = tokio::spawn(async move {
        let mut stream = common::accept_tls(&listener, &acceptor).await;
        let mut buf = Vec::new();

        // startup sequence arrives in order: configure, then set-active
        let configure = common::read_frame(&mut stream, &mut buf).await.unwrap();
        assert_eq!(top_level_field(&configure), 7);
        let set_active = common::read_frame(&mut stream, &mut buf).await.unwrap();
        assert_eq!(top_level_field(&set_active), 8);

        // liveness: ping 12345 must come back as pong 12345
        let mut ping_payload = MessageEncoder::new();
        ping_payload.add_varint(1, 12345);
        let mut ping = MessageEncoder::new();
        ping.add_message(10, ping_payload);
        common::write_frame(&mut stream, &ping.into_bytes()).await;

        let mut expected_pong = MessageEncoder::new();
        let mut pong_payload = MessageEncoder::new();
        pong_payload.add_varint(1, 12345);
        expected_pong.add_message(11, pong_payload);
        let expected_pong = expected_pong.into_bytes();

        // the pong may interleave with the key presses, but the keys keep
        // their order relative to each other
        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.push(common::read_frame(&mut stream, &mut buf).await.unwrap());
        }
        let pongs: Vec<_> = frames.iter().filter(|f| **f == expected_pong).collect();
        assert_eq!(pongs.len(), 1, "expected exactly one pong in {:?}", frames);

        let keys: Vec<_> = frames.iter().filter(|f| **f != expected_pong).collect();
        // RemoteKeyInject with SHORT direction: UP, then VOLUME_DOWN
        assert_eq!(*keys[0], vec![0x12, 0x04, 0x08, 0x13, 0x10, 0x03]);
        assert_eq!(*keys[1], vec![0x12, 0x04, 0x08, 0x19, 0x10, 0x03]);
    });

    let device = TVDevice::new("Loopback TV", "127.0.0.1", control_port);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let session = RemoteSession::connect(device, &store, &ClientConfig::default(), event_tx)
        .await
        .unwrap();

    assert!(session.is_connected());
    let event = timeout(EVENT_WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert!(matches!(event, RemoteEvent::Connected));

    session.send_command(KeyCode::DpadUp);
    session.send_command(KeyCode::VolumeDown);

    tv.await.unwrap();
    session.disconnect().await;
}

#[tokio::test]
async fn test_session_reports_disconnect_when_tv_closes() {
    let dir = TempDir::new().unwrap();
    let store = IdentityStore::open_dir(dir.path()).unwrap();
    store.get_or_create_identity().unwrap();

    let (tv_rsa, tv_cert) = common::tv_credentials();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control_port = listener.local_addr().unwrap().port();
    let acceptor = common::tv_acceptor(&tv_rsa, &tv_cert);

    let tv = tokio::spawn(async move {
        let mut stream = common::accept_tls(&listener, &acceptor).await;
        let mut buf = Vec::new();
        let _ = common::read_frame(&mut stream, &mut buf).await.unwrap();
        let _ = common::read_frame(&mut stream, &mut buf).await.unwrap();
        // drop the connection without warning
    });

    let device = TVDevice::new("Loopback TV", "127.0.0.1", control_port);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let session = RemoteSession::connect(device, &store, &ClientConfig::default(), event_tx)
        .await
        .unwrap();
    tv.await.unwrap();

    // Connected, then Disconnected with a reason once the TV goes away
    let event = timeout(EVENT_WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert!(matches!(event, RemoteEvent::Connected));
    let event = timeout(EVENT_WAIT, event_rx.recv()).await.unwrap().unwrap();
    match event {
        RemoteEvent::Disconnected { reason } => assert!(reason.is_some()),
        other => panic!("expected disconnect, got {:?}", other),
    }

    assert!(!session.is_connected());
    // dropped silently at the session boundary
    session.send_command(KeyCode::Home);
}
