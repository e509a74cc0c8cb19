//! End-to-end session tests against a scripted fake relay.

mod common;

use common::{init_tracing, next_event, str_obj, FakeRelay};
use weerelay::proto::{Hdata, HdataEntry, Object, ObjectType, RelayMessage};
use weerelay::{connect, HandshakeMode, RelayEvent};

fn version_reply() -> RelayMessage {
    RelayMessage {
        id: "version".into(),
        objects: vec![Object::Info {
            name: "version".into(),
            value: Some("4.1.2".into()),
        }],
    }
}

fn buffer_listing(ptr: &str, full_name: &str) -> RelayMessage {
    RelayMessage {
        id: "listbuffers".into(),
        objects: vec![Object::Hdata(Hdata {
            path: vec!["buffer".into()],
            keys: vec![
                ("number".into(), ObjectType::Int),
                ("full_name".into(), ObjectType::Str),
                ("hidden".into(), ObjectType::Int),
            ],
            entries: vec![HdataEntry {
                pointers: vec![ptr.to_string()],
                fields: [
                    ("number".to_string(), Object::Int(1)),
                    ("full_name".to_string(), str_obj(full_name)),
                    ("hidden".to_string(), Object::Int(0)),
                ]
                .into_iter()
                .collect(),
            }],
        })],
    }
}

fn line_added(buffer: &str, line: &str, text: &str) -> RelayMessage {
    RelayMessage {
        id: "_buffer_line_added".into(),
        objects: vec![Object::Hdata(Hdata {
            path: vec!["line_data".into()],
            keys: vec![
                ("buffer".into(), ObjectType::Ptr),
                ("date".into(), ObjectType::Time),
                ("displayed".into(), ObjectType::Char),
                ("highlight".into(), ObjectType::Char),
                ("prefix".into(), ObjectType::Str),
                ("message".into(), ObjectType::Str),
                ("tags_array".into(), ObjectType::Array),
            ],
            entries: vec![HdataEntry {
                pointers: vec![line.to_string()],
                fields: [
                    ("buffer".to_string(), Object::Ptr(buffer.to_string())),
                    ("date".to_string(), Object::Time(1_700_000_000)),
                    ("displayed".to_string(), Object::Char(1)),
                    ("highlight".to_string(), Object::Char(0)),
                    ("prefix".to_string(), str_obj("alice")),
                    ("message".to_string(), str_obj(text)),
                    (
                        "tags_array".to_string(),
                        Object::Array(vec![str_obj("irc_privmsg"), str_obj("notify_message")]),
                    ),
                ]
                .into_iter()
                .collect(),
            }],
        })],
    }
}

#[tokio::test]
async fn test_legacy_login_sync_and_input() {
    init_tracing();
    let relay = FakeRelay::bind().await;
    let mut config = relay.config();
    config.handshake_mode = HandshakeMode::Legacy;

    let accept = tokio::spawn(relay.accept());
    let (handle, mut events) = connect(config).await.expect("connect");
    let mut relay = accept.await.expect("accept task");

    assert!(matches!(next_event(&mut events).await, RelayEvent::Connected));

    // Legacy login: clear-text init plus the version probe, one batch.
    assert_eq!(relay.read_line().await, "init password=pw");
    assert_eq!(relay.read_line().await, "(version) info version");
    relay.send(&version_reply()).await;

    assert!(matches!(next_event(&mut events).await, RelayEvent::LoggedIn));
    {
        let session = handle.session();
        let session = session.read();
        assert!(session.logged_in);
        assert_eq!(session.relay_version.as_deref(), Some("4.1.2"));
    }

    // Initial burst.
    let line = relay.read_until_prefix("(listbuffers)").await;
    assert!(line.contains("hdata buffer:gui_buffers(*)"));
    relay.read_until_prefix("(hotlist)").await;
    assert_eq!(relay.read_line().await, "(getoptions) infolist option");
    assert_eq!(relay.read_line().await, "sync");

    // Listing reply creates the buffer and triggers detail requests.
    relay.send(&buffer_listing("0xa", "irc.libera.#rust")).await;
    assert!(matches!(
        next_event(&mut events).await,
        RelayEvent::BufferListChanged
    ));
    relay.read_until_prefix("(listlines)").await;
    assert_eq!(relay.read_line().await, "(nicklist) nicklist 0xa");
    relay.read_until_prefix("(servers)").await;

    // A live line lands in the mirror and bumps the unread counter.
    relay.send(&line_added("0xa", "0x1", "hello there")).await;
    match next_event(&mut events).await {
        RelayEvent::MessageAdded { buffer, message } => {
            assert_eq!(buffer, "0xa");
            assert_eq!(message.text, "hello there");
            assert_eq!(message.nick, None);
        }
        other => panic!("expected MessageAdded, got {other:?}"),
    }
    {
        let session = handle.session();
        let session = session.read();
        let buffer = session.buffer("0xa").expect("mirrored buffer");
        assert_eq!(buffer.name, "libera.#rust");
        assert_eq!(buffer.messages.len(), 1);
        assert_eq!(buffer.unread, 1);
    }

    // Input goes out as typed text.
    handle.send_input("0xa", "hi!").await.expect("send input");
    assert_eq!(relay.read_until_prefix("input").await, "input 0xa hi!");

    handle.quit().await.expect("quit");
    assert_eq!(relay.read_until_prefix("quit").await, "quit");
}

#[tokio::test]
async fn test_modern_handshake_negotiates_sha256() {
    init_tracing();
    let relay = FakeRelay::bind().await;
    let config = relay.config();

    let accept = tokio::spawn(relay.accept());
    let (_handle, mut events) = connect(config).await.expect("connect");
    let mut relay = accept.await.expect("accept task");

    assert!(matches!(next_event(&mut events).await, RelayEvent::Connected));

    let line = relay.read_line().await;
    assert_eq!(
        line,
        "(handshake) handshake password_hash_algo=\
         plain:sha256:sha512:pbkdf2+sha256:pbkdf2+sha512"
    );

    let server_nonce = "85b1ee00695a5b254e14f4885538df0d";
    relay
        .send(&RelayMessage {
            id: "handshake".into(),
            objects: vec![Object::Hashtable(vec![
                (str_obj("password_hash_algo"), str_obj("sha256")),
                (str_obj("nonce"), str_obj(server_nonce)),
                (str_obj("totp"), str_obj("off")),
            ])],
        })
        .await;

    // The salt starts with the server nonce; the rest is the random
    // client nonce and the digest.
    let init = relay.read_line().await;
    let prefix = format!("init password_hash=sha256:{server_nonce}");
    assert!(
        init.starts_with(&prefix),
        "unexpected init line: {init}"
    );
    assert_eq!(relay.read_line().await, "(version) info version");
}

#[tokio::test]
async fn test_relay_disconnect_surfaces_connection_lost() {
    init_tracing();
    let relay = FakeRelay::bind().await;
    let mut config = relay.config();
    config.handshake_mode = HandshakeMode::Legacy;

    let accept = tokio::spawn(relay.accept());
    let (handle, mut events) = connect(config).await.expect("connect");
    let relay = accept.await.expect("accept task");

    assert!(matches!(next_event(&mut events).await, RelayEvent::Connected));
    drop(relay);

    assert!(matches!(
        next_event(&mut events).await,
        RelayEvent::ConnectionLost { .. }
    ));
    assert!(!handle.session().read().connected);
    assert!(handle.is_closed());
}
