//! End-to-end tests: a real relay server, real sockets, real clients.

use edito_collab::client::{ClientEvent, CollabClient};
use edito_collab::protocol::{Message, MessageType, WireOperation};
use edito_collab::server::{CollabServer, ServerConfig};
use edito_crdt::Document;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Find a free port for testing.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a relay on a free port, return the port.
async fn start_test_server() -> u16 {
    let port = free_port().await;
    let config = ServerConfig {
        addr: format!("127.0.0.1:{port}"),
        ..ServerConfig::default()
    };
    tokio::spawn(async move {
        CollabServer::new(config).run().await.unwrap();
    });
    // Give the listener time to bind.
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

async fn connect(port: u16) -> (CollabClient, mpsc::Receiver<ClientEvent>) {
    let mut client = CollabClient::connect(&format!("127.0.0.1:{port}"))
        .await
        .expect("client should connect");
    let events = client.take_events().unwrap();
    (client, events)
}

/// Drain events until one matches, failing after two seconds.
async fn next_matching(
    events: &mut mpsc::Receiver<ClientEvent>,
    pred: impl Fn(&Message) -> bool,
) -> Message {
    let deadline = Duration::from_secs(2);
    loop {
        match timeout(deadline, events.recv()).await {
            Ok(Some(ClientEvent::Message(msg))) if pred(&msg) => return msg,
            Ok(Some(_)) => continue,
            Ok(None) => panic!("event stream ended while waiting"),
            Err(_) => panic!("timed out waiting for matching message"),
        }
    }
}

async fn next_of_kind(events: &mut mpsc::Receiver<ClientEvent>, kind: MessageType) -> Message {
    next_matching(events, |m| m.kind == kind).await
}

/// Assert that no message of the given kind arrives within 300ms.
async fn assert_none_of_kind(events: &mut mpsc::Receiver<ClientEvent>, kind: MessageType) {
    let window = Duration::from_millis(300);
    let all = async {
        while let Some(event) = events.recv().await {
            if let ClientEvent::Message(msg) = event {
                assert_ne!(msg.kind, kind, "unexpected {kind:?} frame: {msg:?}");
            }
        }
    };
    let _ = timeout(window, all).await;
}

#[tokio::test]
async fn test_site_ids_assigned_in_connect_order() {
    let port = start_test_server().await;

    let (_c1, mut e1) = connect(port).await;
    let site1 = next_of_kind(&mut e1, MessageType::SiteId).await;
    assert_eq!(site1.text, "0");

    let (_c2, mut e2) = connect(port).await;
    let site2 = next_of_kind(&mut e2, MessageType::SiteId).await;
    assert_eq!(site2.text, "1");
}

#[tokio::test]
async fn test_newcomer_receives_snapshot_from_existing_peer() {
    let port = start_test_server().await;

    let (c1, mut e1) = connect(port).await;
    next_of_kind(&mut e1, MessageType::SiteId).await;

    let (_c2, mut e2) = connect(port).await;

    // The relay solicits a snapshot from the only existing peer, on the
    // newcomer's behalf.
    let req = next_of_kind(&mut e1, MessageType::DocReq).await;
    assert_ne!(req.id, uuid::Uuid::nil());

    // First peer replies with its document, addressed by the request ID.
    let mut doc = Document::with_site(0);
    for (i, ch) in "hello".chars().enumerate() {
        doc.generate_insert(i + 1, ch.to_string()).unwrap();
    }
    c1.send(Message::doc_sync(doc, req.id)).await.unwrap();

    let sync = next_of_kind(&mut e2, MessageType::DocSync).await;
    assert_eq!(sync.document.unwrap().content(), "hello");
}

#[tokio::test]
async fn test_operations_fan_out_to_everyone_but_sender() {
    let port = start_test_server().await;

    let (_c1, mut e1) = connect(port).await;
    next_of_kind(&mut e1, MessageType::SiteId).await;
    let (c2, mut e2) = connect(port).await;
    next_of_kind(&mut e2, MessageType::SiteId).await;
    let (_c3, mut e3) = connect(port).await;
    next_of_kind(&mut e3, MessageType::SiteId).await;

    c2.send(Message::operation(WireOperation::insert(1, "a")))
        .await
        .unwrap();

    for events in [&mut e1, &mut e3] {
        let msg = next_of_kind(events, MessageType::Operation).await;
        let op = msg.operation.unwrap();
        assert_eq!(op.position, 1);
        assert_eq!(op.value, "a");
    }
    assert_none_of_kind(&mut e2, MessageType::Operation).await;
}

#[tokio::test]
async fn test_join_renames_and_announces() {
    let port = start_test_server().await;

    let (c1, mut e1) = connect(port).await;
    next_of_kind(&mut e1, MessageType::SiteId).await;
    let (_c2, mut e2) = connect(port).await;
    next_of_kind(&mut e2, MessageType::SiteId).await;

    c1.send(Message::join("Alice")).await.unwrap();

    // The other peer sees the announcement; the sender does not.
    let join = next_of_kind(&mut e2, MessageType::Join).await;
    assert_eq!(join.username, "Alice");
    assert_eq!(join.text, "has joined.");

    // Everyone, sender included, gets the refreshed roster.
    let roster = next_matching(&mut e1, |m| {
        m.kind == MessageType::Users && m.text.contains("Alice")
    })
    .await;
    assert!(roster.text.split(',').any(|name| name == "Alice"));
    next_matching(&mut e2, |m| {
        m.kind == MessageType::Users && m.text.contains("Alice")
    })
    .await;
    assert_none_of_kind(&mut e1, MessageType::Join).await;
}

#[tokio::test]
async fn test_unrecognised_kind_triggers_presence_rebroadcast() {
    let port = start_test_server().await;

    let (c1, mut e1) = connect(port).await;
    next_of_kind(&mut e1, MessageType::SiteId).await;
    // Drain the onboarding roster so the next users frame is the answer.
    next_of_kind(&mut e1, MessageType::Users).await;

    c1.send(Message {
        kind: MessageType::Unknown,
        ..Message::default()
    })
    .await
    .unwrap();

    next_of_kind(&mut e1, MessageType::Users).await;
}

#[tokio::test]
async fn test_disconnect_refreshes_presence() {
    let port = start_test_server().await;

    let (c1, mut e1) = connect(port).await;
    next_of_kind(&mut e1, MessageType::SiteId).await;
    let (c2, mut e2) = connect(port).await;
    next_of_kind(&mut e2, MessageType::SiteId).await;

    c2.send(Message::join("Bob")).await.unwrap();
    next_matching(&mut e1, |m| {
        m.kind == MessageType::Users && m.text.contains("Bob")
    })
    .await;

    // Bob leaves; everyone left gets a roster without him.
    drop(c2);
    drop(e2);
    next_matching(&mut e1, |m| {
        m.kind == MessageType::Users && !m.text.contains("Bob")
    })
    .await;

    // The remaining peer can still talk to the relay.
    c1.send(Message::join("Alice")).await.unwrap();
    next_matching(&mut e1, |m| {
        m.kind == MessageType::Users && m.text.contains("Alice")
    })
    .await;
}
