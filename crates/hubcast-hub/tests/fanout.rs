use std::time::Duration;

use bytes::Bytes;
use hubcast_core::{HeartbeatPolicy, Payload};
use hubcast_hub::memory::{MemoryConnection, MemoryPeer};
use hubcast_hub::{
    outbound_queue, spawn_client, ClientSettings, ClientTasks, Frame, Hub, HubHandle, Member,
    ReadExit,
};
use tokio_util::sync::CancellationToken;

fn connect(hub: &HubHandle, name: &str, settings: &ClientSettings) -> (ClientTasks, MemoryPeer) {
    let (conn, peer) = MemoryConnection::pair(true);
    let tasks = spawn_client(hub, name, conn, settings, CancellationToken::new()).unwrap();
    (tasks, peer)
}

async fn expect_line(peer: &mut MemoryPeer, expected: &str) {
    let line = tokio::time::timeout(Duration::from_secs(5), peer.next_line())
        .await
        .expect("timed out waiting for a line");
    assert_eq!(line.as_deref(), Some(expected));
}

#[tokio::test]
async fn slow_member_is_evicted_silently() {
    let hub = Hub::spawn();
    let settings = ClientSettings::default();

    let (_alice, mut alice) = connect(&hub, "Alice", &settings);

    // Bob never reads, and only has room for two payloads.
    let (bob_tx, mut bob_rx) = outbound_queue(2);
    hub.register(Member::new("Bob", bob_tx)).unwrap();
    expect_line(&mut alice, "[system] Bob joined").await;

    let (_carol, mut carol) = connect(&hub, "Carol", &settings);
    expect_line(&mut alice, "[system] Carol joined").await;

    alice.say("hi");
    expect_line(&mut carol, "Alice: hi").await;

    carol.say("yo");
    expect_line(&mut alice, "Carol: yo").await;

    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.clients, 2);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.leaves, 0);

    assert_eq!(bob_rx.recv().await, Some(Payload::from("[system] Carol joined")));
    assert_eq!(bob_rx.recv().await, Some(Payload::from("Alice: hi")));
    assert_eq!(bob_rx.recv().await, None);

    // nobody was told Bob left
    hub.notify("marker").unwrap();
    expect_line(&mut alice, "[system] marker").await;
    expect_line(&mut carol, "[system] marker").await;
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_order() {
    let hub = Hub::spawn();
    let settings = ClientSettings::default();
    let (_bob, mut bob) = connect(&hub, "Bob", &settings);
    let (_alice, alice) = connect(&hub, "Alice", &settings);
    expect_line(&mut bob, "[system] Alice joined").await;

    for i in 0..50 {
        alice.say(&format!("m{i}"));
    }
    for i in 0..50 {
        expect_line(&mut bob, &format!("Alice: m{i}")).await;
    }
}

#[tokio::test]
async fn sender_does_not_hear_itself() {
    let hub = Hub::spawn();
    let settings = ClientSettings::default();
    let (_alice, mut alice) = connect(&hub, "Alice", &settings);
    let (_bob, mut bob) = connect(&hub, "Bob", &settings);
    expect_line(&mut alice, "[system] Bob joined").await;

    alice.say("echo?");
    expect_line(&mut bob, "Alice: echo?").await;

    hub.notify("marker").unwrap();
    expect_line(&mut alice, "[system] marker").await;
}

#[tokio::test]
async fn malformed_messages_are_dropped() {
    let hub = Hub::spawn();
    let settings = ClientSettings::default();
    let (_bob, mut bob) = connect(&hub, "Bob", &settings);
    let (_alice, alice) = connect(&hub, "Alice", &settings);
    expect_line(&mut bob, "[system] Alice joined").await;

    alice.say("   ");
    alice.send_frame(Frame::Data(Bytes::from_static(&[0xff, 0xfe])));
    alice.say("still here");

    expect_line(&mut bob, "Alice: still here").await;
    assert_eq!(hub.stats().await.unwrap().clients, 2);
}

#[tokio::test]
async fn hang_up_announces_departure() {
    let hub = Hub::spawn();
    let settings = ClientSettings::default();
    let (_alice, mut alice) = connect(&hub, "Alice", &settings);
    let (bob_tasks, mut bob) = connect(&hub, "Bob", &settings);
    expect_line(&mut alice, "[system] Bob joined").await;

    bob.hang_up();
    let (read, _) = bob_tasks.wait().await;
    assert_eq!(read, ReadExit::PeerClosed);

    expect_line(&mut alice, "[system] Bob left").await;
    assert_eq!(bob.next_line().await, None);
}

#[tokio::test]
async fn cancelling_the_root_token_empties_the_hub() {
    let hub = Hub::spawn();
    let settings = ClientSettings::default();
    let root = CancellationToken::new();

    let mut tasks = Vec::new();
    let mut peers = Vec::new();
    for name in ["a", "b", "c"] {
        let (conn, peer) = MemoryConnection::pair(true);
        tasks.push(spawn_client(&hub, name, conn, &settings, root.child_token()).unwrap());
        peers.push(peer);
    }
    assert_eq!(hub.stats().await.unwrap().clients, 3);

    root.cancel();
    for t in tasks {
        assert_eq!(t.wait().await.0, ReadExit::Cancelled);
    }
    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.clients, 0);
    assert_eq!(stats.leaves, 3);
}

#[tokio::test(start_paused = true)]
async fn unresponsive_client_is_dropped_and_announced() {
    let hub = Hub::spawn();
    let settings = ClientSettings {
        heartbeat: HeartbeatPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(3),
            Duration::from_secs(1),
        )
        .unwrap(),
        ..ClientSettings::default()
    };

    let (_steady, mut steady) = connect(&hub, "steady", &settings);

    let (conn, _ghost_peer) = MemoryConnection::pair(false);
    let ghost = spawn_client(&hub, "ghost", conn, &settings, CancellationToken::new()).unwrap();

    expect_line(&mut steady, "[system] ghost joined").await;
    assert_eq!(ghost.wait().await.0, ReadExit::Dead);
    expect_line(&mut steady, "[system] ghost left").await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    let members = hub.members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "steady");
    assert!(steady.pings() > 0);
}
