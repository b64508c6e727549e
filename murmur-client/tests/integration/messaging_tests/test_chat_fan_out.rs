use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{MESH_TIMEOUT_MS, join_mesh, wait_for_full_mesh};
use anyhow::Result;
use murmur_client::ChatMessage;
use murmur_core::ChannelId;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_message_reaches_every_connected_peer() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let peers = join_mesh(&coordinator, "general", &["alice", "bob", "carol"]).await?;
    wait_for_full_mesh(&peers, "general").await?;
    let (alice, bob, carol) = (&peers[0], &peers[1], &peers[2]);

    let delivered = alice.handle.send_message("general", "hello mesh").await?;
    assert_eq!(delivered, 2);

    for receiver in [bob, carol] {
        assert!(
            receiver
                .behavior
                .wait_until(MESH_TIMEOUT_MS, |events| events.len() >= 3)
                .await
        );
        assert_eq!(
            receiver.behavior.messages_from(&alice.identity).await,
            vec!["hello mesh".to_owned()]
        );
    }
    assert!(alice.behavior.messages_from(&alice.identity).await.is_empty());

    // The durable copy goes to the author's store, once.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        alice.store.stored().await,
        vec![ChatMessage {
            channel_id: ChannelId::from("general"),
            author: alice.identity.clone(),
            content: "hello mesh".into(),
        }]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_messages_from_one_peer_arrive_in_order() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let peers = join_mesh(&coordinator, "general", &["alice", "bob"]).await?;
    wait_for_full_mesh(&peers, "general").await?;
    let (alice, bob) = (&peers[0], &peers[1]);

    let sent: Vec<String> = (0..20).map(|i| format!("msg-{i}")).collect();
    for text in &sent {
        alice.handle.send_message("general", text.clone()).await?;
    }

    assert!(
        bob.behavior
            .wait_until(MESH_TIMEOUT_MS, |events| events.len() > sent.len())
            .await
    );
    assert_eq!(bob.behavior.messages_from(&alice.identity).await, sent);
    Ok(())
}

#[tokio::test]
async fn test_message_without_peers_is_not_an_error() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let peers = join_mesh(&coordinator, "general", &["alice"]).await?;

    let delivered = peers[0].handle.send_message("general", "anyone?").await?;
    assert_eq!(delivered, 0);
    Ok(())
}
