use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::FakeConnection;
use anyhow::Result;
use murmur_core::{ChannelId, Envelope, Identity};

#[tokio::test]
async fn test_disconnect_leaves_every_channel() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = FakeConnection::connect(&coordinator, "alice").await?;
    let mut bob = FakeConnection::connect(&coordinator, "bob").await?;
    let mut carol = FakeConnection::connect(&coordinator, "carol").await?;

    bob.join("general").await?;
    carol.join("random").await?;
    alice.join("general").await?;
    alice.join("random").await?;
    bob.drain().await;
    carol.drain().await;

    alice.disconnect().await?;

    for (conn, channel) in [(&mut bob, "general"), (&mut carol, "random")] {
        match conn.recv().await? {
            Envelope::PeerLeft { from, channel_id } => {
                assert_eq!(from, Identity::from("alice"));
                assert_eq!(channel_id, ChannelId::from(channel));
            }
            other => panic!("expected peer-left, got {:?}", other.kind()),
        }
        assert!(conn.drain().await.is_empty());
    }

    let snapshot = coordinator.presence().await?;
    assert!(snapshot.values().all(|m| !m.contains(&Identity::from("alice"))));
    Ok(())
}

#[tokio::test]
async fn test_disconnected_identity_no_longer_receives() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let mut alice = FakeConnection::connect(&coordinator, "alice").await?;
    let bob = FakeConnection::connect(&coordinator, "bob").await?;

    alice.disconnect().await?;
    bob.send_raw(r#"{"type":"offer","to":"alice","payload":{}}"#)
        .await?;

    assert!(alice.drain().await.is_empty());
    Ok(())
}
