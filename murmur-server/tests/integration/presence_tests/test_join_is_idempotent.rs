use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::FakeConnection;
use anyhow::Result;
use murmur_core::{ChannelId, Envelope, Identity};

#[tokio::test]
async fn test_repeated_join_broadcasts_once() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let mut alice = FakeConnection::connect(&coordinator, "alice").await?;
    let mut bob = FakeConnection::connect(&coordinator, "bob").await?;

    alice.join("general").await?;
    bob.join("general").await?;
    bob.join("general").await?;
    bob.join("general").await?;

    let frames = alice.drain().await;
    assert_eq!(frames.len(), 1, "expected a single peer-joined, got {:?}", frames);

    let announced = first_envelope(frames)?;
    match announced {
        Envelope::PeerJoined { from, channel_id } => {
            assert_eq!(from, Identity::from("bob"));
            assert_eq!(channel_id, ChannelId::from("general"));
        }
        other => panic!("expected peer-joined, got {:?}", other.kind()),
    }

    // The joiner is not told about existing members.
    assert!(bob.drain().await.is_empty());

    let snapshot = coordinator.presence().await?;
    assert_eq!(snapshot[&ChannelId::from("general")].len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_first_member_receives_nothing() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let mut alice = FakeConnection::connect(&coordinator, "alice").await?;
    alice.join("general").await?;

    assert!(alice.drain().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_channels_are_isolated() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let mut alice = FakeConnection::connect(&coordinator, "alice").await?;
    let bob = FakeConnection::connect(&coordinator, "bob").await?;

    alice.join("general").await?;
    bob.join("random").await?;

    assert!(alice.drain().await.is_empty());

    let snapshot = coordinator.presence().await?;
    assert_eq!(snapshot.len(), 2);
    Ok(())
}

fn first_envelope(frames: Vec<murmur_server::Outbound>) -> Result<Envelope> {
    match frames.into_iter().next() {
        Some(murmur_server::Outbound::Envelope(text)) => Ok(Envelope::from_json(&text)?),
        other => anyhow::bail!("expected an envelope frame, got {:?}", other),
    }
}
