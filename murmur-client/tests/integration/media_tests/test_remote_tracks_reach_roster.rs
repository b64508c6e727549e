use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{MESH_TIMEOUT_MS, TestPeer, TestPeerConfig, wait_for_full_mesh};
use anyhow::Result;
use murmur_client::{MediaKind, SyntheticCapture};
use murmur_core::ChannelId;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_incoming_tracks_are_keyed_by_sender() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();
    let channel = ChannelId::from("general");

    let alice = TestPeer::spawn_with(
        &coordinator,
        "alice",
        TestPeerConfig {
            capture: SyntheticCapture::new(),
            ..TestPeerConfig::default()
        },
    )
    .await?;
    alice.handle.join_channel("general").await?;
    let bob = TestPeer::spawn(&coordinator, "bob").await?;
    bob.handle.join_channel("general").await?;

    let peers = vec![alice, bob];
    wait_for_full_mesh(&peers, "general").await?;
    let (alice, bob) = (&peers[0], &peers[1]);

    alice.handle.start_video().await?;

    let has_both = |kinds: &[MediaKind]| {
        kinds.contains(&MediaKind::Audio) && kinds.contains(&MediaKind::Video)
    };
    let roster = bob
        .wait_for_roster(MESH_TIMEOUT_MS, |r| {
            r.peer(&channel, &alice.identity).is_some_and(|view| {
                let kinds: Vec<MediaKind> = view.remote_tracks.iter().map(|t| t.kind).collect();
                has_both(&kinds)
            })
        })
        .await?;

    let view = roster.peer(&channel, &alice.identity).expect("link to alice");
    assert_eq!(view.remote_tracks.len(), 2);
    assert!(view.remote_tracks.iter().all(|t| !t.track_id.is_empty()));

    // Bob sends nothing, so alice has nothing to render.
    let alice_view = alice.roster().peer(&channel, &bob.identity).cloned().expect("link to bob");
    assert!(alice_view.remote_tracks.is_empty());
    Ok(())
}
