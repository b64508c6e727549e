use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{MESH_TIMEOUT_MS, join_mesh, wait_for_full_mesh};
use anyhow::Result;
use murmur_core::ChannelId;
use std::sync::atomic::Ordering;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_closing_one_link_keeps_shared_capture() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();
    let channel = ChannelId::from("general");

    let peers = join_mesh(&coordinator, "general", &["alice", "bob", "carol"]).await?;
    wait_for_full_mesh(&peers, "general").await?;
    let (alice, bob, carol) = (&peers[0], &peers[1], &peers[2]);

    alice.handle.start_video().await?;
    let opened = alice.capture.opened().await;
    assert_eq!(opened.len(), 1);
    let released = opened[0].1.clone();

    let roster = alice.roster();
    for remote in [bob, carol] {
        let view = roster.peer(&channel, &remote.identity).expect("link present");
        assert!(view.outgoing_audio.is_some() && view.outgoing_video.is_some());
    }

    carol.handle.leave_channel("general").await?;
    alice
        .wait_for_roster(MESH_TIMEOUT_MS, |r| r.peer(&channel, &carol.identity).is_none())
        .await?;

    // Bob still receives the same capture.
    assert!(!released.load(Ordering::Acquire));
    let view = alice.roster().peer(&channel, &bob.identity).cloned().expect("link to bob");
    assert!(view.outgoing_audio.is_some());

    alice.handle.end_call().await?;
    assert!(released.load(Ordering::Acquire));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_leaving_last_channel_keeps_owner_hold() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let peers = join_mesh(&coordinator, "general", &["alice", "bob"]).await?;
    wait_for_full_mesh(&peers, "general").await?;
    let alice = &peers[0];

    alice.handle.start_voice().await?;
    let released = alice.capture.opened().await[0].1.clone();

    alice.handle.leave_channel("general").await?;
    assert!(alice.roster().peers.is_empty());
    assert!(!released.load(Ordering::Acquire));

    alice.handle.end_call().await?;
    assert!(released.load(Ordering::Acquire));
    Ok(())
}
