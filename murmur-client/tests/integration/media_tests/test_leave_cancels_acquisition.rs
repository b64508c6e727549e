use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{TestPeer, TestPeerConfig};
use anyhow::Result;
use murmur_client::{CaptureKind, SessionError, SyntheticCapture};
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_leave_during_capture_prompt_cancels_start() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = TestPeer::spawn_with(
        &coordinator,
        "alice",
        TestPeerConfig {
            capture: SyntheticCapture::silent().with_delay(Duration::from_millis(500)),
            ..TestPeerConfig::default()
        },
    )
    .await?;
    alice.handle.join_channel("general").await?;

    let handle = alice.handle.clone();
    let pending = tokio::spawn(async move { handle.start_video().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    alice.handle.leave_channel("general").await?;

    let result = pending.await?;
    assert!(matches!(result, Err(SessionError::Cancelled)));

    // The late stream was stopped rather than leaked.
    let opened = alice.capture.opened().await;
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].0, CaptureKind::Video);
    assert!(opened[0].1.load(Ordering::Acquire));
    Ok(())
}

#[tokio::test]
async fn test_start_after_leave_is_not_cancelled() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = TestPeer::spawn(&coordinator, "alice").await?;
    alice.handle.join_channel("general").await?;
    alice.handle.leave_channel("general").await?;

    alice.handle.start_voice().await?;
    let opened = alice.capture.opened().await;
    assert!(!opened[0].1.load(Ordering::Acquire));
    Ok(())
}

#[tokio::test]
async fn test_leaving_one_of_two_channels_keeps_start() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = TestPeer::spawn_with(
        &coordinator,
        "alice",
        TestPeerConfig {
            capture: SyntheticCapture::silent().with_delay(Duration::from_millis(500)),
            ..TestPeerConfig::default()
        },
    )
    .await?;
    alice.handle.join_channel("general").await?;
    alice.handle.join_channel("random").await?;

    let handle = alice.handle.clone();
    let pending = tokio::spawn(async move { handle.start_voice().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    alice.handle.leave_channel("general").await?;

    // Still in "random", so the call goes on there.
    pending.await??;
    let opened = alice.capture.opened().await;
    assert_eq!(opened[0].0, CaptureKind::Voice);
    assert!(!opened[0].1.load(Ordering::Acquire));
    Ok(())
}
