use crate::utils::{LocalSignaling, RecordingBehavior, RecordingStore};
use anyhow::{Context, Result};
use murmur_client::{
    CaptureDevice, MeshSession, Roster, SessionConfig, SessionHandle, SyntheticCapture,
};
use murmur_core::{ChannelId, Identity};
use std::sync::Arc;
use std::time::Duration;

/// Generous: real peer connections over loopback, several at once.
pub const MESH_TIMEOUT_MS: u64 = 20_000;

/// One client under test: a running session plus its observable doubles.
pub struct TestPeer {
    pub identity: Identity,
    pub handle: SessionHandle,
    pub behavior: RecordingBehavior,
    pub capture: Arc<SyntheticCapture>,
    pub store: RecordingStore,
    pub signaling: Arc<LocalSignaling>,
}

pub struct TestPeerConfig {
    pub capture: SyntheticCapture,
    pub store: RecordingStore,
}

impl Default for TestPeerConfig {
    fn default() -> Self {
        Self {
            capture: SyntheticCapture::silent(),
            store: RecordingStore::new(),
        }
    }
}

impl TestPeer {
    pub async fn spawn(coordinator: &murmur_server::CoordinatorHandle, name: &str) -> Result<Self> {
        Self::spawn_with(coordinator, name, TestPeerConfig::default()).await
    }

    pub async fn spawn_with(
        coordinator: &murmur_server::CoordinatorHandle,
        name: &str,
        config: TestPeerConfig,
    ) -> Result<Self> {
        let identity = Identity::from(name);
        let (signaling, inbound) = LocalSignaling::connect(coordinator, &identity).await?;
        let signaling = Arc::new(signaling);
        let behavior = RecordingBehavior::new();
        let capture = Arc::new(config.capture);
        let store = config.store;

        let handle = MeshSession::builder(identity.clone(), signaling.clone(), inbound)
            .config(test_session_config())
            .behavior(Arc::new(behavior.clone()))
            .store(Arc::new(store.clone()))
            .capture(capture.clone() as Arc<dyn CaptureDevice>)
            .spawn();

        Ok(Self {
            identity,
            handle,
            behavior,
            capture,
            store,
            signaling,
        })
    }

    pub fn roster(&self) -> Roster {
        self.handle.roster()
    }

    /// Waits until `predicate` holds for this peer's roster.
    pub async fn wait_for_roster<F>(&self, timeout_ms: u64, predicate: F) -> Result<Roster>
    where
        F: FnMut(&Roster) -> bool,
    {
        let mut rx = self.handle.watch_roster();
        let roster = tokio::time::timeout(Duration::from_millis(timeout_ms), rx.wait_for(predicate))
            .await
            .with_context(|| format!("Timeout waiting on roster of {}", self.identity))?
            .context("Session stopped")?;
        Ok(roster.clone())
    }

    /// Waits until this peer is connected to exactly `expected` in `channel`.
    pub async fn wait_connected_to(&self, channel: &str, expected: &[&TestPeer]) -> Result<Roster> {
        let channel_id = ChannelId::from(channel);
        let mut want: Vec<Identity> = expected.iter().map(|p| p.identity.clone()).collect();
        want.sort();

        self.wait_for_roster(MESH_TIMEOUT_MS, |roster| roster.connected(&channel_id) == want)
            .await
    }
}

pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        join_settle: Duration::from_millis(300),
        ..SessionConfig::local()
    }
}

/// Spawns `names` and joins them to `channel` one after another.
pub async fn join_mesh(
    coordinator: &murmur_server::CoordinatorHandle,
    channel: &str,
    names: &[&str],
) -> Result<Vec<TestPeer>> {
    let mut peers = Vec::with_capacity(names.len());
    for name in names {
        let peer = TestPeer::spawn(coordinator, name).await?;
        peer.handle.join_channel(channel).await?;
        peers.push(peer);
    }
    Ok(peers)
}

/// Waits until every peer is connected to every other peer.
pub async fn wait_for_full_mesh(peers: &[TestPeer], channel: &str) -> Result<()> {
    for peer in peers {
        let others: Vec<&TestPeer> = peers
            .iter()
            .filter(|p| p.identity != peer.identity)
            .collect();
        peer.wait_connected_to(channel, &others).await?;
    }
    Ok(())
}
