use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::FakeConnection;
use anyhow::Result;
use murmur_core::{Envelope, EnvelopeKind, Identity};

#[tokio::test]
async fn test_relay_stamps_sender_and_keeps_payload_bytes() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = FakeConnection::connect(&coordinator, "alice").await?;
    let mut bob = FakeConnection::connect(&coordinator, "bob").await?;

    let payload = concat!(
        r#"{"type":"offer","sdp":"v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\n","#,
        r#"  "extra": [1.0, null]}"#
    );
    // A forged `from` is overwritten with the authenticated sender.
    let head = r#""type":"offer","from":"mallory","to":"bob","channelId":"general""#;
    alice
        .send_raw(format!(r#"{{{head},"payload":{payload}}}"#))
        .await?;

    let envelope = bob.recv().await?;
    assert_eq!(envelope.kind(), EnvelopeKind::Offer);
    let signal = envelope.signal().expect("offer carries a signal");
    assert_eq!(signal.from, Some(Identity::from("alice")));
    assert_eq!(signal.to, Identity::from("bob"));
    assert_eq!(signal.payload.get(), payload);

    Ok(())
}

#[tokio::test]
async fn test_relay_preserves_per_sender_order() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = FakeConnection::connect(&coordinator, "alice").await?;
    let mut bob = FakeConnection::connect(&coordinator, "bob").await?;

    alice
        .send_raw(r#"{"type":"answer","to":"bob","payload":{"sdp":"a"}}"#)
        .await?;
    for i in 0..5 {
        alice
            .send_raw(format!(
                r#"{{"type":"ice-candidate","to":"bob","payload":{{"candidate":"c{i}"}}}}"#
            ))
            .await?;
    }

    let first = bob.recv().await?;
    assert_eq!(first.kind(), EnvelopeKind::Answer);
    for i in 0..5 {
        let next = bob.recv().await?;
        assert_eq!(next.kind(), EnvelopeKind::IceCandidate);
        let payload = next.signal().map(|s| s.payload.get().to_string());
        assert_eq!(payload.as_deref(), Some(format!(r#"{{"candidate":"c{i}"}}"#).as_str()));
    }
    Ok(())
}

#[tokio::test]
async fn test_relay_does_not_require_shared_channel() -> Result<()> {
    init_tracing();
    let coordinator = create_test_coordinator();

    let alice = FakeConnection::connect(&coordinator, "alice").await?;
    let mut bob = FakeConnection::connect(&coordinator, "bob").await?;
    alice.join("general").await?;

    alice
        .send(&Envelope::IceCandidate(murmur_core::Signal::encode(
            Identity::from("bob"),
            "elsewhere".into(),
            &host_candidate(),
        )?))
        .await?;

    assert_eq!(bob.recv().await?.kind(), EnvelopeKind::IceCandidate);
    Ok(())
}

fn host_candidate() -> std::collections::BTreeMap<&'static str, &'static str> {
    [("candidate", "candidate:1 1 udp 1 127.0.0.1 5000 typ host")]
        .into_iter()
        .collect()
}
