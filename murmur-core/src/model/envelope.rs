use crate::error::ProtocolError;
use crate::model::{ChannelId, Identity};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// Wire tag of an envelope. Closed set: anything else fails to parse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    Offer,
    Answer,
    IceCandidate,
    JoinChannel,
    LeaveChannel,
    PeerJoined,
    PeerLeft,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::JoinChannel => "join-channel",
            Self::LeaveChannel => "leave-channel",
            Self::PeerJoined => "peer-joined",
            Self::PeerLeft => "peer-left",
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressed handshake step. `payload` is carried as raw JSON text and never
/// re-encoded, so relays forward it byte-for-byte.
#[derive(Debug, Clone)]
pub struct Signal {
    pub from: Option<Identity>,
    pub to: Identity,
    pub channel_id: Option<ChannelId>,
    pub payload: Box<RawValue>,
}

impl Signal {
    pub fn new(to: Identity, channel_id: ChannelId, payload: Box<RawValue>) -> Self {
        Self {
            from: None,
            to,
            channel_id: Some(channel_id),
            payload,
        }
    }

    /// Builds a signal whose payload is the JSON encoding of `value`.
    pub fn encode<T: Serialize>(
        to: Identity,
        channel_id: ChannelId,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        let payload = serde_json::value::to_raw_value(value)?;
        Ok(Self::new(to, channel_id, payload))
    }

    pub fn decode<'a, T: Deserialize<'a>>(&'a self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_str(self.payload.get())?)
    }
}

/// Control message exchanged with the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub enum Envelope {
    Offer(Signal),
    Answer(Signal),
    IceCandidate(Signal),
    JoinChannel { channel_id: ChannelId },
    LeaveChannel { channel_id: ChannelId },
    PeerJoined { from: Identity, channel_id: ChannelId },
    PeerLeft { from: Identity, channel_id: ChannelId },
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Offer(_) => EnvelopeKind::Offer,
            Self::Answer(_) => EnvelopeKind::Answer,
            Self::IceCandidate(_) => EnvelopeKind::IceCandidate,
            Self::JoinChannel { .. } => EnvelopeKind::JoinChannel,
            Self::LeaveChannel { .. } => EnvelopeKind::LeaveChannel,
            Self::PeerJoined { .. } => EnvelopeKind::PeerJoined,
            Self::PeerLeft { .. } => EnvelopeKind::PeerLeft,
        }
    }

    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Offer(signal) | Self::Answer(signal) | Self::IceCandidate(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn signal_mut(&mut self) -> Option<&mut Signal> {
        match self {
            Self::Offer(signal) | Self::Answer(signal) | Self::IceCandidate(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let wire: WireEnvelope = serde_json::from_str(text)?;
        Self::try_from(wire)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Flat JSON shape: `{"type": .., "from": .., "to": .., "channelId": .., "payload": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope {
    #[serde(rename = "type")]
    kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel_id: Option<ChannelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Box<RawValue>>,
}

impl WireEnvelope {
    fn require<T>(
        kind: EnvelopeKind,
        field: &'static str,
        value: Option<T>,
    ) -> Result<T, ProtocolError> {
        value.ok_or(ProtocolError::MissingField { kind, field })
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = ProtocolError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let kind = wire.kind;
        let envelope = match kind {
            EnvelopeKind::Offer | EnvelopeKind::Answer | EnvelopeKind::IceCandidate => {
                let signal = Signal {
                    from: wire.from,
                    to: WireEnvelope::require(kind, "to", wire.to)?,
                    channel_id: wire.channel_id,
                    payload: WireEnvelope::require(kind, "payload", wire.payload)?,
                };
                match kind {
                    EnvelopeKind::Offer => Self::Offer(signal),
                    EnvelopeKind::Answer => Self::Answer(signal),
                    _ => Self::IceCandidate(signal),
                }
            }
            EnvelopeKind::JoinChannel => Self::JoinChannel {
                channel_id: WireEnvelope::require(kind, "channelId", wire.channel_id)?,
            },
            EnvelopeKind::LeaveChannel => Self::LeaveChannel {
                channel_id: WireEnvelope::require(kind, "channelId", wire.channel_id)?,
            },
            EnvelopeKind::PeerJoined => Self::PeerJoined {
                from: WireEnvelope::require(kind, "from", wire.from)?,
                channel_id: WireEnvelope::require(kind, "channelId", wire.channel_id)?,
            },
            EnvelopeKind::PeerLeft => Self::PeerLeft {
                from: WireEnvelope::require(kind, "from", wire.from)?,
                channel_id: WireEnvelope::require(kind, "channelId", wire.channel_id)?,
            },
        };
        Ok(envelope)
    }
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        let kind = envelope.kind();
        let empty = Self {
            kind,
            from: None,
            to: None,
            channel_id: None,
            payload: None,
        };
        match envelope {
            Envelope::Offer(signal) | Envelope::Answer(signal) | Envelope::IceCandidate(signal) => {
                Self {
                    from: signal.from,
                    to: Some(signal.to),
                    channel_id: signal.channel_id,
                    payload: Some(signal.payload),
                    ..empty
                }
            }
            Envelope::JoinChannel { channel_id } | Envelope::LeaveChannel { channel_id } => Self {
                channel_id: Some(channel_id),
                ..empty
            },
            Envelope::PeerJoined { from, channel_id } | Envelope::PeerLeft { from, channel_id } => {
                Self {
                    from: Some(from),
                    channel_id: Some(channel_id),
                    ..empty
                }
            }
        }
    }
}
