/// Stratum protocol message types and serialization
///
/// Frames are single-line JSON objects `{"id", "method", "body"}` separated
/// by `\n`. The method set is closed: two client requests and four server
/// notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Header every inbound frame must carry before its body is inspected
#[derive(Debug, Clone, Deserialize)]
pub struct StratumMessage {
    /// Client-chosen message id
    pub id: u64,

    /// Method name
    pub method: String,

    /// Method-specific payload
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Subscribe,
    Subscribed,
    SetTarget,
    Notify,
    Submit,
    WaitForWork,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Subscribe,
        Method::Subscribed,
        Method::SetTarget,
        Method::Notify,
        Method::Submit,
        Method::WaitForWork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Subscribe => "mining.subscribe",
            Method::Subscribed => "mining.subscribed",
            Method::SetTarget => "mining.set_target",
            Method::Notify => "mining.notify",
            Method::Submit => "mining.submit",
            Method::WaitForWork => "mining.wait_for_work",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    pub public_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub mining_request_id: u64,
    pub randomness: Randomness,
}

/// Nonce material found by the miner.
///
/// Older miners send a bare integer, newer ones a hex string. Either is
/// passed through to the pool untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Randomness {
    Number(u64),
    Hex(String),
}

impl fmt::Display for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Randomness::Number(n) => write!(f, "{}", n),
            Randomness::Hex(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedBody {
    pub client_id: u64,
    pub graffiti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTargetBody {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyBody {
    pub mining_request_id: u64,
    /// Hex-encoded mineable header
    pub header: String,
}

/// Validated request from a miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Subscribe { id: u64, body: SubscribeBody },
    Submit { id: u64, body: SubmitBody },
}

impl ClientMessage {
    pub fn method(&self) -> Method {
        match self {
            ClientMessage::Subscribe { .. } => Method::Subscribe,
            ClientMessage::Submit { .. } => Method::Submit,
        }
    }
}

/// Notification pushed from the server to a miner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Subscribed(SubscribedBody),
    SetTarget(SetTargetBody),
    Notify(NotifyBody),
    WaitForWork,
}

#[derive(Serialize)]
struct OutboundFrame<'a, B: Serialize> {
    id: u64,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a B>,
}

impl ServerMessage {
    pub fn method(&self) -> Method {
        match self {
            ServerMessage::Subscribed(_) => Method::Subscribed,
            ServerMessage::SetTarget(_) => Method::SetTarget,
            ServerMessage::Notify(_) => Method::Notify,
            ServerMessage::WaitForWork => Method::WaitForWork,
        }
    }

    /// Serialize into a newline-terminated frame carrying `sequence_id`.
    pub fn encode(&self, sequence_id: u64) -> serde_json::Result<String> {
        let method = self.method().as_str();
        let mut line = match self {
            ServerMessage::Subscribed(body) => Self::frame(sequence_id, method, Some(body))?,
            ServerMessage::SetTarget(body) => Self::frame(sequence_id, method, Some(body))?,
            ServerMessage::Notify(body) => Self::frame(sequence_id, method, Some(body))?,
            ServerMessage::WaitForWork => Self::frame::<Value>(sequence_id, method, None)?,
        };
        line.push('\n');
        Ok(line)
    }

    fn frame<B: Serialize>(id: u64, method: &'static str, body: Option<&B>) -> serde_json::Result<String> {
        serde_json::to_string(&OutboundFrame { id, method, body })
    }
}
