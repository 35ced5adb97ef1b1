//! Message catalog: operation codes and request/response payloads.
//!
//! Payloads are CBOR (via `ciborium`). Identities and content are byte
//! strings; each request type names the response type it expects.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Error;
use crate::vclock::VClock;

/// One-byte message type identifier carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageCode {
    ErrorResp = 0,
    PingReq = 1,
    PingResp = 2,
    GetReq = 9,
    GetResp = 10,
    PutReq = 11,
    PutResp = 12,
    DelReq = 13,
    DelResp = 14,
    CounterUpdateReq = 50,
    CounterUpdateResp = 51,
    CounterGetReq = 52,
    CounterGetResp = 53,
}

impl MessageCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        use MessageCode::*;
        Some(match code {
            0 => ErrorResp,
            1 => PingReq,
            2 => PingResp,
            9 => GetReq,
            10 => GetResp,
            11 => PutReq,
            12 => PutResp,
            13 => DelReq,
            14 => DelResp,
            50 => CounterUpdateReq,
            51 => CounterUpdateResp,
            52 => CounterGetReq,
            53 => CounterGetResp,
            _ => return None,
        })
    }
}

/// A payload with a fixed message code.
pub trait Message: Serialize + DeserializeOwned {
    const CODE: MessageCode;
}

/// A request payload and the response it must be answered with.
pub trait Request: Message {
    type Response: Message;
}

/// Serializes a message payload to CBOR.
pub fn encode<M: Message>(message: &M) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| Error::Codec(format!("encoding {:?}: {}", M::CODE, e)))?;
    Ok(buf)
}

/// Deserializes a message payload from CBOR.
pub fn decode<M: Message>(bytes: &[u8]) -> Result<M, Error> {
    ciborium::from_reader(bytes).map_err(|e| Error::Codec(format!("decoding {:?}: {}", M::CODE, e)))
}

/// A link record as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLink {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub bucket: Vec<u8>,
    #[serde(with = "crate::serde_helpers::bytes")]
    pub key: Vec<u8>,
    #[serde(with = "crate::serde_helpers::bytes")]
    pub tag: Vec<u8>,
}

/// One stored value of an object, with its side-channel links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireContent {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub value: Vec<u8>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub vtag: Option<String>,
    #[serde(default)]
    pub links: Vec<WireLink>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResp {
    pub message: String,
    pub code: u32,
}

impl Message for ErrorResp {
    const CODE: MessageCode = MessageCode::ErrorResp;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingReq {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingResp {}

impl Message for PingReq {
    const CODE: MessageCode = MessageCode::PingReq;
}

impl Message for PingResp {
    const CODE: MessageCode = MessageCode::PingResp;
}

impl Request for PingReq {
    type Response = PingResp;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetReq {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub bucket: Vec<u8>,
    #[serde(with = "crate::serde_helpers::bytes")]
    pub key: Vec<u8>,
    #[serde(default)]
    pub r: Option<u32>,
    #[serde(default)]
    pub pr: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetResp {
    #[serde(default)]
    pub contents: Vec<WireContent>,
    #[serde(default)]
    pub vclock: Option<VClock>,
}

impl Message for GetReq {
    const CODE: MessageCode = MessageCode::GetReq;
}

impl Message for GetResp {
    const CODE: MessageCode = MessageCode::GetResp;
}

impl Request for GetReq {
    type Response = GetResp;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutReq {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub bucket: Vec<u8>,
    /// Absent asks the store to assign a key.
    #[serde(with = "crate::serde_helpers::option_bytes", default)]
    pub key: Option<Vec<u8>>,
    #[serde(default)]
    pub vclock: Option<VClock>,
    pub content: WireContent,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub dw: Option<u32>,
    #[serde(default)]
    pub pw: Option<u32>,
    #[serde(default)]
    pub return_body: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutResp {
    #[serde(default)]
    pub contents: Vec<WireContent>,
    #[serde(default)]
    pub vclock: Option<VClock>,
    /// Set only when the store assigned the key.
    #[serde(with = "crate::serde_helpers::option_bytes", default)]
    pub key: Option<Vec<u8>>,
}

impl Message for PutReq {
    const CODE: MessageCode = MessageCode::PutReq;
}

impl Message for PutResp {
    const CODE: MessageCode = MessageCode::PutResp;
}

impl Request for PutReq {
    type Response = PutResp;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelReq {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub bucket: Vec<u8>,
    #[serde(with = "crate::serde_helpers::bytes")]
    pub key: Vec<u8>,
    #[serde(default)]
    pub vclock: Option<VClock>,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub dw: Option<u32>,
    #[serde(default)]
    pub pw: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelResp {}

impl Message for DelReq {
    const CODE: MessageCode = MessageCode::DelReq;
}

impl Message for DelResp {
    const CODE: MessageCode = MessageCode::DelResp;
}

impl Request for DelReq {
    type Response = DelResp;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterUpdateReq {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub bucket: Vec<u8>,
    #[serde(with = "crate::serde_helpers::bytes")]
    pub key: Vec<u8>,
    pub amount: i64,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub dw: Option<u32>,
    #[serde(default)]
    pub pw: Option<u32>,
    #[serde(default)]
    pub return_value: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterUpdateResp {
    #[serde(default)]
    pub value: Option<i64>,
}

impl Message for CounterUpdateReq {
    const CODE: MessageCode = MessageCode::CounterUpdateReq;
}

impl Message for CounterUpdateResp {
    const CODE: MessageCode = MessageCode::CounterUpdateResp;
}

impl Request for CounterUpdateReq {
    type Response = CounterUpdateResp;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterGetReq {
    #[serde(with = "crate::serde_helpers::bytes")]
    pub bucket: Vec<u8>,
    #[serde(with = "crate::serde_helpers::bytes")]
    pub key: Vec<u8>,
    #[serde(default)]
    pub r: Option<u32>,
    #[serde(default)]
    pub pr: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterGetResp {
    /// Absent for a counter that was never incremented.
    #[serde(default)]
    pub value: Option<i64>,
}

impl Message for CounterGetReq {
    const CODE: MessageCode = MessageCode::CounterGetReq;
}

impl Message for CounterGetResp {
    const CODE: MessageCode = MessageCode::CounterGetResp;
}

impl Request for CounterGetReq {
    type Response = CounterGetResp;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_code_values() {
        assert_eq!(MessageCode::GetReq.as_u8(), 9);
        assert_eq!(MessageCode::PutResp.as_u8(), 12);
        assert_eq!(MessageCode::CounterUpdateReq.as_u8(), 50);
        assert_eq!(MessageCode::CounterGetResp.as_u8(), 53);
    }

    #[test]
    fn message_code_from_u8() {
        for code in [0u8, 1, 2, 9, 10, 11, 12, 13, 14, 50, 51, 52, 53] {
            let parsed = MessageCode::from_u8(code).unwrap();
            assert_eq!(parsed.as_u8(), code);
        }
        assert_eq!(MessageCode::from_u8(15), None);
        assert_eq!(MessageCode::from_u8(255), None);
    }

    #[test]
    fn put_request_carries_links_and_clock() {
        let req = PutReq {
            bucket: b"docs".to_vec(),
            key: Some(b"k1".to_vec()),
            vclock: Some(VClock::from_bytes(vec![7, 7])),
            content: WireContent {
                value: br#"{"a":1}"#.to_vec(),
                content_type: Some("application/json".into()),
                links: vec![WireLink {
                    bucket: b"people".to_vec(),
                    key: b"p1".to_vec(),
                    tag: b"owner".to_vec(),
                }],
                ..Default::default()
            },
            w: Some(2),
            return_body: true,
            ..Default::default()
        };

        let decoded: PutReq = decode(&encode(&req).unwrap()).unwrap();
        assert_eq!(decoded.key.as_deref(), Some(&b"k1"[..]));
        assert_eq!(decoded.vclock, req.vclock);
        assert_eq!(decoded.content, req.content);
        assert_eq!(decoded.w, Some(2));
        assert_eq!(decoded.dw, None);
        assert!(decoded.return_body);
    }

    #[test]
    fn decode_garbage_is_codec_error() {
        let err = decode::<GetResp>(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }
}
