//! Wire messages for the catalog sync protocol.
//!
//! One logical request/response pair, "get catalog", plus the lazy track
//! payload fetch. Messages are CBOR-encoded and framed by the transport.

use serde::{Deserialize, Serialize};

use artel_core::{ArtistId, CatalogFilter, Publication, TrackId};

use crate::error::{Result, SyncError};

/// Current protocol version. Carried in every request; a responder that
/// does not speak it answers with `WireErrorCode::VersionMismatch`.
pub const PROTOCOL_VERSION: u8 = 1;

/// Wire size limits.
pub mod limits {
    /// Max encoded frame size. Large enough for a track payload, small
    /// enough that a hostile length prefix cannot exhaust memory.
    pub const MAX_FRAME_BYTES: usize = 32 * 1024 * 1024;
}

/// Messages exchanged between a sync client and a sync service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireMessage {
    /// Request a signed catalog publication scoped by `filter`.
    GetCatalog {
        protocol_version: u8,
        filter: CatalogFilter,
    },

    /// A signed publication covering the requested scope.
    Catalog { publication: Publication },

    /// Request the binary payload of one track.
    GetTrackPayload {
        protocol_version: u8,
        artist_id: ArtistId,
        artist_track_id: TrackId,
    },

    /// The requested track payload.
    TrackPayload { payload: Vec<u8> },

    /// Error condition.
    Error {
        code: WireErrorCode,
        message: String,
    },
}

/// Error codes carried over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireErrorCode {
    /// Unknown/unspecified error.
    Unknown,
    /// Protocol version mismatch.
    VersionMismatch,
    /// Message was not a valid request.
    InvalidMessage,
    /// The requested entity does not exist here.
    NotFound,
    /// Internal error on the responding node.
    Internal,
}

/// Encode a message to its CBOR wire form.
pub fn encode_message(message: &WireMessage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf)
        .map_err(|e| SyncError::InvalidMessage(format!("encode failed: {}", e)))?;
    if buf.len() > limits::MAX_FRAME_BYTES {
        return Err(SyncError::InvalidMessage(format!(
            "encoded message of {} bytes exceeds frame limit",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Decode a message from its CBOR wire form.
pub fn decode_message(bytes: &[u8]) -> Result<WireMessage> {
    ciborium::from_reader(bytes)
        .map_err(|e| SyncError::InvalidMessage(format!("decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use artel_core::ArtistId;

    #[test]
    fn test_request_roundtrip() {
        let msg = WireMessage::GetCatalog {
            protocol_version: PROTOCOL_VERSION,
            filter: CatalogFilter::for_artist(ArtistId::parse("aliceinchains").unwrap()),
        };

        let bytes = encode_message(&msg).unwrap();
        let decoded = decode_message(&bytes).unwrap();

        match decoded {
            WireMessage::GetCatalog {
                protocol_version,
                filter,
            } => {
                assert_eq!(protocol_version, PROTOCOL_VERSION);
                assert_eq!(
                    filter.artist_id.unwrap().as_str(),
                    "aliceinchains"
                );
            }
            other => panic!("expected GetCatalog, got {:?}", other),
        }
    }

    #[test]
    fn test_error_roundtrip() {
        let msg = WireMessage::Error {
            code: WireErrorCode::NotFound,
            message: "no such track".into(),
        };
        let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
        match decoded {
            WireMessage::Error { code, message } => {
                assert_eq!(code, WireErrorCode::NotFound);
                assert_eq!(message, "no such track");
            }
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode_message(b"\xff\xff\xff\xff").is_err());
    }
}
