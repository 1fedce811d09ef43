// Protocol - wire codec for the handshake packets
//
// Every datagram starts with a 4-byte little-endian tag followed by a
// type-specific body. Strings are NUL-terminated UTF-8 of at most 64
// raw bytes; variable byte fields carry a u16 little-endian length
// prefix. Unmarshal rejects trailing bytes so that marshal and
// unmarshal are exact inverses.

use styx_shared::util::ByteBuffer;
use thiserror::Error;

use crate::auth_codes::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    #[error("unknown packet tag {0:#010X}")]
    UnknownPacket(u32),
}

/// Read the 4-byte tag from the front of a datagram
pub fn read_tag(data: &[u8]) -> Result<u32, WireError> {
    let mut buf = ByteBuffer::from_bytes(data);
    buf.read_u32()
        .map_err(|_| WireError::Malformed("datagram shorter than a packet tag"))
}

fn expect_tag(data: &[u8], tag: u32) -> Result<ByteBuffer, WireError> {
    let mut buf = ByteBuffer::from_bytes(data);
    let got = buf
        .read_u32()
        .map_err(|_| WireError::Malformed("datagram shorter than a packet tag"))?;
    if got != tag {
        return Err(WireError::UnknownPacket(got));
    }
    Ok(buf)
}

fn finish(buf: &ByteBuffer) -> Result<(), WireError> {
    if buf.remaining() != 0 {
        return Err(WireError::Malformed("trailing bytes after packet body"));
    }
    Ok(())
}

/// Client opens a handshake: its own correlation ID plus the username
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNegotiate {
    pub client_session: u32,
    pub username: String,
}

impl ServerNegotiate {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(9 + self.username.len());
        buf.write_u32(SERVER_NEGOTIATE);
        buf.write_u32(self.client_session);
        buf.write_cstring(&self.username);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, SERVER_NEGOTIATE)?;
        let client_session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated client session"))?;
        let username = buf
            .read_cstring(MAX_STRING_BYTES)
            .map_err(|_| WireError::Malformed("bad username string"))?;
        finish(&buf)?;
        Ok(ServerNegotiate {
            client_session,
            username,
        })
    }
}

/// Client sends its public ephemeral A
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEphemeral {
    pub session: u32,
    pub ephemeral: Vec<u8>,
}

impl ServerEphemeral {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(10 + self.ephemeral.len());
        buf.write_u32(SERVER_EPHEMERAL);
        buf.write_u32(self.session);
        buf.write_blob(&self.ephemeral);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, SERVER_EPHEMERAL)?;
        let session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated session id"))?;
        let ephemeral = buf
            .read_blob()
            .map_err(|_| WireError::Malformed("truncated ephemeral field"))?;
        finish(&buf)?;
        Ok(ServerEphemeral { session, ephemeral })
    }
}

/// Client sends its proof M1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProof {
    pub session: u32,
    pub proof: Vec<u8>,
}

impl ServerProof {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(10 + self.proof.len());
        buf.write_u32(SERVER_PROOF);
        buf.write_u32(self.session);
        buf.write_blob(&self.proof);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, SERVER_PROOF)?;
        let session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated session id"))?;
        let proof = buf
            .read_blob()
            .map_err(|_| WireError::Malformed("truncated proof field"))?;
        finish(&buf)?;
        Ok(ServerProof { session, proof })
    }
}

/// Server accepts the negotiation: fresh session ID, canonical
/// username and the stored salt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthNegotiate {
    pub client_session: u32,
    pub session: u32,
    pub version: u8,
    pub username: String,
    pub salt: Vec<u8>,
}

impl AuthNegotiate {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(16 + self.username.len() + self.salt.len());
        buf.write_u32(AUTH_NEGOTIATE);
        buf.write_u32(self.client_session);
        buf.write_u32(self.session);
        buf.write_u8(self.version);
        buf.write_cstring(&self.username);
        buf.write_blob(&self.salt);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, AUTH_NEGOTIATE)?;
        let client_session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated client session"))?;
        let session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated session id"))?;
        let version = buf
            .read_u8()
            .map_err(|_| WireError::Malformed("truncated version byte"))?;
        let username = buf
            .read_cstring(MAX_STRING_BYTES)
            .map_err(|_| WireError::Malformed("bad username string"))?;
        let salt = buf
            .read_blob()
            .map_err(|_| WireError::Malformed("truncated salt field"))?;
        finish(&buf)?;
        Ok(AuthNegotiate {
            client_session,
            session,
            version,
            username,
            salt,
        })
    }
}

/// Server answers the ephemeral exchange with B
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEphemeral {
    pub session: u32,
    pub ephemeral: Vec<u8>,
}

impl AuthEphemeral {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(10 + self.ephemeral.len());
        buf.write_u32(AUTH_EPHEMERAL);
        buf.write_u32(self.session);
        buf.write_blob(&self.ephemeral);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, AUTH_EPHEMERAL)?;
        let session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated session id"))?;
        let ephemeral = buf
            .read_blob()
            .map_err(|_| WireError::Malformed("truncated ephemeral field"))?;
        finish(&buf)?;
        Ok(AuthEphemeral { session, ephemeral })
    }
}

/// Server proves key possession with M2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProof {
    pub session: u32,
    pub proof: Vec<u8>,
}

impl AuthProof {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(10 + self.proof.len());
        buf.write_u32(AUTH_PROOF);
        buf.write_u32(self.session);
        buf.write_blob(&self.proof);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, AUTH_PROOF)?;
        let session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated session id"))?;
        let proof = buf
            .read_blob()
            .map_err(|_| WireError::Malformed("truncated proof field"))?;
        finish(&buf)?;
        Ok(AuthProof { session, proof })
    }
}

/// Server reports a handshake failure for a live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub session: u32,
    pub err_type: u8,
}

impl SessionError {
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(9);
        buf.write_u32(SESSION_ERROR);
        buf.write_u32(self.session);
        buf.write_u8(self.err_type);
        buf.into_bytes()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, WireError> {
        let mut buf = expect_tag(data, SESSION_ERROR)?;
        let session = buf
            .read_u32()
            .map_err(|_| WireError::Malformed("truncated session id"))?;
        let err_type = buf
            .read_u8()
            .map_err(|_| WireError::Malformed("truncated error code"))?;
        finish(&buf)?;
        Ok(SessionError { session, err_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_layout() {
        let packet = ServerNegotiate {
            client_session: 0xDEADBEEF,
            username: "TestUser".to_string(),
        };
        let bytes = packet.marshal();
        // tag || client_session || username NUL
        assert_eq!(&bytes[..4], &[0x01, 0xCA, 0x03, 0xD0]);
        assert_eq!(&bytes[4..8], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(&bytes[8..16], b"TestUser");
        assert_eq!(bytes[16], 0x00);
        assert_eq!(bytes.len(), 17);
        assert_eq!(ServerNegotiate::unmarshal(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_auth_negotiate_roundtrip() {
        let packet = AuthNegotiate {
            client_session: 0xDEADBEEF,
            session: 0x01020304,
            version: PROTOCOL_VERSION,
            username: "TestUser".to_string(),
            salt: vec![0xAA; 16],
        };
        let bytes = packet.marshal();
        assert_eq!(&bytes[..4], &[0x01, 0xCA, 0x03, 0xE0]);
        let decoded = AuthNegotiate::unmarshal(&bytes).unwrap();
        assert_eq!(decoded, packet);
        // Re-encoding is byte-identical
        assert_eq!(decoded.marshal(), bytes);
    }

    #[test]
    fn test_ephemeral_roundtrip() {
        for (marshal, tag) in [
            (
                ServerEphemeral {
                    session: 7,
                    ephemeral: vec![1, 2, 3],
                }
                .marshal(),
                [0x02, 0xCA, 0x03, 0xD0],
            ),
            (
                AuthEphemeral {
                    session: 7,
                    ephemeral: vec![1, 2, 3],
                }
                .marshal(),
                [0x02, 0xCA, 0x03, 0xE0],
            ),
        ] {
            assert_eq!(&marshal[..4], &tag);
            // session || u16 len || payload
            assert_eq!(&marshal[4..8], &[0x07, 0x00, 0x00, 0x00]);
            assert_eq!(&marshal[8..10], &[0x03, 0x00]);
            assert_eq!(&marshal[10..], &[1, 2, 3]);
        }
    }

    #[test]
    fn test_proof_roundtrip() {
        let packet = ServerProof {
            session: 42,
            proof: vec![0x55; 32],
        };
        let bytes = packet.marshal();
        assert_eq!(ServerProof::unmarshal(&bytes).unwrap(), packet);

        let reply = AuthProof {
            session: 42,
            proof: vec![0x66; 32],
        };
        let bytes = reply.marshal();
        assert_eq!(AuthProof::unmarshal(&bytes).unwrap(), reply);
        assert_eq!(AuthProof::unmarshal(&bytes).unwrap().marshal(), bytes);
    }

    #[test]
    fn test_session_error_layout() {
        let packet = SessionError {
            session: 0x0A0B0C0D,
            err_type: SessionErrorCode::AuthFailed as u8,
        };
        let bytes = packet.marshal();
        assert_eq!(bytes, vec![0x01, 0xCA, 0xEE, 0xEE, 0x0D, 0x0C, 0x0B, 0x0A, 0x01]);
        assert_eq!(SessionError::unmarshal(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_unknown_tag() {
        let mut bytes = ServerNegotiate {
            client_session: 1,
            username: "u".to_string(),
        }
        .marshal();
        bytes[3] = 0x77;
        assert_eq!(
            ServerNegotiate::unmarshal(&bytes),
            Err(WireError::UnknownPacket(0x7703CA01))
        );
    }

    #[test]
    fn test_truncated_packets() {
        assert!(matches!(
            read_tag(&[0x01, 0x02, 0x03]),
            Err(WireError::Malformed(_))
        ));

        let full = ServerEphemeral {
            session: 1,
            ephemeral: vec![9; 64],
        }
        .marshal();
        for len in [4, 6, 9, full.len() - 1] {
            assert!(matches!(
                ServerEphemeral::unmarshal(&full[..len]),
                Err(WireError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = ServerProof {
            session: 1,
            proof: vec![1, 2],
        }
        .marshal();
        bytes.push(0xFF);
        assert!(matches!(
            ServerProof::unmarshal(&bytes),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_username_limits() {
        // 63 content bytes + terminator = 64 raw bytes: accepted
        let longest = "x".repeat(63);
        let bytes = ServerNegotiate {
            client_session: 0,
            username: longest.clone(),
        }
        .marshal();
        assert_eq!(
            ServerNegotiate::unmarshal(&bytes).unwrap().username,
            longest
        );

        // 64 content bytes: terminator falls outside the window
        let bytes = ServerNegotiate {
            client_session: 0,
            username: "x".repeat(64),
        }
        .marshal();
        assert!(matches!(
            ServerNegotiate::unmarshal(&bytes),
            Err(WireError::Malformed(_))
        ));
    }
}
