// AuthCodes - packet tags, error codes and wire limits
//
// The tag constants are fixed by the deployed game client and must be
// preserved byte-for-byte.

/// Client -> server packet tags
pub const SERVER_NEGOTIATE: u32 = 0xD003_CA01;
pub const SERVER_EPHEMERAL: u32 = 0xD003_CA02;
pub const SERVER_PROOF: u32 = 0xD003_CA03;

/// Server -> client packet tags
pub const AUTH_NEGOTIATE: u32 = 0xE003_CA01;
pub const AUTH_EPHEMERAL: u32 = 0xE003_CA02;
pub const AUTH_PROOF: u32 = 0xE003_CA03;
pub const SESSION_ERROR: u32 = 0xEEEE_CA01;

/// Version byte carried in the negotiate reply
pub const PROTOCOL_VERSION: u8 = 2;

/// Maximum raw string length on the wire, terminator included
pub const MAX_STRING_BYTES: usize = 64;

/// Maximum accepted inbound datagram size
pub const MAX_DATAGRAM: usize = 1024;

/// Error codes carried by a SessionError packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionErrorCode {
    AuthFailed = 0x01,
}

impl SessionErrorCode {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x01 => Some(SessionErrorCode::AuthFailed),
            _ => None,
        }
    }
}
