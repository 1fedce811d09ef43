// Auth module - cryptographic primitives and the SRP protocol engine

pub mod big_number;
pub mod crypto_hash;
pub mod group;
pub mod srp;

pub use big_number::BigNumber;
pub use crypto_hash::{HashEngine, HashKind};
pub use group::{lookup_group, SrpGroup};
pub use srp::{ServerSession, SrpEngine, SrpError, SALT_LEN};
