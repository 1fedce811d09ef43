// SRP - Secure Remote Password (SRP-6a), server side
//
// All wire integers are big-endian and left-padded to byteLen(N); the
// padding keeps hash inputs at a fixed width so values of different
// byte lengths cannot collide inside a digest.

use std::sync::Arc;

use rand::{thread_rng, RngCore};
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::big_number::BigNumber;
use super::crypto_hash::HashKind;
use super::group::{lookup_group, SrpGroup};

/// Per-user salt size in bytes
pub const SALT_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrpError {
    #[error("unknown SRP group '{0}'")]
    UnknownGroup(String),
    #[error("client public ephemeral is a multiple of N")]
    BadClientPublic,
    #[error("scrambling parameter is zero")]
    BadScramble,
    #[error("ephemeral exchange has not completed")]
    NotReady,
}

/// Protocol configuration: one group plus its hash. Built once at
/// startup and shared by every session and the provisioning path.
#[derive(Debug)]
pub struct SrpEngine {
    group: &'static SrpGroup,
    hash: HashKind,
}

impl SrpEngine {
    /// Select a group from the catalog; the hash is the one the
    /// catalog pairs with the group.
    pub fn new(group_name: &str) -> Result<Self, SrpError> {
        let group = lookup_group(group_name)
            .ok_or_else(|| SrpError::UnknownGroup(group_name.to_string()))?;
        Ok(SrpEngine {
            group,
            hash: group.hash,
        })
    }

    pub fn group(&self) -> &'static SrpGroup {
        self.group
    }

    pub fn hash(&self) -> HashKind {
        self.hash
    }

    /// x = H(salt || H(username ":" password))
    fn private_key(&self, username: &str, password: &str, salt: &[u8]) -> BigNumber {
        let mut inner = self.hash.engine();
        inner.update(username.as_bytes());
        inner.update(b":");
        inner.update(password.as_bytes());
        let identity_digest = inner.finalize();

        let mut outer = self.hash.engine();
        outer.update(salt);
        outer.update(&identity_digest);
        BigNumber::from_bytes(&outer.finalize())
    }

    /// k = H(PAD(N) || PAD(g))
    fn multiplier(&self) -> BigNumber {
        let mut h = self.hash.engine();
        h.update(&self.group.pad(&self.group.n.to_bytes()));
        h.update(&self.group.pad(&self.group.g.to_bytes()));
        BigNumber::from_bytes(&h.finalize())
    }

    /// Derive a fresh (salt, verifier) pair for account provisioning.
    /// The verifier is g^x mod N, big-endian, padded to byteLen(N).
    pub fn compute_verifier(&self, username: &str, password: &str) -> (Vec<u8>, Vec<u8>) {
        let mut salt = [0u8; SALT_LEN];
        thread_rng().fill_bytes(&mut salt);
        let verifier = self.verifier_with_salt(username, password, &salt);
        (salt.to_vec(), verifier)
    }

    /// Verifier derivation with a caller-supplied salt (re-checks on
    /// the provisioning path use this with the stored salt).
    pub fn verifier_with_salt(&self, username: &str, password: &str, salt: &[u8]) -> Vec<u8> {
        let x = self.private_key(username, password, salt);
        let v = self.group.g.mod_exp(&x, &self.group.n);
        v.to_padded(self.group.byte_len())
    }

    /// Start a server-side handshake for one user.
    /// Draws b uniformly from [1, N-1] and computes B = (k*v + g^b) mod N.
    pub fn new_server_session(
        self: &Arc<Self>,
        username: &str,
        salt: &[u8],
        verifier: &[u8],
    ) -> ServerSession {
        let n = &self.group.n;
        let b = BigNumber::rand_range(&BigNumber::one(), n);
        let v = BigNumber::from_bytes(verifier);

        let k = self.multiplier();
        let g_b = self.group.g.mod_exp(&b, n);
        let k_v = &(&k * &v) % n;
        let big_b = &(&k_v + &g_b) % n;

        ServerSession {
            engine: self.clone(),
            username: username.to_string(),
            salt: salt.to_vec(),
            v,
            b,
            big_b,
            big_a: None,
            key: None,
        }
    }
}

/// Server-side state for a single handshake.
pub struct ServerSession {
    engine: Arc<SrpEngine>,
    username: String,
    salt: Vec<u8>,
    /// Password verifier (v) from the user store
    v: BigNumber,
    /// Host private ephemeral (b)
    b: BigNumber,
    /// Host public ephemeral (B)
    big_b: BigNumber,
    /// Client public ephemeral (A), set by the ephemeral exchange
    big_a: Option<BigNumber>,
    /// Session key K = H(PAD(S))
    key: Option<Vec<u8>>,
}

impl ServerSession {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// PAD(B), as sent on the wire
    pub fn public_ephemeral(&self) -> Vec<u8> {
        self.big_b.to_padded(self.engine.group.byte_len())
    }

    /// The derived session key, once the ephemeral exchange is done
    pub fn session_key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Consume the client's public ephemeral A and derive the shared
    /// secret. Returns PAD(B) for the reply.
    ///
    /// Safeguards per SRP-6a: rejects A with A mod N == 0, and a zero
    /// scrambling parameter u = H(PAD(A) || PAD(B)).
    pub fn set_client_public(&mut self, client_a: &[u8]) -> Result<Vec<u8>, SrpError> {
        let group = self.engine.group;
        let n = &group.n;

        let a = BigNumber::from_bytes(client_a);
        if (&a % n).is_zero() {
            return Err(SrpError::BadClientPublic);
        }

        let mut h = self.engine.hash.engine();
        h.update(&a.to_padded(group.byte_len()));
        h.update(&self.public_ephemeral());
        let u = BigNumber::from_bytes(&h.finalize());
        if u.is_zero() {
            return Err(SrpError::BadScramble);
        }

        // S = (A * v^u)^b mod N
        let v_u = self.v.mod_exp(&u, n);
        let base = &(&a * &v_u) % n;
        let s = base.mod_exp(&self.b, n);

        let key = self.engine.hash.digest(&s.to_padded(group.byte_len()));

        self.big_a = Some(a);
        self.key = Some(key);
        Ok(self.public_ephemeral())
    }

    /// Expected M1 = H(H(N) XOR H(g) || H(username) || salt || PAD(A) || PAD(B) || K)
    fn expected_client_authenticator(&self) -> Option<Vec<u8>> {
        let group = self.engine.group;
        let hash = self.engine.hash;
        let a = self.big_a.as_ref()?;
        let key = self.key.as_ref()?;

        let h_n = hash.digest(&group.n.to_bytes());
        let h_g = hash.digest(&group.g.to_bytes());
        let n_xor_g: Vec<u8> = h_n.iter().zip(h_g.iter()).map(|(x, y)| x ^ y).collect();
        let h_user = hash.digest(self.username.as_bytes());

        let mut h = hash.engine();
        h.update(&n_xor_g);
        h.update(&h_user);
        h.update(&self.salt);
        h.update(&a.to_padded(group.byte_len()));
        h.update(&self.public_ephemeral());
        h.update(key);
        Some(h.finalize())
    }

    /// Check the client proof M1 against our own derivation.
    ///
    /// The comparison has no data-dependent early exit; a mismatch
    /// reveals neither position nor whether the length differed.
    pub fn verify_client_authenticator(&self, client_m1: &[u8]) -> bool {
        match self.expected_client_authenticator() {
            Some(expected) => {
                expected.len() == client_m1.len() && bool::from(expected.ct_eq(client_m1))
            }
            None => false,
        }
    }

    /// M2 = H(PAD(A) || M1 || K), the server's proof for the client.
    /// Only meaningful after `verify_client_authenticator` succeeded.
    pub fn compute_server_authenticator(&self, client_m1: &[u8]) -> Result<Vec<u8>, SrpError> {
        let group = self.engine.group;
        let a = self.big_a.as_ref().ok_or(SrpError::NotReady)?;
        let key = self.key.as_ref().ok_or(SrpError::NotReady)?;

        let mut h = self.engine.hash.engine();
        h.update(&a.to_padded(group.byte_len()));
        h.update(client_m1);
        h.update(key);
        Ok(h.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Client half of the handshake, used to exercise the server side.
    struct TestClient {
        a: BigNumber,
        big_a: BigNumber,
        username: String,
        password: String,
    }

    impl TestClient {
        fn new(engine: &SrpEngine, username: &str, password: &str) -> Self {
            let group = engine.group();
            let a = BigNumber::rand_range(&BigNumber::one(), &group.n);
            let big_a = group.g.mod_exp(&a, &group.n);
            TestClient {
                a,
                big_a,
                username: username.to_string(),
                password: password.to_string(),
            }
        }

        fn public_ephemeral(&self, engine: &SrpEngine) -> Vec<u8> {
            self.big_a.to_padded(engine.group().byte_len())
        }

        /// Derive K and M1 from the server's salt and B.
        fn compute_proof(&self, engine: &SrpEngine, salt: &[u8], b_pub: &[u8]) -> (Vec<u8>, Vec<u8>) {
            let group = engine.group();
            let n = &group.n;
            let width = group.byte_len();

            let big_b = BigNumber::from_bytes(b_pub);
            let mut h = engine.hash().engine();
            h.update(&self.big_a.to_padded(width));
            h.update(&big_b.to_padded(width));
            let u = BigNumber::from_bytes(&h.finalize());

            let x = engine.private_key(&self.username, &self.password, salt);
            let k = engine.multiplier();

            // S = (B - k*g^x) ^ (a + u*x) mod N
            let g_x = group.g.mod_exp(&x, n);
            let k_g_x = &(&k * &g_x) % n;
            let base = &(&(&big_b + n) - &k_g_x) % n;
            let exp = &(&self.a + &(&u * &x)) % &(n - &BigNumber::one());
            let s = base.mod_exp(&exp, n);
            let key = engine.hash().digest(&s.to_padded(width));

            let h_n = engine.hash().digest(&n.to_bytes());
            let h_g = engine.hash().digest(&group.g.to_bytes());
            let n_xor_g: Vec<u8> = h_n.iter().zip(h_g.iter()).map(|(x, y)| x ^ y).collect();
            let h_user = engine.hash().digest(self.username.as_bytes());

            let mut h = engine.hash().engine();
            h.update(&n_xor_g);
            h.update(&h_user);
            h.update(salt);
            h.update(&self.big_a.to_padded(width));
            h.update(&big_b.to_padded(width));
            h.update(&key);
            let m1 = h.finalize();

            (key, m1)
        }

        /// The M2 the client expects back from the server.
        fn expected_server_authenticator(
            &self,
            engine: &SrpEngine,
            m1: &[u8],
            key: &[u8],
        ) -> Vec<u8> {
            let mut h = engine.hash().engine();
            h.update(&self.big_a.to_padded(engine.group().byte_len()));
            h.update(m1);
            h.update(key);
            h.finalize()
        }
    }

    fn run_handshake(group: &str) {
        let engine = Arc::new(SrpEngine::new(group).unwrap());
        let (salt, verifier) = engine.compute_verifier("TestUser", "VsGnJghDUW6C");
        assert_eq!(salt.len(), SALT_LEN);
        assert_eq!(verifier.len(), engine.group().byte_len());

        let mut server = engine.new_server_session("TestUser", &salt, &verifier);
        let client = TestClient::new(&engine, "TestUser", "VsGnJghDUW6C");

        let b_pub = server
            .set_client_public(&client.public_ephemeral(&engine))
            .unwrap();
        let (client_key, m1) = client.compute_proof(&engine, &salt, &b_pub);

        assert_eq!(server.session_key(), Some(client_key.as_slice()));
        assert!(server.verify_client_authenticator(&m1));

        let m2 = server.compute_server_authenticator(&m1).unwrap();
        assert_eq!(m2, client.expected_server_authenticator(&engine, &m1, &client_key));
    }

    #[test]
    fn test_full_handshake_rfc5054_2048() {
        run_handshake("rfc5054.2048");
    }

    #[test]
    fn test_full_handshake_openssl_1024() {
        run_handshake("openssl.1024");
    }

    #[test]
    fn test_wrong_password_rejected() {
        let engine = Arc::new(SrpEngine::new("rfc5054.2048").unwrap());
        let (salt, verifier) = engine.compute_verifier("TestUser", "VsGnJghDUW6C");
        let mut server = engine.new_server_session("TestUser", &salt, &verifier);

        let client = TestClient::new(&engine, "TestUser", "wrong");
        let b_pub = server
            .set_client_public(&client.public_ephemeral(&engine))
            .unwrap();
        let (_, m1) = client.compute_proof(&engine, &salt, &b_pub);

        assert!(!server.verify_client_authenticator(&m1));
    }

    #[test]
    fn test_corrupted_proof_rejected() {
        let engine = Arc::new(SrpEngine::new("rfc5054.2048").unwrap());
        let (salt, verifier) = engine.compute_verifier("TestUser", "VsGnJghDUW6C");
        let mut server = engine.new_server_session("TestUser", &salt, &verifier);

        let client = TestClient::new(&engine, "TestUser", "VsGnJghDUW6C");
        let b_pub = server
            .set_client_public(&client.public_ephemeral(&engine))
            .unwrap();
        let (_, m1) = client.compute_proof(&engine, &salt, &b_pub);

        // Flip the first byte, the last byte, and truncate
        let mut first = m1.clone();
        first[0] ^= 0x01;
        assert!(!server.verify_client_authenticator(&first));

        let mut last = m1.clone();
        *last.last_mut().unwrap() ^= 0x01;
        assert!(!server.verify_client_authenticator(&last));

        assert!(!server.verify_client_authenticator(&m1[..m1.len() - 1]));
    }

    #[test]
    fn test_bad_client_public_rejected() {
        let engine = Arc::new(SrpEngine::new("rfc5054.2048").unwrap());
        let (salt, verifier) = engine.compute_verifier("TestUser", "VsGnJghDUW6C");
        let mut server = engine.new_server_session("TestUser", &salt, &verifier);

        // A == 0
        assert_eq!(
            server.set_client_public(&[0u8; 256]),
            Err(SrpError::BadClientPublic)
        );

        // A == N (also 0 mod N)
        let n_bytes = engine.group().n.to_bytes();
        assert_eq!(
            server.set_client_public(&n_bytes),
            Err(SrpError::BadClientPublic)
        );
    }

    #[test]
    fn test_server_public_in_range() {
        let engine = Arc::new(SrpEngine::new("rfc5054.2048").unwrap());
        let (salt, verifier) = engine.compute_verifier("TestUser", "VsGnJghDUW6C");
        let n = &engine.group().n;
        for _ in 0..8 {
            let server = engine.new_server_session("TestUser", &salt, &verifier);
            let b_pub = BigNumber::from_bytes(&server.public_ephemeral());
            assert!(!b_pub.is_zero());
            assert!(!(&b_pub % n).is_zero());
            assert!(b_pub < *n);
        }
    }

    #[test]
    fn test_authenticator_before_ephemeral_fails() {
        let engine = Arc::new(SrpEngine::new("rfc5054.2048").unwrap());
        let (salt, verifier) = engine.compute_verifier("TestUser", "VsGnJghDUW6C");
        let server = engine.new_server_session("TestUser", &salt, &verifier);

        assert!(!server.verify_client_authenticator(&[0u8; 32]));
        assert_eq!(
            server.compute_server_authenticator(&[0u8; 32]),
            Err(SrpError::NotReady)
        );
    }

    #[test]
    fn test_verifier_depends_on_salt_and_password() {
        let engine = SrpEngine::new("rfc5054.2048").unwrap();
        let v1 = engine.verifier_with_salt("TestUser", "VsGnJghDUW6C", &[1u8; 16]);
        let v2 = engine.verifier_with_salt("TestUser", "VsGnJghDUW6C", &[2u8; 16]);
        let v3 = engine.verifier_with_salt("TestUser", "other", &[1u8; 16]);
        assert_ne!(v1, v2);
        assert_ne!(v1, v3);
        // Deterministic for fixed inputs
        assert_eq!(
            v1,
            engine.verifier_with_salt("TestUser", "VsGnJghDUW6C", &[1u8; 16])
        );
    }

    #[test]
    fn test_unknown_group() {
        assert_eq!(
            SrpEngine::new("nist.3072").unwrap_err(),
            SrpError::UnknownGroup("nist.3072".to_string())
        );
    }
}
