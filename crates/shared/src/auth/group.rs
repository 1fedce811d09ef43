// SRP group catalog - named (N, g) parameter sets
//
// Groups are immutable and process-wide, built once on first lookup.
// Each entry names its hash explicitly; the protocol never infers a
// hash from the modulus size.

use once_cell::sync::Lazy;

use super::big_number::BigNumber;
use super::crypto_hash::HashKind;

/// RFC 5054 appendix A, 2048-bit group
const RFC5054_2048_N: &str = "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B855F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773BCA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB694B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

/// RFC 5054 appendix A, 1024-bit group (the set OpenSSL ships for SRP)
const OPENSSL_1024_N: &str = "EEAF0AB9ADB38DD69C33F80AFA8FC5E86072618775FF3C0B9EA2314C9C256576D674DF7496EA81D3383B4813D692C6E0E0D5D8E250B98BE48E495C1D6089DAD15DC7D7B46154D6B6CE8EF4AD69B15D4982559B297BCF1885C529F566660E57EC68EDBC3C05726CC02FD4CBF4976EAA9AFD5138FE8376435B9FC61D2FC0EB06E3";

/// A named SRP parameter set: safe prime N, generator g, and the hash
/// the deployment pairs with the group.
#[derive(Debug)]
pub struct SrpGroup {
    pub name: &'static str,
    pub n: BigNumber,
    pub g: BigNumber,
    pub hash: HashKind,
}

impl SrpGroup {
    /// byteLen(N): the width every wire integer is padded to
    pub fn byte_len(&self) -> usize {
        self.n.num_bytes()
    }

    /// PAD(x): left-zero-pad big-endian bytes to byteLen(N)
    pub fn pad(&self, bytes: &[u8]) -> Vec<u8> {
        let width = self.byte_len();
        if bytes.len() >= width {
            return bytes.to_vec();
        }
        let mut out = vec![0u8; width];
        out[width - bytes.len()..].copy_from_slice(bytes);
        out
    }
}

static CATALOG: Lazy<Vec<SrpGroup>> = Lazy::new(|| {
    vec![
        SrpGroup {
            name: "rfc5054.2048",
            n: BigNumber::from_hex_str(RFC5054_2048_N).expect("bad builtin group modulus"),
            g: BigNumber::from_u32(2),
            hash: HashKind::Sha256,
        },
        SrpGroup {
            name: "openssl.1024",
            n: BigNumber::from_hex_str(OPENSSL_1024_N).expect("bad builtin group modulus"),
            g: BigNumber::from_u32(2),
            hash: HashKind::Sha1,
        },
    ]
});

/// Look up a group by its catalog name
pub fn lookup_group(name: &str) -> Option<&'static SrpGroup> {
    CATALOG.iter().find(|g| g.name == name)
}
