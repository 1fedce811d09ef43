// BigNumber - Large unsigned integer arithmetic wrapper

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::thread_rng;

/// BigNumber wraps num-bigint's BigUint for the SRP computations.
///
/// All byte-level import/export is big-endian, matching the on-wire
/// encoding of SRP integers. `to_padded` left-pads with zero bytes to a
/// requested width so that hash inputs always have the modulus width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BigNumber {
    bn: BigUint,
}

impl Default for BigNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl BigNumber {
    /// Create a new BigNumber initialized to zero
    pub fn new() -> Self {
        BigNumber { bn: BigUint::zero() }
    }

    /// Create from a u32 value
    pub fn from_u32(val: u32) -> Self {
        BigNumber { bn: BigUint::from(val) }
    }

    /// Create from big-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        BigNumber {
            bn: BigUint::from_bytes_be(bytes),
        }
    }

    /// Parse from a hex string (case-insensitive)
    /// Returns None on empty or non-hex input
    pub fn from_hex_str(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if hex.is_empty() {
            return None;
        }
        BigUint::parse_bytes(hex.as_bytes(), 16).map(|bn| BigNumber { bn })
    }

    /// Draw uniformly from `[low, high)` using the thread CSPRNG
    pub fn rand_range(low: &BigNumber, high: &BigNumber) -> BigNumber {
        let mut rng = thread_rng();
        BigNumber {
            bn: rng.gen_biguint_range(&low.bn, &high.bn),
        }
    }

    pub fn one() -> Self {
        BigNumber { bn: BigUint::one() }
    }

    /// Check if the number is zero
    pub fn is_zero(&self) -> bool {
        self.bn.is_zero()
    }

    /// Modular exponentiation: self^exp mod modulus
    pub fn mod_exp(&self, exp: &BigNumber, modulus: &BigNumber) -> BigNumber {
        BigNumber {
            bn: self.bn.modpow(&exp.bn, &modulus.bn),
        }
    }

    /// Number of bytes needed to represent this number
    pub fn num_bytes(&self) -> usize {
        let bits = self.bn.bits() as usize;
        bits.div_ceil(8)
    }

    /// Get as a u32 value (0 if out of range)
    pub fn as_u32(&self) -> u32 {
        use num_traits::ToPrimitive;
        self.bn.to_u32().unwrap_or(0)
    }

    /// Minimal big-endian byte representation (empty for zero)
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.bn.is_zero() {
            return Vec::new();
        }
        self.bn.to_bytes_be()
    }

    /// Big-endian bytes left-padded with zeros to at least `min_size`
    pub fn to_padded(&self, min_size: usize) -> Vec<u8> {
        let be_bytes = self.to_bytes();
        if be_bytes.len() >= min_size {
            return be_bytes;
        }
        let mut result = vec![0u8; min_size];
        let offset = min_size - be_bytes.len();
        result[offset..].copy_from_slice(&be_bytes);
        result
    }

    /// Uppercase hex string
    pub fn to_hex_str(&self) -> String {
        if self.bn.is_zero() {
            return "0".to_string();
        }
        format!("{:X}", self.bn)
    }

    /// Get a reference to the inner BigUint
    pub fn inner(&self) -> &BigUint {
        &self.bn
    }
}

// Arithmetic operator implementations

impl std::ops::Add for &BigNumber {
    type Output = BigNumber;
    fn add(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: &self.bn + &rhs.bn,
        }
    }
}

impl std::ops::Sub for &BigNumber {
    type Output = BigNumber;
    fn sub(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: if self.bn >= rhs.bn {
                &self.bn - &rhs.bn
            } else {
                BigUint::zero()
            },
        }
    }
}

impl std::ops::Mul for &BigNumber {
    type Output = BigNumber;
    fn mul(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: &self.bn * &rhs.bn,
        }
    }
}

impl std::ops::Rem for &BigNumber {
    type Output = BigNumber;
    fn rem(self, rhs: &BigNumber) -> BigNumber {
        BigNumber {
            bn: &self.bn % &rhs.bn,
        }
    }
}
