//! Sender authentication for ChainDrug
//!
//! Each node owns a parameter triple `(A, B, p)` where `B = A^k mod p` for a
//! secret exponent `k`. A submission carries `(h, s0, s1)` with
//! `h = A^r mod p`, `s0 = r mod (p-1)` and `s1 = (r + x) mod (p-1)`; the check
//! `A^s0 = h` and `A^s1 = h * B` (mod p) passes exactly when `A^x = B`.
//!
//! The moduli are demonstration-sized. This is an identification check for a
//! teaching ledger, not a signature scheme.

use crate::error::ChainError;
use rand::Rng;
use std::collections::BTreeMap;

/// Public parameters of one node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IdentityParams {
    pub a: u64,
    pub b: u64,
    pub p: u64,
}

impl IdentityParams {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.p < 3 {
            return Err(ChainError::ConfigError(format!(
                "modulus p must be at least 3, got {}",
                self.p
            )));
        }
        if self.a < 2 || self.a >= self.p {
            return Err(ChainError::ConfigError(format!(
                "generator A must lie in [2, p), got A={} p={}",
                self.a, self.p
            )));
        }
        if self.b == 0 || self.b >= self.p {
            return Err(ChainError::ConfigError(format!(
                "public value B must lie in [1, p), got B={} p={}",
                self.b, self.p
            )));
        }
        Ok(())
    }
}

/// The `(h, s0, s1)` triple attached to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProofFields {
    pub h: u64,
    pub s0: u64,
    pub s1: u64,
}

/// `base^exp mod modulus` by square-and-multiply over 128-bit intermediates.
pub fn mod_pow(base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let m = modulus as u128;
    let mut result: u128 = 1;
    let mut base = base as u128 % m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % m;
        }
        base = base * base % m;
        exp >>= 1;
    }
    result as u64
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

/// Accepts iff `A^s0 ≡ h` and `A^s1 ≡ h·B` modulo `p`.
pub fn authenticate(params: &IdentityParams, proof: &ProofFields) -> bool {
    let IdentityParams { a, b, p } = *params;
    mod_pow(a, proof.s0, p) == proof.h % p && mod_pow(a, proof.s1, p) == mul_mod(proof.h, b, p)
}

/// Builds a fresh proof for challenge `x` with a random `r` in `[0, p-2]`.
pub fn generate_proof<R: Rng>(params: &IdentityParams, x: u64, rng: &mut R) -> ProofFields {
    let r = rng.gen_range(0..=params.p - 2);
    proof_with_nonce(params, x, r)
}

/// Deterministic variant of [`generate_proof`] for a caller-chosen `r`.
pub fn proof_with_nonce(params: &IdentityParams, x: u64, r: u64) -> ProofFields {
    let order = (params.p - 1) as u128;
    ProofFields {
        h: mod_pow(params.a, r, params.p),
        s0: (r as u128 % order) as u64,
        s1: ((r as u128 + x as u128) % order) as u64,
    }
}

/// Node index → identity parameters. Read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    entries: BTreeMap<u64, IdentityParams>,
}

impl IdentityTable {
    pub fn new(entries: impl IntoIterator<Item = (u64, IdentityParams)>) -> Result<Self, ChainError> {
        let mut table = BTreeMap::new();
        for (index, params) in entries {
            params.validate()?;
            if table.insert(index, params).is_some() {
                return Err(ChainError::ConfigError(format!(
                    "duplicate identity index {}",
                    index
                )));
            }
        }
        Ok(Self { entries: table })
    }

    pub fn get(&self, index: u64) -> Result<&IdentityParams, ChainError> {
        self.entries
            .get(&index)
            .ok_or(ChainError::UnknownIdentity(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn authenticate(&self, index: u64, proof: &ProofFields) -> Result<(), ChainError> {
        let params = self.get(index)?;
        if authenticate(params, proof) {
            Ok(())
        } else {
            Err(ChainError::AuthenticationFailed(format!(
                "proof (h={}, s0={}, s1={}) does not match identity {}",
                proof.h, proof.s0, proof.s1, index
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // The original four-node deployment and each owner's secret exponent.
    const DEPLOYMENT: [(IdentityParams, u64); 4] = [
        (IdentityParams { a: 350, b: 2618, p: 17189 }, 54),
        (IdentityParams { a: 490, b: 20109, p: 52691 }, 25),
        (IdentityParams { a: 640, b: 18099, p: 54787 }, 50),
        (IdentityParams { a: 720, b: 17066, p: 25657 }, 13),
    ];

    #[test]
    fn test_mod_pow() {
        assert_eq!(mod_pow(5, 0, 23), 1);
        assert_eq!(mod_pow(5, 3, 23), 10);
        assert_eq!(mod_pow(5, 6, 23), 8);
        assert_eq!(mod_pow(5, 9, 23), 11);
        assert_eq!(mod_pow(7, 100, 1), 0);
        // Large operands stay exact through the 128-bit intermediates.
        assert_eq!(mod_pow(u64::MAX - 1, 2, u64::MAX), 1);
    }

    #[test]
    fn test_hand_computed_proof() {
        // Z_23^*, A = 5, secret k = 6 so B = 8; r = 3.
        let params = IdentityParams { a: 5, b: 8, p: 23 };
        let proof = proof_with_nonce(&params, 6, 3);
        assert_eq!(proof, ProofFields { h: 10, s0: 3, s1: 9 });
        assert!(authenticate(&params, &proof));
    }

    #[test]
    fn test_round_trip_for_deployment_table() {
        let mut rng = StdRng::seed_from_u64(7);
        for (params, secret) in DEPLOYMENT {
            for _ in 0..200 {
                let proof = generate_proof(&params, secret, &mut rng);
                assert!(authenticate(&params, &proof), "{:?} {:?}", params, proof);
            }
        }
    }

    #[test]
    fn test_wrong_challenge_rejected() {
        let (params, secret) = DEPLOYMENT[0];
        let proof = proof_with_nonce(&params, secret + 1, 1234);
        assert!(!authenticate(&params, &proof));
    }

    #[test]
    fn test_single_bit_tampering_rejected() {
        let mut rng = StdRng::seed_from_u64(99);
        for (params, secret) in DEPLOYMENT {
            let proof = generate_proof(&params, secret, &mut rng);
            for bit in 0..16 {
                let mask = 1u64 << bit;
                let mut tampered = proof;
                tampered.h ^= mask;
                assert!(!authenticate(&params, &tampered), "h bit {}", bit);

                let mut tampered = proof;
                tampered.s0 ^= mask;
                assert!(!authenticate(&params, &tampered), "s0 bit {}", bit);

                let mut tampered = proof;
                tampered.s1 ^= mask;
                assert!(!authenticate(&params, &tampered), "s1 bit {}", bit);
            }
        }
    }

    #[test]
    fn test_proof_fields_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let (params, _) = DEPLOYMENT[1];
        for _ in 0..500 {
            let proof = generate_proof(&params, u64::MAX, &mut rng);
            assert!(proof.h < params.p);
            assert!(proof.s0 < params.p - 1);
            assert!(proof.s1 < params.p - 1);
        }
    }

    #[test]
    fn test_identity_table_lookup() {
        let table = IdentityTable::new(
            DEPLOYMENT
                .iter()
                .enumerate()
                .map(|(i, (params, _))| (i as u64, *params)),
        )
        .unwrap();
        assert_eq!(table.len(), 4);

        let (params, secret) = DEPLOYMENT[2];
        let proof = proof_with_nonce(&params, secret, 77);
        assert!(table.authenticate(2, &proof).is_ok());
        assert!(matches!(
            table.authenticate(1, &proof),
            Err(ChainError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            table.authenticate(9, &proof),
            Err(ChainError::UnknownIdentity(9))
        ));
    }

    #[test]
    fn test_identity_table_rejects_bad_entries() {
        let good = DEPLOYMENT[0].0;
        assert!(IdentityTable::new(vec![(0, good), (0, good)]).is_err());
        assert!(IdentityTable::new(vec![(0, IdentityParams { a: 2, b: 1, p: 2 })]).is_err());
        assert!(IdentityTable::new(vec![(0, IdentityParams { a: 1, b: 1, p: 23 })]).is_err());
        assert!(IdentityTable::new(vec![(0, IdentityParams { a: 5, b: 23, p: 23 })]).is_err());
    }
}
