//! Identity keys for Agora
//!
//! Handles key generation and address derivation. The ballot engine only
//! ever sees the derived [`Address`].

use agora_core::{Address, AgoraError, AgoraResult};
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::hashing::blake3_hash;

/// An Ed25519 identity key pair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create keypair from seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create keypair from secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> AgoraResult<Self> {
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(AgoraError::ConfigError(format!(
                "secret key must be {} bytes, got {}",
                SECRET_KEY_LENGTH,
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        Ok(Self::from_seed(&seed))
    }

    /// Raw public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The address (hash of public key)
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key())
    }

    /// Secret key bytes
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

/// Derive address from public key using BLAKE3 hash
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    Address::from_bytes(blake3_hash(public_key))
}

/// Verify that an address matches a public key
pub fn verify_address(address: &Address, public_key: &[u8; 32]) -> bool {
    address == &address_from_public_key(public_key)
}

/// Serializable key file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub public_key: String,
    pub address: String,
    pub secret_key: String,
}

impl From<&KeyPair> for KeyInfo {
    fn from(keypair: &KeyPair) -> Self {
        Self {
            public_key: hex::encode(keypair.public_key()),
            address: keypair.address().to_hex(),
            secret_key: hex::encode(keypair.secret_bytes()),
        }
    }
}

impl KeyInfo {
    /// Rebuild the key pair, checking the stored address still matches
    pub fn to_keypair(&self) -> AgoraResult<KeyPair> {
        let secret = hex::decode(&self.secret_key)
            .map_err(|e| AgoraError::ConfigError(format!("invalid secret key: {}", e)))?;
        let keypair = KeyPair::from_secret_bytes(&secret)?;
        if keypair.address().to_hex() != self.address {
            return Err(AgoraError::InvalidAddress(self.address.clone()));
        }
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp = KeyPair::generate();
        assert!(verify_address(&kp.address(), &kp.public_key()));
    }

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let kp1 = KeyPair::from_seed(&seed);
        let kp2 = KeyPair::from_seed(&seed);

        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_key_info_round_trip() {
        let kp = KeyPair::generate();
        let info = KeyInfo::from(&kp);
        let restored = info.to_keypair().unwrap();
        assert_eq!(restored.address(), kp.address());
    }

    #[test]
    fn test_key_info_rejects_mismatched_address() {
        let mut info = KeyInfo::from(&KeyPair::from_seed(&[1u8; 32]));
        info.address = KeyPair::from_seed(&[2u8; 32]).address().to_hex();
        assert!(matches!(info.to_keypair(), Err(AgoraError::InvalidAddress(_))));
    }

    #[test]
    fn test_wrong_secret_length() {
        assert!(KeyPair::from_secret_bytes(&[0u8; 16]).is_err());
    }
}
