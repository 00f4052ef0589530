use crate::types::{Address, Balance, PrivateKey};
use secp256k1::{Secp256k1, rand};
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

/// A wallet record as kept in `wallets.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: Address,
    pub private_key: PrivateKey,
    pub balance: Balance,
}

impl Wallet {
    pub fn new(address: Address, private_key: PrivateKey) -> Self {
        Wallet {
            address,
            private_key,
            balance: Balance::zero(),
        }
    }

    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            address: self.address.clone(),
            balance: self.balance,
        }
    }
}

/// Public view of a wallet returned by `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub address: Address,
    pub balance: Balance,
}

/// Source of fresh address/key pairs for seeded wallets.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> (Address, PrivateKey);
}

/// Ethereum-style key pairs: secp256k1 secret, address = last 20 bytes of
/// keccak256(uncompressed public key without its 0x04 prefix).
#[derive(Debug, Default)]
pub struct Secp256k1KeyGenerator;

impl KeyGenerator for Secp256k1KeyGenerator {
    fn generate(&self) -> (Address, PrivateKey) {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());

        let uncompressed = public_key.serialize_uncompressed();
        let mut hasher = Keccak::v256();
        hasher.update(&uncompressed[1..]);
        let mut digest = [0u8; 32];
        hasher.finalize(&mut digest);

        (
            Address::from_bytes(&digest[12..]),
            PrivateKey::from_bytes(&secret_key.secret_bytes()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secp256k1_keys_have_ethereum_shape() {
        let (address, key) = Secp256k1KeyGenerator.generate();
        assert_eq!(address.as_hex().len(), 40);
        assert!(address.encode().starts_with("Wa"));
        assert_eq!(key.encode().len(), 2 + 64);
    }

    #[test]
    fn generated_addresses_differ() {
        let (a, _) = Secp256k1KeyGenerator.generate();
        let (b, _) = Secp256k1KeyGenerator.generate();
        assert_ne!(a, b);
    }

    #[test]
    fn wallet_file_shape() {
        let wallet = Wallet::new(
            Address::decode("Wa01").unwrap(),
            PrivateKey::decode("Wp02").unwrap(),
        );
        let json = serde_json::to_value(&wallet).unwrap();
        assert_eq!(json["address"], "Wa01");
        assert_eq!(json["privateKey"], "Wp02");
        assert_eq!(json["balance"], "Wb0");
    }
}
