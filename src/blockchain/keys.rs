//! Hierarchical key derivation from a BIP-39 phrase.
//!
//! # Security
//! - The phrase, private keys and passwords are zeroized on drop
//! - None of them appear in `Debug` output or logs
//! - Derivation is a pure function of (phrase, passphrase, index)

use std::fmt;

use alloy::primitives::Address;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bip39::{Language, Mnemonic};
use zeroize::{Zeroize, Zeroizing};

use crate::blockchain::types::{WalletError, WalletResult};
use crate::observability::metrics;
use crate::ports::KeyDeriver;

/// First hardened child index; account-level indices must stay below it.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// BIP-44 path for an Ethereum account at `index`.
pub fn derivation_path(index: DerivationIndex) -> String {
    format!("m/44'/60'/{}'/0/0", index.0)
}

/// A validated, normalized mnemonic phrase. Never mutated after creation.
#[derive(Clone)]
pub struct MnemonicPhrase(Zeroizing<String>);

impl MnemonicPhrase {
    /// Validate against the English word list and checksum.
    pub fn parse(phrase: &str) -> WalletResult<Self> {
        let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
        Mnemonic::parse_in(Language::English, normalized.as_str())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self(normalized))
    }

    /// Number of words in the phrase.
    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }

    /// The phrase itself, for display only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MnemonicPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MnemonicPhrase({} words)", self.word_count())
    }
}

/// Child index selecting an account under the phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationIndex(u32);

impl DerivationIndex {
    pub fn new(index: u32) -> WalletResult<Self> {
        if index >= HARDENED_OFFSET {
            return Err(WalletError::Derivation(format!(
                "Index {} is out of range (must be below {})",
                index, HARDENED_OFFSET
            )));
        }
        Ok(Self(index))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DerivationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-byte secp256k1 secret, wiped on drop.
pub struct PrivateKey(Zeroizing<[u8; 32]>);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex form, for display only.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(alloy::hex::encode_prefixed(self.0.as_slice()))
    }

    /// Build a local signer for one signing operation.
    pub fn signer(&self) -> WalletResult<PrivateKeySigner> {
        PrivateKeySigner::from_slice(self.0.as_slice())
            .map_err(|e| WalletError::Signing(format!("Invalid private key: {}", e)))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A derived account. Immutable once created.
pub struct Account {
    index: DerivationIndex,
    address: Address,
    public_key: String,
    private_key: PrivateKey,
    password: Zeroizing<String>,
}

impl Account {
    /// Build the account view of a signer.
    pub fn from_signer(index: DerivationIndex, signer: &PrivateKeySigner) -> Self {
        let mut secret = signer.to_bytes();
        let private_key = PrivateKey::from_bytes(secret.0);
        secret.0.zeroize();

        // Uncompressed SEC1 point without its 0x04 tag.
        let point = signer.credential().verifying_key().to_encoded_point(false);
        let public_key = alloy::hex::encode_prefixed(&point.as_bytes()[1..]);

        let password = Zeroizing::new(STANDARD.encode(private_key.as_bytes()));

        Self {
            index,
            address: signer.address(),
            public_key,
            private_key,
            password,
        }
    }

    pub fn index(&self) -> DerivationIndex {
        self.index
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Base64 of the private key bytes.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Derive the signer at `index` synchronously.
pub fn derive_signer(
    mnemonic: &MnemonicPhrase,
    passphrase: &str,
    index: DerivationIndex,
) -> WalletResult<PrivateKeySigner> {
    let mut builder = MnemonicBuilder::<English>::default()
        .phrase(mnemonic.expose())
        .derivation_path(derivation_path(index))
        .map_err(|e| WalletError::Derivation(e.to_string()))?;
    if !passphrase.is_empty() {
        builder = builder.password(passphrase);
    }
    builder
        .build()
        .map_err(|e| WalletError::Derivation(e.to_string()))
}

/// BIP-44 deriver backed by alloy's mnemonic builder.
#[derive(Clone)]
pub struct Bip44Deriver {
    passphrase: Zeroizing<String>,
}

impl Bip44Deriver {
    pub fn new(passphrase: Option<&str>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase.unwrap_or_default().to_string()),
        }
    }
}

impl Default for Bip44Deriver {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Bip44Deriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bip44Deriver")
            .field("passphrase", &!self.passphrase.is_empty())
            .finish()
    }
}

#[async_trait]
impl KeyDeriver for Bip44Deriver {
    async fn derive(
        &self,
        mnemonic: &MnemonicPhrase,
        index: DerivationIndex,
    ) -> WalletResult<Account> {
        let mnemonic = mnemonic.clone();
        let passphrase = self.passphrase.clone();

        // PBKDF2 seed stretching is CPU bound.
        let result = tokio::task::spawn_blocking(move || {
            derive_signer(&mnemonic, &passphrase, index)
                .map(|signer| Account::from_signer(index, &signer))
        })
        .await
        .map_err(|e| WalletError::Derivation(format!("Derivation task failed: {}", e)))
        .and_then(|result| result);

        metrics::record_derivation(result.is_ok());
        match &result {
            Ok(account) => tracing::debug!(index = %index, address = %account.address(), "Derived account"),
            Err(e) => tracing::warn!(index = %index, error = %e, "Derivation failed"),
        }
        result
    }
}
