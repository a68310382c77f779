//! Chain-specific types and error definitions.

use std::fmt;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Decodable2718;
use alloy::hex;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, TxKind, B256, U256};
use alloy::rlp::{Decodable, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::schema::NodeConfig;

/// Errors that can occur while deriving keys or moving a transfer along.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Endpoint URL malformed, or unreachable during an eager check.
    #[error("Connection config error: {0}")]
    ConnectionConfig(String),

    /// Phrase failed word-list or checksum validation.
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Index out of range or otherwise rejected by the derivation.
    #[error("Derivation error: {0}")]
    Derivation(String),

    /// Amount not positive or not representable in wei.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Address not syntactically valid.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed key or payload at signing time.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The node refused the transaction.
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Transport failure or timeout talking to the node.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// A send is already in flight.
    #[error("A transfer is already being sent")]
    ConcurrentSendRejected,

    /// Sender or receiver account was never derived.
    #[error("Account not ready: {0}")]
    AccountNotReady(&'static str),

    /// The pipeline task ended without a result.
    #[error("Transfer aborted: {0}")]
    Aborted(String),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Parse a hex address, mapping failures into the wallet taxonomy.
pub fn parse_address(input: &str) -> WalletResult<Address> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|e| WalletError::InvalidAddress(format!("'{}': {}", input, e)))
}

/// A transfer that carries no signature yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    tx: TxLegacy,
}

impl UnsignedTransaction {
    /// Wrap a legacy transaction.
    pub fn new(tx: TxLegacy) -> Self {
        Self { tx }
    }

    /// The wrapped transaction fields.
    pub fn tx(&self) -> &TxLegacy {
        &self.tx
    }

    /// RLP payload that gets hashed for signing.
    pub fn encoded(&self) -> Vec<u8> {
        self.tx.encoded_for_signing()
    }

    /// Hex form of [`Self::encoded`].
    pub fn to_hex(&self) -> String {
        hex::encode_prefixed(self.encoded())
    }

    /// Hash a signer commits to.
    pub fn signing_hash(&self) -> B256 {
        self.tx.signature_hash()
    }

    /// Human-readable summary of the transfer.
    pub fn summary(&self) -> DecodedTransaction {
        DecodedTransaction::from(&self.tx)
    }

    /// Parse the signing payload produced by [`Self::to_hex`].
    pub fn from_hex(input: &str) -> WalletResult<Self> {
        let raw = hex::decode(input.trim())
            .map_err(|e| WalletError::Signing(format!("Invalid hex payload: {}", e)))?;
        Self::decode(&raw)
    }

    /// Decode a legacy signing payload.
    ///
    /// Six fields for pre-EIP-155 payloads; nine when the chain id is
    /// followed by the two zero placeholders.
    pub fn decode(raw: &[u8]) -> WalletResult<Self> {
        let malformed = |e: alloy::rlp::Error| {
            WalletError::Signing(format!("Malformed unsigned payload: {}", e))
        };

        let mut buf = raw;
        let header = Header::decode(&mut buf).map_err(malformed)?;
        if !header.list || header.payload_length != buf.len() {
            return Err(WalletError::Signing(
                "Unsigned payload is not a single RLP list".to_string(),
            ));
        }

        let mut tx = TxLegacy {
            nonce: u64::decode(&mut buf).map_err(malformed)?,
            gas_price: u128::decode(&mut buf).map_err(malformed)?,
            gas_limit: u64::decode(&mut buf).map_err(malformed)?,
            to: TxKind::decode(&mut buf).map_err(malformed)?,
            value: U256::decode(&mut buf).map_err(malformed)?,
            input: Bytes::decode(&mut buf).map_err(malformed)?,
            chain_id: None,
        };

        if !buf.is_empty() {
            let chain_id = u64::decode(&mut buf).map_err(malformed)?;
            let r = U256::decode(&mut buf).map_err(malformed)?;
            let s = U256::decode(&mut buf).map_err(malformed)?;
            if !r.is_zero() || !s.is_zero() {
                return Err(WalletError::Signing(
                    "Payload carries a signature; decode it as a signed transaction".to_string(),
                ));
            }
            tx.chain_id = Some(chain_id);
        }
        if !buf.is_empty() {
            return Err(WalletError::Signing(
                "Trailing fields after unsigned payload".to_string(),
            ));
        }

        Ok(Self::new(tx))
    }
}

/// An EIP-2718 encoded, signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    raw: Bytes,
}

impl SignedTransaction {
    /// Wrap raw encoded bytes.
    pub fn from_raw(raw: impl Into<Bytes>) -> Self {
        Self { raw: raw.into() }
    }

    /// Parse from a hex string, with or without `0x`.
    pub fn from_hex(input: &str) -> WalletResult<Self> {
        let raw = hex::decode(input.trim())
            .map_err(|e| WalletError::Signing(format!("Invalid hex payload: {}", e)))?;
        Ok(Self::from_raw(raw))
    }

    /// The raw encoded bytes.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Hex form of the payload.
    pub fn to_hex(&self) -> String {
        hex::encode_prefixed(&self.raw)
    }

    /// Hash the network will assign to this transaction.
    pub fn hash(&self) -> TransactionHash {
        TransactionHash(keccak256(&self.raw))
    }

    /// Decode the transfer fields back out of the payload.
    ///
    /// An unsigned signing payload parses as a legacy transaction with
    /// `r = s = 0`; it is refused rather than misread.
    pub fn decode(&self) -> WalletResult<DecodedTransaction> {
        let mut buf = self.raw.as_ref();
        let envelope = TxEnvelope::decode_2718(&mut buf)
            .map_err(|e| WalletError::Signing(format!("Failed to decode transaction: {}", e)))?;
        if !buf.is_empty() {
            return Err(WalletError::Signing(
                "Trailing bytes after signed transaction".to_string(),
            ));
        }
        let signed = envelope.as_legacy().ok_or_else(|| {
            WalletError::Signing("Only legacy transfers are supported".to_string())
        })?;
        let signature = signed.signature();
        if signature.r().is_zero() || signature.s().is_zero() {
            return Err(WalletError::Signing(
                "Payload has no signature (r or s is zero)".to_string(),
            ));
        }
        Ok(DecodedTransaction::from(signed.tx()))
    }
}

/// Either kind of transfer payload, decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodedPayload {
    /// Broadcastable; `hash` is what the network will report.
    #[serde(rename_all = "camelCase")]
    Signed {
        hash: TransactionHash,
        transaction: DecodedTransaction,
    },
    /// Awaiting a signature over `signing_hash`.
    #[serde(rename_all = "camelCase")]
    Unsigned {
        signing_hash: B256,
        transaction: DecodedTransaction,
    },
}

/// Decode a hex payload, signed or unsigned.
pub fn decode_payload(input: &str) -> WalletResult<DecodedPayload> {
    let signed = SignedTransaction::from_hex(input)?;
    let signed_err = match signed.decode() {
        Ok(transaction) => {
            return Ok(DecodedPayload::Signed {
                hash: signed.hash(),
                transaction,
            })
        }
        Err(e) => e,
    };
    match UnsignedTransaction::decode(signed.raw()) {
        Ok(unsigned) => Ok(DecodedPayload::Unsigned {
            signing_hash: unsigned.signing_hash(),
            transaction: unsigned.summary(),
        }),
        Err(unsigned_err) => Err(WalletError::Signing(format!(
            "Not a transfer payload ({}; {})",
            signed_err, unsigned_err
        ))),
    }
}

/// Identifier the node returned on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub TxHash);

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transfer fields extracted from an encoded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub chain_id: Option<u64>,
}

impl From<&TxLegacy> for DecodedTransaction {
    fn from(tx: &TxLegacy) -> Self {
        Self {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to.to().copied(),
            value: tx.value,
            chain_id: tx.chain_id,
        }
    }
}
