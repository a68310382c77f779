//! Shared utilities for integration tests.
//!
//! - Scripted collaborators that count calls and can be gated or failed
//! - A programmable JSON-RPC node on a loopback port

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::consensus::TxLegacy;
use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use keyflow::blockchain::keys::{Account, Bip44Deriver, PrivateKey};
use keyflow::blockchain::transaction::LocalTxSigner;
use keyflow::blockchain::types::{
    SignedTransaction, TransactionHash, UnsignedTransaction, WalletError, WalletResult,
};
use keyflow::blockchain::MnemonicPhrase;
use keyflow::ports::{Broadcaster, ChainCapabilities, TransactionSigner, TransferBuilder};

pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

pub fn test_phrase() -> MnemonicPhrase {
    MnemonicPhrase::parse(TEST_MNEMONIC).unwrap()
}

/// Builder that records every call and returns a canned transfer.
#[derive(Default)]
pub struct ScriptedBuilder {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<(Address, Address, f64)>>,
    pub fail_with: Option<WalletError>,
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedBuilder {
    pub fn failing(err: WalletError) -> Self {
        Self {
            fail_with: Some(err),
            ..Default::default()
        }
    }

    /// Holds every build until the gate is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferBuilder for ScriptedBuilder {
    async fn build_transfer(
        &self,
        from: Address,
        to: Address,
        amount_eth: f64,
    ) -> WalletResult<UnsignedTransaction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((from, to, amount_eth));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(UnsignedTransaction::new(TxLegacy {
                chain_id: Some(31337),
                gas_limit: 21_000,
                gas_price: 1_000_000_000,
                to: alloy::primitives::TxKind::Call(to),
                ..Default::default()
            })),
        }
    }
}

/// Signer that counts calls and delegates to the real local signer.
#[derive(Default)]
pub struct ScriptedSigner {
    pub calls: AtomicUsize,
    pub fail_with: Option<WalletError>,
}

impl ScriptedSigner {
    pub fn failing(err: WalletError) -> Self {
        Self {
            fail_with: Some(err),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSigner for ScriptedSigner {
    async fn sign_transaction(
        &self,
        key: &PrivateKey,
        unsigned: &UnsignedTransaction,
    ) -> WalletResult<SignedTransaction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => LocalTxSigner::sign(key, unsigned),
        }
    }
}

/// Broadcaster returning a scripted result, optionally after a gate opens.
pub struct ScriptedBroadcaster {
    pub calls: AtomicUsize,
    pub result: WalletResult<TransactionHash>,
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedBroadcaster {
    pub fn accepting(hash: TransactionHash) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Ok(hash),
            gate: None,
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Err(WalletError::BroadcastRejected(reason.to_string())),
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broadcaster for ScriptedBroadcaster {
    async fn submit_transaction(
        &self,
        _signed: &SignedTransaction,
    ) -> WalletResult<TransactionHash> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.result.clone()
    }
}

/// Scripted collaborators plus the capability bundle wrapping them.
pub struct Harness {
    pub builder: Arc<ScriptedBuilder>,
    pub signer: Arc<ScriptedSigner>,
    pub broadcaster: Arc<ScriptedBroadcaster>,
    pub capabilities: ChainCapabilities,
}

impl Harness {
    pub fn new(
        builder: ScriptedBuilder,
        signer: ScriptedSigner,
        broadcaster: ScriptedBroadcaster,
    ) -> Self {
        let builder = Arc::new(builder);
        let signer = Arc::new(signer);
        let broadcaster = Arc::new(broadcaster);
        let capabilities = ChainCapabilities {
            deriver: Arc::new(Bip44Deriver::default()),
            builder: builder.clone(),
            signer: signer.clone(),
            broadcaster: broadcaster.clone(),
        };
        Self {
            builder,
            signer,
            broadcaster,
            capabilities,
        }
    }

    /// All collaborators succeed; the broadcaster accepts with `hash`.
    pub fn happy(hash: TransactionHash) -> Self {
        Self::new(
            ScriptedBuilder::default(),
            ScriptedSigner::default(),
            ScriptedBroadcaster::accepting(hash),
        )
    }
}

pub fn sample_hash(byte: u8) -> TransactionHash {
    TransactionHash(B256::repeat_byte(byte))
}

pub async fn derive(index: u32) -> Arc<Account> {
    use keyflow::blockchain::keys::DerivationIndex;
    use keyflow::ports::KeyDeriver;

    let account = Bip44Deriver::default()
        .derive(&test_phrase(), DerivationIndex::new(index).unwrap())
        .await
        .unwrap();
    Arc::new(account)
}

/// How the mock node answers `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Accept and answer with keccak256 of the payload.
    Accept,
    /// Answer with a JSON-RPC error object.
    Reject { code: i64, message: String },
}

/// Chain state served by the mock node.
#[derive(Debug, Clone)]
pub struct NodeScript {
    pub chain_id: u64,
    pub gas_price: u128,
    pub nonce: u64,
    pub send: SendBehavior,
    /// Read every request, then never answer.
    pub stall: bool,
}

impl Default for NodeScript {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            gas_price: 2_000_000_000,
            nonce: 7,
            send: SendBehavior::Accept,
            stall: false,
        }
    }
}

/// Programmable JSON-RPC node bound to a loopback port.
pub struct MockNode {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockNode {
    pub async fn start(script: NodeScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let script = script.clone();
                        let recorded = recorded.clone();
                        tokio::spawn(async move {
                            let _ = serve_connection(socket, &script, &recorded).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Methods called so far, in arrival order.
    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Params of every call to `method`.
    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r["method"] == method)
            .map(|r| r["params"].clone())
            .collect()
    }
}

/// Serve one HTTP/1.1 request per connection, then close.
async fn serve_connection(
    mut socket: TcpStream,
    script: &NodeScript,
    recorded: &Mutex<Vec<Value>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request: Value =
        serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap_or(Value::Null);
    recorded.lock().push(request.clone());

    if script.stall {
        // Hold the socket open so the client sees silence, not a reset.
        std::future::pending::<()>().await;
    }

    let body = respond(&request, script).to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn respond(request: &Value, script: &NodeScript) -> Value {
    let id = request["id"].clone();
    let result = match request["method"].as_str().unwrap_or_default() {
        "eth_chainId" => json!(format!("0x{:x}", script.chain_id)),
        "eth_gasPrice" => json!(format!("0x{:x}", script.gas_price)),
        "eth_getTransactionCount" => json!(format!("0x{:x}", script.nonce)),
        "eth_sendRawTransaction" => match &script.send {
            SendBehavior::Accept => {
                let raw = request["params"][0].as_str().unwrap_or_default();
                let bytes = alloy::hex::decode(raw).unwrap_or_default();
                json!(keccak256(bytes).to_string())
            }
            SendBehavior::Reject { code, message } => {
                return json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": code, "message": message },
                });
            }
        },
        other => {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method {} not found", other) },
            });
        }
    };
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
