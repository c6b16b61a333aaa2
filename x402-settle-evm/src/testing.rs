//! In-memory chain and JSON-RPC fixtures shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, FixedBytes, U256, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Eip712Domain, SolCall, SolStruct};
use alloy_transport::TransportErrorKind;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::chain::{
    ChainId, ChainReadError, Eip155ChainReader, Eip155MetaTransactionProvider, MetaTransaction,
    MetaTransactionSendError, SettlementReceipt,
};
use crate::exact::contract::{IEIP3009, IERC20, IPermitSettlement, IProxy, ISignatureTransfer};

/// Bytecode that contains each of `selectors` as a `PUSH4` operand.
pub fn code_with(selectors: &[[u8; 4]]) -> Bytes {
    let mut code = vec![0x60, 0x80, 0x60, 0x40];
    for selector in selectors {
        code.push(0x63);
        code.extend_from_slice(selector);
        code.push(0x14);
    }
    Bytes::from(code)
}

/// Signs an EIP-712 struct and returns the 65-byte signature.
pub fn sign_typed<T: SolStruct>(
    signer: &PrivateKeySigner,
    value: &T,
    domain: &Eip712Domain,
) -> Bytes {
    let digest = value.eip712_signing_hash(domain);
    let signature = signer.sign_hash_sync(&digest).unwrap();
    Bytes::from(signature.as_bytes().to_vec())
}

#[derive(Debug, Default)]
struct ChainState {
    code: HashMap<Address, Bytes>,
    storage: HashMap<(Address, B256), B256>,
    implementations: HashMap<Address, Address>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    names: HashMap<Address, String>,
    versions: HashMap<Address, String>,
    domains: HashMap<Address, (String, String)>,
    consumed: HashSet<B256>,
    sent: Vec<MetaTransaction>,
}

/// A single EVM chain held in memory.
///
/// Reads answer from the configured maps; unknown calls revert. Settlement
/// transactions move balances and consume their authorization, so replaying
/// the same calldata reverts.
#[derive(Debug)]
pub struct MockChain {
    chain_id: ChainId,
    signers: Vec<Address>,
    state: Mutex<ChainState>,
    reads: AtomicUsize,
    mined: AtomicUsize,
    offline: AtomicBool,
    fail_broadcast: AtomicBool,
    mine_reverted: AtomicBool,
    latency: Option<Duration>,
}

impl MockChain {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            signers: vec![Address::repeat_byte(0xfa)],
            state: Mutex::default(),
            reads: AtomicUsize::new(0),
            mined: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            fail_broadcast: AtomicBool::new(false),
            mine_reverted: AtomicBool::new(false),
            latency: None,
        }
    }

    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_signers(mut self, signers: Vec<Address>) -> Self {
        self.signers = signers;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    pub fn set_storage(&self, address: Address, slot: B256, value: B256) {
        self.state().storage.insert((address, slot), value);
    }

    pub fn set_implementation(&self, proxy: Address, implementation: Address) {
        self.state().implementations.insert(proxy, implementation);
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: u64) {
        self.state().balances.insert((token, owner), U256::from(amount));
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.state()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: u64) {
        self.state()
            .allowances
            .insert((token, owner, spender), U256::from(amount));
    }

    pub fn set_name(&self, token: Address, name: &str) {
        self.state().names.insert(token, name.to_owned());
    }

    pub fn set_version(&self, token: Address, version: &str) {
        self.state().versions.insert(token, version.to_owned());
    }

    pub fn set_eip712_domain(&self, token: Address, name: &str, version: &str) {
        self.state()
            .domains
            .insert(token, (name.to_owned(), version.to_owned()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_fail_broadcast(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    pub fn set_mine_reverted(&self, reverted: bool) {
        self.mine_reverted.store(reverted, Ordering::SeqCst);
    }

    /// Number of read calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Every transaction submitted so far, including rejected ones.
    pub fn sent(&self) -> Vec<MetaTransaction> {
        self.state().sent.clone()
    }

    async fn read(&self) -> Result<(), ChainReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportErrorKind::custom_str("connection refused").into());
        }
        Ok(())
    }

    fn answer(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ChainReadError> {
        let revert = || ChainReadError::Reverted("execution reverted".into());
        let selector: [u8; 4] = data.get(..4).ok_or_else(revert)?.try_into().unwrap();
        let state = self.state();
        match selector {
            IERC20::balanceOfCall::SELECTOR => {
                let call = IERC20::balanceOfCall::abi_decode(data)?;
                let balance = state.balances.get(&(to, call.account)).copied().unwrap_or_default();
                Ok(IERC20::balanceOfCall::abi_encode_returns(&balance))
            }
            IERC20::allowanceCall::SELECTOR => {
                let call = IERC20::allowanceCall::abi_decode(data)?;
                let allowance = state
                    .allowances
                    .get(&(to, call.owner, call.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(IERC20::allowanceCall::abi_encode_returns(&allowance))
            }
            IERC20::nameCall::SELECTOR => {
                let name = state.names.get(&to).ok_or_else(revert)?;
                Ok(IERC20::nameCall::abi_encode_returns(name))
            }
            IERC20::versionCall::SELECTOR => {
                let version = state.versions.get(&to).ok_or_else(revert)?;
                Ok(IERC20::versionCall::abi_encode_returns(version))
            }
            IERC20::eip712DomainCall::SELECTOR => {
                let (name, version) = state.domains.get(&to).ok_or_else(revert)?;
                Ok(IERC20::eip712DomainCall::abi_encode_returns(
                    &IERC20::eip712DomainReturn {
                        fields: FixedBytes([0x0f]),
                        name: name.clone(),
                        version: version.clone(),
                        chainId: U256::from(self.chain_id),
                        verifyingContract: to,
                        salt: B256::ZERO,
                        extensions: Vec::new(),
                    },
                ))
            }
            IProxy::implementationCall::SELECTOR => {
                let implementation = state.implementations.get(&to).ok_or_else(revert)?;
                Ok(IProxy::implementationCall::abi_encode_returns(implementation))
            }
            _ => Err(revert()),
        }
    }

    /// Decodes a settlement call into `(token, from, to, amount)`.
    fn transfer_of(tx: &MetaTransaction) -> Option<(Address, Address, Address, U256)> {
        let data = tx.calldata.as_ref();
        let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
        match selector {
            IPermitSettlement::settleWithPermitCall::SELECTOR => {
                let call = IPermitSettlement::settleWithPermitCall::abi_decode(data).ok()?;
                Some((call.token, call.owner, tx.to, call.value))
            }
            IEIP3009::transferWithAuthorization_1Call::SELECTOR => {
                let call = IEIP3009::transferWithAuthorization_1Call::abi_decode(data).ok()?;
                Some((tx.to, call.from, call.to, call.value))
            }
            ISignatureTransfer::permitTransferFromCall::SELECTOR => {
                let call = ISignatureTransfer::permitTransferFromCall::abi_decode(data).ok()?;
                Some((
                    call.permit.permitted.token,
                    call.owner,
                    call.transferDetails.to,
                    call.transferDetails.requestedAmount,
                ))
            }
            ISignatureTransfer::permitWitnessTransferFromCall::SELECTOR => {
                let call =
                    ISignatureTransfer::permitWitnessTransferFromCall::abi_decode(data).ok()?;
                Some((
                    call.permit.permitted.token,
                    call.owner,
                    call.transferDetails.to,
                    call.transferDetails.requestedAmount,
                ))
            }
            _ => None,
        }
    }

    fn mine(&self, tx: MetaTransaction) -> Result<SettlementReceipt, MetaTransactionSendError> {
        let mut state = self.state();
        state.sent.push(tx.clone());
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err(TransportErrorKind::custom_str("nonce too low").into());
        }
        let counter = self.mined.fetch_add(1, Ordering::SeqCst);
        let mut preimage = tx.calldata.to_vec();
        preimage.extend_from_slice(&counter.to_be_bytes());
        let transaction_hash = keccak256(&preimage);
        if self.mine_reverted.load(Ordering::SeqCst) {
            return Ok(SettlementReceipt {
                transaction_hash,
                status: false,
            });
        }

        let (token, from, to, amount) = Self::transfer_of(&tx)
            .ok_or_else(|| MetaTransactionSendError::Reverted("unknown function".into()))?;
        let authorization = keccak256(&tx.calldata);
        if state.consumed.contains(&authorization) {
            return Err(MetaTransactionSendError::Reverted(
                "execution reverted: authorization is used".into(),
            ));
        }
        let from_balance = state.balances.get(&(token, from)).copied().unwrap_or_default();
        let remaining = from_balance.checked_sub(amount).ok_or_else(|| {
            MetaTransactionSendError::Reverted("transfer amount exceeds balance".into())
        })?;
        state.consumed.insert(authorization);
        state.balances.insert((token, from), remaining);
        *state.balances.entry((token, to)).or_default() += amount;
        Ok(SettlementReceipt {
            transaction_hash,
            status: true,
        })
    }
}

impl Eip155ChainReader for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainReadError> {
        self.read().await?;
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256, ChainReadError> {
        self.read().await?;
        Ok(self
            .state()
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainReadError> {
        self.read().await?;
        self.answer(to, &calldata).map(Bytes::from)
    }
}

impl Eip155MetaTransactionProvider for MockChain {
    fn signer_addresses(&self) -> Vec<Address> {
        self.signers.clone()
    }

    async fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<SettlementReceipt, MetaTransactionSendError> {
        self.mine(tx)
    }
}

/// A JSON-RPC node served by wiremock with canned replies per method.
///
/// Requests for methods without a reply get a 404.
#[derive(Debug)]
pub struct JsonRpcMock {
    server: MockServer,
    replies: Vec<(String, Value)>,
}

impl JsonRpcMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            replies: Vec::new(),
        }
    }

    pub fn result(mut self, rpc_method: &str, result: impl Into<Value>) -> Self {
        self.replies
            .push((rpc_method.to_owned(), json!({ "result": result.into() })));
        self
    }

    pub fn error(mut self, rpc_method: &str, code: i64, message: &str) -> Self {
        self.replies.push((
            rpc_method.to_owned(),
            json!({ "error": { "code": code, "message": message } }),
        ));
        self
    }

    pub async fn mount(self) -> Self {
        for (rpc_method, reply) in &self.replies {
            let reply = reply.clone();
            Mock::given(method("POST"))
                .and(body_partial_json(json!({ "method": rpc_method })))
                .respond_with(move |request: &Request| {
                    let id = serde_json::from_slice::<Value>(&request.body)
                        .ok()
                        .and_then(|body| body.get("id").cloned())
                        .unwrap_or(Value::Null);
                    let mut body = json!({ "jsonrpc": "2.0", "id": id });
                    if let (Some(body), Some(reply)) = (body.as_object_mut(), reply.as_object()) {
                        body.extend(reply.clone());
                    }
                    ResponseTemplate::new(200).set_body_json(body)
                })
                .mount(&self.server)
                .await;
        }
        self
    }

    pub fn url(&self) -> Url {
        self.server.uri().parse().unwrap()
    }

    /// How many requests for `rpc_method` the node has received.
    pub async fn calls(&self, rpc_method: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
            .filter(|body| body.get("method").and_then(Value::as_str) == Some(rpc_method))
            .count()
    }
}
