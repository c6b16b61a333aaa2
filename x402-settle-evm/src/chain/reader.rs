//! Read-only chain access.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::SolCall;
use alloy_transport::TransportError;

use super::ChainId;

/// Errors from a read-only chain call.
#[derive(Debug, thiserror::Error)]
pub enum ChainReadError {
    /// The `eth_call` executed and reverted.
    #[error("call reverted: {0}")]
    Reverted(String),
    /// RPC transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The call returned data that does not match the expected ABI.
    #[error("failed to decode call result: {0}")]
    Decode(#[from] alloy_sol_types::Error),
}

/// Read-only access to one EIP-155 chain.
///
/// Every operation is pure: nothing here changes chain state.
pub trait Eip155ChainReader: Send + Sync {
    /// The chain this reader is connected to.
    fn chain_id(&self) -> ChainId;

    /// Returns the deployed bytecode at `address` (empty for EOAs).
    fn get_code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, ChainReadError>> + Send;

    /// Returns the raw storage word at `slot` of `address`.
    fn get_storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> impl Future<Output = Result<B256, ChainReadError>> + Send;

    /// Executes a read-only `eth_call` against the latest block.
    fn call(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainReadError>> + Send;
}

impl<T: Eip155ChainReader> Eip155ChainReader for Arc<T> {
    fn chain_id(&self) -> ChainId {
        (**self).chain_id()
    }

    fn get_code(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, ChainReadError>> + Send {
        (**self).get_code(address)
    }

    fn get_storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> impl Future<Output = Result<B256, ChainReadError>> + Send {
        (**self).get_storage_at(address, slot)
    }

    fn call(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainReadError>> + Send {
        (**self).call(to, calldata)
    }
}

/// Executes a typed contract call and decodes its return value.
///
/// # Errors
///
/// Returns [`ChainReadError`] if the call fails, reverts, or returns data
/// that does not decode as `C::Return`.
pub async fn call_sol<R, C>(reader: &R, to: Address, call: C) -> Result<C::Return, ChainReadError>
where
    R: Eip155ChainReader,
    C: SolCall + Send,
{
    let output = reader.call(to, Bytes::from(call.abi_encode())).await?;
    Ok(C::abi_decode_returns(&output)?)
}
