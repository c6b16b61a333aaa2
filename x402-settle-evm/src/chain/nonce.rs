//! Pending-aware nonce management.

use std::sync::Arc;

use alloy_network::Network;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_provider::fillers::NonceManager;
use alloy_transport::TransportResult;
use dashmap::DashMap;
use tokio::sync::Mutex;

const NONCE_UNSET: u64 = u64::MAX;

/// Nonce manager that queries pending transactions for the initial nonce.
///
/// Unlike alloy's `CachedNonceManager`, which starts from the `latest`
/// transaction count, this manager queries with `.pending()` on first use so
/// that transactions still in the mempool after a restart are accounted for.
///
/// - **First call per address**: queries the pending count over RPC
/// - **Subsequent calls**: increments the cached nonce locally
/// - **On failure**: [`reset_nonce`](Self::reset_nonce) forces a re-query
///
/// Each signer has its own lock, so settlements from different signers never
/// wait on each other.
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

#[cfg_attr(target_family = "wasm", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_family = "wasm"), async_trait::async_trait)]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: Network,
    {
        let slot = {
            let entry = self
                .nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(NONCE_UNSET)));
            Arc::clone(entry.value())
        };

        let mut nonce = slot.lock().await;
        let next = if *nonce == NONCE_UNSET {
            provider.get_transaction_count(address).pending().await?
        } else {
            *nonce + 1
        };
        *nonce = next;
        Ok(next)
    }
}

impl PendingNonceManager {
    /// Forgets the cached nonce for `address`.
    ///
    /// Call this when a transaction fails: it may or may not have reached the
    /// mempool, so the next nonce must come from the node.
    pub async fn reset_nonce(&self, address: Address) {
        let slot = self.nonces.get(&address).map(|entry| Arc::clone(entry.value()));
        if let Some(slot) = slot {
            *slot.lock().await = NONCE_UNSET;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_network::Ethereum;
    use alloy_primitives::address;
    use alloy_provider::RootProvider;

    use super::*;
    use crate::testing::JsonRpcMock;

    const SIGNER: Address = address!("0x00000000000000000000000000000000000000a1");

    #[tokio::test]
    async fn queries_pending_once_then_increments() {
        let rpc = JsonRpcMock::start()
            .await
            .result("eth_getTransactionCount", "0x7")
            .mount()
            .await;
        let provider = RootProvider::<Ethereum>::new_http(rpc.url());
        let manager = PendingNonceManager::default();

        assert_eq!(manager.get_next_nonce(&provider, SIGNER).await.unwrap(), 7);
        assert_eq!(manager.get_next_nonce(&provider, SIGNER).await.unwrap(), 8);
        assert_eq!(rpc.calls("eth_getTransactionCount").await, 1);

        manager.reset_nonce(SIGNER).await;
        assert_eq!(manager.get_next_nonce(&provider, SIGNER).await.unwrap(), 7);
        assert_eq!(rpc.calls("eth_getTransactionCount").await, 2);
    }
}
