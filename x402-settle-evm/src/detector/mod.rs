//! Token capability detection.
//!
//! Before a resource server can ask for a payment it has to know which
//! signature-based transfer methods the token supports. The
//! [`TokenCapabilityDetector`] answers that from deployed bytecode alone:
//!
//! 1. The token's code and the Permit2 contract's code are read concurrently.
//! 2. The token code is scanned for the `permit` and EIP-3009 selectors.
//! 3. If neither is found, the token may be a proxy: its implementation is
//!    resolved (EIP-1967 slot, EIP-1822 slot, `implementation()` getter) and
//!    scanned as well.
//!
//! Results are cached per detector instance. Concurrent first-time
//! detections of one token share a single set of chain reads. A detection
//! that hits an RPC failure degrades to "no methods" and is not cached.
//!
//! Detection is advisory. Verification re-checks everything against the
//! chain, so a false positive costs a failed settlement, never a wrong one.

use std::sync::Arc;

use alloy_primitives::Address;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::chain::{ChainReadError, Eip155ChainReader};
use crate::exact::types::{PERMIT2_ADDRESS, SchemeId};

pub mod bytecode;
pub mod proxy;

pub use bytecode::BytecodeScan;

/// The signature-based transfer methods a token supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCapabilities {
    /// The token that was inspected.
    pub address: Address,
    /// Supported methods, always in the order `permit`, `eip3009`, `permit2`.
    pub supported_methods: Vec<SchemeId>,
    /// EIP-2612 `permit` was found.
    pub has_permit: bool,
    /// An EIP-3009 method was found.
    pub has_eip3009: bool,
    /// Permit2 is deployed on this chain.
    pub has_permit2: bool,
    /// The proxy implementation that was scanned, if the token is a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
}

impl TokenCapabilities {
    /// Builds capabilities from scan results.
    #[must_use]
    pub fn new(
        address: Address,
        scan: BytecodeScan,
        has_permit2: bool,
        implementation: Option<Address>,
    ) -> Self {
        let supported_methods = [
            (scan.has_permit, SchemeId::Permit),
            (scan.has_eip3009, SchemeId::Eip3009),
            (has_permit2, SchemeId::Permit2),
        ]
        .into_iter()
        .filter_map(|(supported, id)| supported.then_some(id))
        .collect();
        Self {
            address,
            supported_methods,
            has_permit: scan.has_permit,
            has_eip3009: scan.has_eip3009,
            has_permit2,
            implementation,
        }
    }

    /// Capabilities of a token that could not be inspected.
    #[must_use]
    pub fn unknown(address: Address) -> Self {
        Self::new(address, BytecodeScan::default(), false, None)
    }

    /// Returns `true` if `scheme` can be used with this token.
    ///
    /// Permit2 with witness is available wherever Permit2 is.
    #[must_use]
    pub fn supports(&self, scheme: SchemeId) -> bool {
        match scheme {
            SchemeId::Permit => self.has_permit,
            SchemeId::Eip3009 => self.has_eip3009,
            SchemeId::Permit2 | SchemeId::Permit2Witness => self.has_permit2,
        }
    }

    /// The preferred method for this token, see [`recommend`].
    #[must_use]
    pub fn recommended(&self) -> Option<SchemeId> {
        recommend(self)
    }
}

/// Picks the preferred method: `eip3009`, then `permit`, then `permit2`.
///
/// EIP-3009 needs no allowance and no extra contract; `permit` needs a
/// settlement contract at `payTo`; Permit2 needs a prior ERC-20 approval.
#[must_use]
pub fn recommend(capabilities: &TokenCapabilities) -> Option<SchemeId> {
    [SchemeId::Eip3009, SchemeId::Permit, SchemeId::Permit2]
        .into_iter()
        .find(|&id| capabilities.supports(id))
}

/// Detects and caches token capabilities for one chain.
pub struct TokenCapabilityDetector<R> {
    reader: R,
    permit2_address: Address,
    cache: DashMap<Address, Arc<OnceCell<TokenCapabilities>>>,
}

impl<R> std::fmt::Debug for TokenCapabilityDetector<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCapabilityDetector")
            .field("permit2_address", &self.permit2_address)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl<R: Eip155ChainReader> TokenCapabilityDetector<R> {
    /// Creates a detector over `reader` using the canonical Permit2 address.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            permit2_address: PERMIT2_ADDRESS,
            cache: DashMap::new(),
        }
    }

    /// Uses a non-canonical Permit2 deployment.
    #[must_use]
    pub fn with_permit2_address(mut self, permit2_address: Address) -> Self {
        self.permit2_address = permit2_address;
        self
    }

    /// Returns the chain reader.
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Detects the capabilities of `token`.
    ///
    /// Never fails: an RPC failure yields [`TokenCapabilities::unknown`],
    /// which is returned but not cached.
    pub async fn detect(&self, token: Address) -> TokenCapabilities {
        let cell = {
            let entry = self.cache.entry(token).or_default();
            Arc::clone(entry.value())
        };
        if let Some(cached) = cell.get() {
            #[cfg(feature = "telemetry")]
            tracing::debug!(%token, "token capabilities cache hit");
            return cached.clone();
        }
        match cell.get_or_try_init(|| self.inspect(token)).await {
            Ok(capabilities) => capabilities.clone(),
            Err(e) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(%token, error = %e, "token capability detection failed");
                #[cfg(not(feature = "telemetry"))]
                let _ = e;
                TokenCapabilities::unknown(token)
            }
        }
    }

    /// Returns cached capabilities without touching the chain.
    #[must_use]
    pub fn cached(&self, token: Address) -> Option<TokenCapabilities> {
        self.cache
            .get(&token)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Drops one cached entry, or all of them when `token` is `None`.
    pub fn clear_cache(&self, token: Option<Address>) {
        match token {
            Some(token) => {
                self.cache.remove(&token);
            }
            None => self.cache.clear(),
        }
    }

    async fn inspect(&self, token: Address) -> Result<TokenCapabilities, ChainReadError> {
        let (code, permit2_code) = tokio::join!(
            self.reader.get_code(token),
            self.reader.get_code(self.permit2_address),
        );
        let code = code?;
        let has_permit2 = !permit2_code?.is_empty();

        let mut scan = BytecodeScan::of(&code);
        let mut implementation = None;
        if scan.is_empty() && !code.is_empty() {
            if let Some(resolved) = proxy::resolve_implementation(&self.reader, token).await? {
                let implementation_code = self.reader.get_code(resolved).await?;
                scan = scan.merge(BytecodeScan::of(&implementation_code));
                implementation = Some(resolved);
            }
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(
            %token,
            permit = scan.has_permit,
            eip3009 = scan.has_eip3009,
            permit2 = has_permit2,
            implementation = ?implementation,
            "detected token capabilities"
        );
        Ok(TokenCapabilities::new(token, scan, has_permit2, implementation))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{Bytes, address};
    use futures_util::future::join_all;

    use super::*;
    use crate::testing::{MockChain, code_with};

    const TOKEN: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");
    const IMPLEMENTATION: Address = address!("0x00000000000000000000000000000000000000c1");

    fn chain_with_permit2() -> MockChain {
        let chain = MockChain::new(84532);
        chain.set_code(PERMIT2_ADDRESS, Bytes::from_static(&[0x60, 0x80]));
        chain
    }

    #[tokio::test]
    async fn direct_selectors_are_detected() {
        let chain = chain_with_permit2();
        chain.set_code(
            TOKEN,
            code_with(&[bytecode::PERMIT_SELECTOR, bytecode::EIP3009_SELECTORS[1]]),
        );
        let detector = TokenCapabilityDetector::new(chain);

        let caps = detector.detect(TOKEN).await;
        assert!(caps.has_permit && caps.has_eip3009 && caps.has_permit2);
        assert_eq!(
            caps.supported_methods,
            vec![SchemeId::Permit, SchemeId::Eip3009, SchemeId::Permit2]
        );
        assert_eq!(caps.implementation, None);
        assert_eq!(caps.recommended(), Some(SchemeId::Eip3009));
    }

    #[tokio::test]
    async fn second_detection_does_no_reads() {
        let chain = Arc::new(chain_with_permit2());
        chain.set_code(TOKEN, code_with(&[bytecode::PERMIT_SELECTOR]));
        let detector = TokenCapabilityDetector::new(Arc::clone(&chain));

        let first = detector.detect(TOKEN).await;
        let reads = chain.reads();
        let second = detector.detect(TOKEN).await;
        assert_eq!(first, second);
        assert_eq!(chain.reads(), reads);
        assert_eq!(detector.cached(TOKEN), Some(first));
    }

    #[tokio::test]
    async fn concurrent_detections_coalesce() {
        let chain = Arc::new(chain_with_permit2().with_latency(Duration::from_millis(20)));
        chain.set_code(TOKEN, code_with(&[bytecode::EIP3009_SELECTORS[0]]));
        let detector = TokenCapabilityDetector::new(Arc::clone(&chain));

        let results = join_all((0..8).map(|_| detector.detect(TOKEN))).await;
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        // token code + Permit2 code, once
        assert_eq!(chain.reads(), 2);
    }

    #[tokio::test]
    async fn clear_cache_forces_a_new_read() {
        let chain = Arc::new(chain_with_permit2());
        chain.set_code(TOKEN, code_with(&[bytecode::PERMIT_SELECTOR]));
        let detector = TokenCapabilityDetector::new(Arc::clone(&chain));

        detector.detect(TOKEN).await;
        let reads = chain.reads();
        detector.clear_cache(Some(TOKEN));
        assert_eq!(detector.cached(TOKEN), None);
        detector.detect(TOKEN).await;
        assert!(chain.reads() > reads);

        let reads = chain.reads();
        detector.clear_cache(None);
        detector.detect(TOKEN).await;
        assert!(chain.reads() > reads);
    }

    #[tokio::test]
    async fn proxy_implementation_is_scanned() {
        let chain = chain_with_permit2();
        chain.set_code(TOKEN, Bytes::from_static(&[0x36, 0x3d, 0x3d, 0x37]));
        chain.set_storage(
            TOKEN,
            proxy::EIP1967_IMPLEMENTATION_SLOT,
            IMPLEMENTATION.into_word(),
        );
        chain.set_code(IMPLEMENTATION, code_with(&[bytecode::EIP3009_SELECTORS[1]]));
        let detector = TokenCapabilityDetector::new(chain);

        let caps = detector.detect(TOKEN).await;
        assert!(caps.has_eip3009);
        assert!(!caps.has_permit);
        assert_eq!(caps.implementation, Some(IMPLEMENTATION));
    }

    #[tokio::test]
    async fn plain_token_only_has_permit2() {
        let chain = chain_with_permit2();
        chain.set_code(TOKEN, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
        let detector = TokenCapabilityDetector::new(chain);

        let caps = detector.detect(TOKEN).await;
        assert_eq!(caps.supported_methods, vec![SchemeId::Permit2]);
        assert_eq!(caps.recommended(), Some(SchemeId::Permit2));
    }

    #[tokio::test]
    async fn rpc_failure_degrades_and_is_not_cached() {
        let chain = Arc::new(chain_with_permit2());
        chain.set_code(TOKEN, code_with(&[bytecode::PERMIT_SELECTOR]));
        chain.set_offline(true);
        let detector = TokenCapabilityDetector::new(Arc::clone(&chain));

        let degraded = detector.detect(TOKEN).await;
        assert_eq!(degraded, TokenCapabilities::unknown(TOKEN));
        assert_eq!(detector.cached(TOKEN), None);

        chain.set_offline(false);
        let caps = detector.detect(TOKEN).await;
        assert!(caps.has_permit);
    }

    #[test]
    fn recommendation_priority() {
        let both = TokenCapabilities::new(
            TOKEN,
            BytecodeScan {
                has_permit: true,
                has_eip3009: true,
            },
            false,
            None,
        );
        assert_eq!(recommend(&both), Some(SchemeId::Eip3009));

        let permit2_only = TokenCapabilities::new(TOKEN, BytecodeScan::default(), true, None);
        assert_eq!(recommend(&permit2_only), Some(SchemeId::Permit2));
        assert!(permit2_only.supports(SchemeId::Permit2Witness));

        assert_eq!(recommend(&TokenCapabilities::unknown(TOKEN)), None);
    }

    #[test]
    fn capabilities_serialize_in_camel_case() {
        let caps = TokenCapabilities::new(TOKEN, BytecodeScan::default(), true, None);
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["supportedMethods"][0], "permit2");
        assert_eq!(json["hasPermit2"], true);
        assert!(json.get("implementation").is_none());
    }
}
