#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) support for x402 payment verification and settlement.
//!
//! This crate plugs the EVM `"exact"` scheme into the chain-agnostic
//! pipeline of [`x402_settle`]. A single facilitator accepts four kinds of
//! signed authorization and settles each with exactly one transaction:
//!
//! | `authorizationType` | Standard | Settled through |
//! |---|---|---|
//! | `permit` | EIP-2612 | `settleWithPermit` on the `payTo` contract |
//! | `eip3009` | EIP-3009 | `transferWithAuthorization` on the token |
//! | `permit2` | Uniswap Permit2 | `permitTransferFrom` on Permit2 |
//! | `permit2-witness` | Permit2 + witness | `permitWitnessTransferFrom` on Permit2 |
//!
//! # Architecture
//!
//! - [`chain`] - Read/write capabilities over an EVM chain and the alloy-backed provider
//! - [`detector`] - Token capability detection with proxy resolution and caching
//! - [`exact`] - Payload types, verification and settlement for the exact scheme
//! - [`config`] - TOML configuration for chains and the facilitator
//!
//! # Feature Flags
//!
//! - `telemetry` - `tracing` spans and events around chain calls and settlement

/// Awaits a future, optionally instrumenting it with a tracing span.
macro_rules! traced {
    ($fut:expr, $span:expr) => {{
        #[cfg(feature = "telemetry")]
        {
            use tracing::Instrument;
            $fut.instrument($span).await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            $fut.await
        }
    }};
}

pub mod chain;
pub mod config;
pub mod detector;
pub mod exact;

mod networks;
pub use networks::*;

#[cfg(test)]
mod testing;

pub use detector::{TokenCapabilities, TokenCapabilityDetector};
pub use exact::{Eip155ExactFacilitator, ExactEvmPayload, SchemeId};
