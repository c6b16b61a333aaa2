//! Exact-scheme facilitator settings.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::exact::types::PERMIT2_ADDRESS;

/// Settings for [`Eip155ExactFacilitator`](super::Eip155ExactFacilitator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Eip155ExactConfig {
    /// An authorization that expires within this many seconds is treated
    /// as already expired, leaving room for the settlement to be mined.
    pub clock_skew_tolerance_secs: u64,
    /// The Permit2 deployment used for `permit2` and `permit2-witness`.
    pub permit2_address: Address,
}

impl Default for Eip155ExactConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_secs: 6,
            permit2_address: PERMIT2_ADDRESS,
        }
    }
}
