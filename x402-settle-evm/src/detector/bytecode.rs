//! Function selector scanning over deployed bytecode.

use alloy_sol_types::SolCall;

use crate::exact::contract::{IEIP3009, IERC2612};

/// Selector of `permit(address,address,uint256,uint256,uint8,bytes32,bytes32)`.
pub const PERMIT_SELECTOR: [u8; 4] = IERC2612::permitCall::SELECTOR;

/// Selectors of the `transferWithAuthorization` family.
pub const EIP3009_SELECTORS: [[u8; 4]; 3] = [
    IEIP3009::transferWithAuthorization_0Call::SELECTOR,
    IEIP3009::transferWithAuthorization_1Call::SELECTOR,
    IEIP3009::receiveWithAuthorizationCall::SELECTOR,
];

/// Signature-based methods found in a piece of bytecode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BytecodeScan {
    /// EIP-2612 `permit` is present.
    pub has_permit: bool,
    /// An EIP-3009 method is present.
    pub has_eip3009: bool,
}

impl BytecodeScan {
    /// Scans `code` for known selectors.
    #[must_use]
    pub fn of(code: &[u8]) -> Self {
        Self {
            has_permit: contains_selector(code, PERMIT_SELECTOR),
            has_eip3009: EIP3009_SELECTORS
                .iter()
                .any(|&selector| contains_selector(code, selector)),
        }
    }

    /// Returns `true` if no signature-based method was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.has_permit && !self.has_eip3009
    }

    /// Combines the findings of two scans.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            has_permit: self.has_permit || other.has_permit,
            has_eip3009: self.has_eip3009 || other.has_eip3009,
        }
    }
}

/// Returns `true` if the 4-byte `selector` occurs anywhere in `code`.
#[must_use]
pub fn contains_selector(code: &[u8], selector: [u8; 4]) -> bool {
    code.windows(4).any(|window| window == selector.as_slice())
}
