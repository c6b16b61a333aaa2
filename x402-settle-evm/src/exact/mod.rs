//! EVM "exact" payment scheme implementation.
//!
//! The payer signs one of four authorizations for at least the required
//! amount; the facilitator checks it against the chain and settles it with
//! a single transaction.
//!
//! - [`types`] - Payload, requirement and EIP-712 struct definitions
//! - [`contract`] - Solidity interfaces used for reads and settlement
//! - [`facilitator`] - Verification and settlement
//! - [`server`] - Building requirements for a protected resource

pub mod contract;
pub mod facilitator;
pub mod server;
pub mod types;

pub use facilitator::{Eip155ExactConfig, Eip155ExactError, Eip155ExactFacilitator};
pub use server::ExactEvmRequirementsBuilder;
pub use types::*;
