#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Chain-agnostic core of an x402 payment verification and settlement service.
//!
//! A resource server answers an unpaid request with a 402 body listing
//! [`PaymentRequirements`](proto::PaymentRequirements). The client retries with a
//! signed authorization in the `X-PAYMENT` header. This crate decodes that
//! header, hands the payload to a chain-specific [`Facilitator`](facilitator::Facilitator)
//! for verification and settlement, and reports the outcome with the x402
//! facilitator wire shape.
//!
//! # Modules
//!
//! - [`proto`] - Wire format types, reason codes, timestamps and encoding helpers
//! - [`headers`] - `X-PAYMENT` / `X-PAYMENT-RESPONSE` header codec
//! - [`scheme`] - The `"exact"` scheme marker
//! - [`facilitator`] - The trait implemented by chain crates
//! - [`orchestrator`] - The parse, verify, settle pipeline
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation of the pipeline

pub mod facilitator;
pub mod headers;
pub mod orchestrator;
pub mod proto;
pub mod scheme;
