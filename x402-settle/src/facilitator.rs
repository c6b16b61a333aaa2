//! The seam between the chain-agnostic pipeline and a chain implementation.
//!
//! A [`Facilitator`] owns everything chain specific: it knows the payload
//! shape for its chain family, verifies authorizations with read-only chain
//! access, and settles them by submitting a transaction. It reports results
//! as plain [`VerifyOutcome`] / [`SettleOutcome`] values; failures are never
//! surfaced as errors across this boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::proto::{PaymentPayload, PaymentRequirements, SettleOutcome, VerifyOutcome};

/// A boxed, `Send` future borrowing from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Verifies and settles payments for one chain family.
pub trait Facilitator: Send + Sync {
    /// The scheme-specific `payload` object carried in [`PaymentPayload`].
    type Payload: Serialize + DeserializeOwned + Send + Sync;

    /// Checks a payload against its requirements without mutating chain state.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload<Self::Payload>,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyOutcome>;

    /// Re-verifies a payload and, if still valid, executes the transfer.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload<Self::Payload>,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleOutcome>;
}

impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    type Payload = T::Payload;

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload<Self::Payload>,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, VerifyOutcome> {
        (**self).verify(payload, requirements)
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload<Self::Payload>,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, SettleOutcome> {
        (**self).settle(payload, requirements)
    }
}
