//! Request/response exchange with a provider.
//!
//! Interface only: the framing (WebSocket or otherwise) that carries these
//! values to a real provider lives outside this crate. The in-process
//! [`EchoTransport`] stands in for tests and demos.

use crate::error::Result;
use crate::voucher::Debit;
use alloy_primitives::Signature;
use serde::{Deserialize, Serialize};

/// A paid service call: the request payload plus its signed voucher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    /// Service request payload.
    pub payload: serde_json::Value,
    /// The admitted voucher.
    pub debit: Debit,
    /// The payer's signature over the voucher.
    pub signature: Signature,
}

/// Provider's reply to a paid call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResponse {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Result payload on success.
    pub result: Option<serde_json::Value>,
    /// Error description on failure.
    pub error: Option<String>,
}

impl CallResponse {
    /// A successful reply.
    #[must_use]
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Transport that delivers a paid call to a provider.
pub trait ProviderTransport: Send + Sync {
    /// Deliver the call and return the provider's reply.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery itself fails (a provider-side failure is
    /// an `ok: false` reply, not an error).
    fn call(&self, request: CallRequest) -> Result<CallResponse>;
}

/// In-process transport that echoes the payload back. Test/demo stand-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTransport;

impl ProviderTransport for EchoTransport {
    fn call(&self, request: CallRequest) -> Result<CallResponse> {
        Ok(CallResponse::success(request.payload))
    }
}
