//! Pricing oracle interface and the per-unit implementation.
//!
//! The oracle is the sole source of the integer amount a voucher must carry:
//! admission never trusts a client-supplied amount. For a given pricing
//! epoch the quote is a pure function of (service, payload).

use crate::registry::Service;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Pricing oracle: quotes the exact amount a request's voucher must carry.
pub trait PricingOracle: Send + Sync {
    /// The required voucher amount, in the token's smallest unit.
    fn quote(&self, service: &Service, payload: &serde_json::Value) -> U256;
}

/// Billing unit of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingUnit {
    /// Flat price per call.
    Call,
    /// Price per started block of 1000 UTF-8 bytes of `payload.text`.
    Chars,
    /// Price per page (`payload.pages`, default 1).
    Pages,
}

/// Per-unit pricing, matching the platform's service descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerUnitPricing;

impl PricingOracle for PerUnitPricing {
    fn quote(&self, service: &Service, payload: &serde_json::Value) -> U256 {
        match service.unit {
            PricingUnit::Call => service.price_per_unit,
            PricingUnit::Chars => {
                let chars = payload
                    .get("text")
                    .and_then(serde_json::Value::as_str)
                    .map_or(0, |t| t.len() as u64);
                // Ceil-divide into started 1000-byte blocks.
                let blocks = chars.div_ceil(1000);
                U256::from(blocks) * service.price_per_unit
            }
            PricingUnit::Pages => {
                let pages = payload
                    .get("pages")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(1);
                U256::from(pages) * service.price_per_unit
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::Service;
    use alloy_primitives::{address, keccak256};
    use serde_json::json;

    fn service(unit: PricingUnit, price: u64) -> Service {
        Service {
            service_id: keccak256(b"test"),
            provider: address!("0x00000000000000000000000000000000000000aa"),
            slug: "test".to_string(),
            title: "Test".to_string(),
            description: None,
            unit,
            price_per_unit: U256::from(price),
            token: address!("0x00000000000000000000000000000000000000bb"),
        }
    }

    #[test]
    fn test_flat_call_price() {
        let oracle = PerUnitPricing;
        let s = service(PricingUnit::Call, 5_000000);
        assert_eq!(oracle.quote(&s, &json!({})), U256::from(5_000000u64));
    }

    #[test]
    fn test_chars_rounds_up_per_block() {
        let oracle = PerUnitPricing;
        let s = service(PricingUnit::Chars, 1_000000);

        // Empty text: zero blocks.
        assert_eq!(oracle.quote(&s, &json!({ "text": "" })), U256::ZERO);
        // One byte: one started block.
        assert_eq!(
            oracle.quote(&s, &json!({ "text": "x" })),
            U256::from(1_000000u64)
        );
        // Exactly 1000 bytes: still one block.
        assert_eq!(
            oracle.quote(&s, &json!({ "text": "x".repeat(1000) })),
            U256::from(1_000000u64)
        );
        // 1001 bytes: two blocks.
        assert_eq!(
            oracle.quote(&s, &json!({ "text": "x".repeat(1001) })),
            U256::from(2_000000u64)
        );
    }

    #[test]
    fn test_pages_default_to_one() {
        let oracle = PerUnitPricing;
        let s = service(PricingUnit::Pages, 2_000000);
        assert_eq!(oracle.quote(&s, &json!({})), U256::from(2_000000u64));
        assert_eq!(
            oracle.quote(&s, &json!({ "pages": 3 })),
            U256::from(6_000000u64)
        );
    }

    #[test]
    fn test_quote_is_deterministic() {
        let oracle = PerUnitPricing;
        let s = service(PricingUnit::Chars, 1_500000);
        let payload = json!({ "text": "hello world" });
        assert_eq!(oracle.quote(&s, &payload), oracle.quote(&s, &payload));
    }
}
