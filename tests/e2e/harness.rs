//! Test harness that wires a full node: settlement instance, registry,
//! admission gate, and relayer, with helpers for the common payer flow.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use alloy_primitives::{address, Address, B256, U256};
use mcpay_node::{
    CallRequest, CallResponse, EchoTransport, NodeBuilder, NodeConfig, PayerClient, PricingUnit,
    Provider, ProviderTransport, RunningNode, Service, SubmissionReceipt,
};

/// Settlement token used throughout the e2e suite.
pub const TOKEN: Address = address!("0x00000000000000000000000000000000000000bb");

/// Address of the settlement instance.
pub const SETTLEMENT: Address = address!("0x00000000000000000000000000000000000000cc");

/// Provider address payments are credited to.
pub const PROVIDER: Address = address!("0x00000000000000000000000000000000000000aa");

/// Test harness that manages the complete test environment.
pub struct TestHarness {
    node: RunningNode,
}

impl TestHarness {
    /// Build a node with the standard e2e configuration.
    pub fn setup() -> Self {
        Self::setup_with_config(Self::default_config())
    }

    /// Build a node with a custom configuration.
    pub fn setup_with_config(config: NodeConfig) -> Self {
        let node = NodeBuilder::new(config).build().expect("node builds");
        node.registry().register_provider(Provider {
            address: PROVIDER,
            name: "acme".to_string(),
            api_key: "acme-key".to_string(),
        });
        Self { node }
    }

    /// The standard e2e configuration: one allowed token, short exit window.
    pub fn default_config() -> NodeConfig {
        let mut config = NodeConfig {
            root_dir: std::env::temp_dir().join("mcpay-e2e"),
            settlement_address: SETTLEMENT,
            allowed_tokens: vec![TOKEN],
            ..NodeConfig::default()
        };
        config.escrow.cooling_period_secs = 1_000;
        config
    }

    /// The node under test.
    pub fn node(&self) -> &RunningNode {
        &self.node
    }

    /// Register a flat per-call service.
    pub fn flat_service(&self, slug: &str, price: u64) -> Service {
        self.node.registry().register_service(
            PROVIDER,
            slug,
            slug,
            None,
            PricingUnit::Call,
            U256::from(price),
            TOKEN,
        )
    }

    /// Register a per-1000-chars service.
    pub fn chars_service(&self, slug: &str, price_per_block: u64) -> Service {
        self.node.registry().register_service(
            PROVIDER,
            slug,
            slug,
            None,
            PricingUnit::Chars,
            U256::from(price_per_block),
            TOKEN,
        )
    }

    /// Create a payer with collateral already deposited.
    pub fn new_funded_payer(&self, amount: u64) -> PayerClient {
        let payer = PayerClient::random();
        self.node
            .chain()
            .with(|c| c.deposit(payer.address(), U256::from(amount)))
            .expect("deposit");
        payer
    }

    /// Full payer flow for one call: assigned terms, signed voucher,
    /// admission. Returns the IOU id.
    pub fn paid_call(
        &self,
        payer: &PayerClient,
        service: &Service,
        payload: &serde_json::Value,
    ) -> mcpay_node::Result<B256> {
        let terms = self
            .node
            .admission()
            .prepare(service, payer.address(), payload)?;
        let (debit, signature) =
            payer.sign_voucher(service, &terms, &self.node.chain().domain())?;
        self.node.admit_voucher(debit, signature, service, payload)
    }

    /// Deliver an admitted call to the provider over the in-process
    /// transport, attaching the recorded voucher.
    pub fn call_provider(
        &self,
        id: B256,
        payload: &serde_json::Value,
    ) -> mcpay_node::Result<CallResponse> {
        let iou = self
            .node
            .admission()
            .store()
            .get(&id)
            .expect("admitted voucher is recorded");
        EchoTransport.call(CallRequest {
            payload: payload.clone(),
            debit: iou.debit,
            signature: iou.signature,
        })
    }

    /// Claim all pending vouchers for the test provider, authenticating with
    /// its API key.
    pub fn claim(&self) -> mcpay_node::Result<Option<SubmissionReceipt>> {
        self.node.claim_with_key("acme-key")
    }

    /// Payer's escrow balance.
    pub fn balance(&self, payer: Address) -> U256 {
        self.node.chain().with(|c| c.balance(payer))
    }

    /// Provider's credited total.
    pub fn provider_balance(&self) -> U256 {
        self.node.chain().with(|c| c.provider_balance(PROVIDER))
    }
}
