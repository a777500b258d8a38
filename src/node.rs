//! Node wiring: builds the admission gate, relayer, and registry over one
//! settlement instance and runs the background expiry sweep.

use crate::admission::{AdmissionControl, IouStore};
use crate::config::NodeConfig;
use crate::error::Result;
use crate::event::{create_event_channel, NodeEvent, NodeEventsChannel, NodeEventsSender};
use crate::ledger::{Chain, ChainHandle, EscrowParams};
use crate::pricing::{PerUnitPricing, PricingOracle};
use crate::registry::{Registry, Service};
use crate::relayer::{Relayer, SubmissionReceipt};
use crate::voucher::Debit;
use alloy_primitives::{Address, Signature, B256, U256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Builder for constructing an mcpay node.
pub struct NodeBuilder {
    config: NodeConfig,
    pricing: Option<Arc<dyn PricingOracle>>,
}

impl NodeBuilder {
    /// Create a new node builder with the given configuration.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            pricing: None,
        }
    }

    /// Override the pricing oracle (defaults to [`PerUnitPricing`]).
    #[must_use]
    pub fn with_pricing(mut self, pricing: Arc<dyn PricingOracle>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Build and start the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node fails to start.
    pub fn build(self) -> Result<RunningNode> {
        info!("Building mcpay-node with config: {:?}", self.config);

        std::fs::create_dir_all(&self.config.root_dir)?;
        // Record the effective configuration so operators can inspect what
        // the node actually runs with after CLI/env overlays.
        self.config
            .to_file(&self.config.root_dir.join("config.toml"))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();

        let mut chain = Chain::new(
            self.config.chain_id,
            self.config.settlement_address,
            EscrowParams {
                cooling_period: self.config.escrow.cooling_period_secs,
                allow_instant_withdraw: self.config.escrow.allow_instant_withdraw,
            },
            U256::from(self.config.per_call_limit),
        );
        for token in &self.config.allowed_tokens {
            chain.set_token_allowed(*token, true);
        }
        let chain = ChainHandle::new(chain);

        let store = Arc::new(IouStore::new());
        let pricing = self
            .pricing
            .unwrap_or_else(|| Arc::new(PerUnitPricing));
        let admission = Arc::new(AdmissionControl::new(
            Arc::new(chain.clone()),
            pricing,
            Arc::clone(&store),
            chain.domain(),
            self.config.admission.voucher_ttl_secs,
        ));
        let relayer = Arc::new(Relayer::new(
            chain.clone(),
            Arc::clone(&store),
            self.config.relayer.max_batch,
        ));

        Ok(RunningNode {
            config: self.config,
            chain,
            registry: Arc::new(Registry::new()),
            store,
            admission,
            relayer,
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// A running mcpay node.
pub struct RunningNode {
    config: NodeConfig,
    chain: ChainHandle,
    registry: Arc<Registry>,
    store: Arc<IouStore>,
    admission: Arc<AdmissionControl>,
    relayer: Arc<Relayer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: NodeEventsSender,
    events_rx: Option<NodeEventsChannel>,
}

impl RunningNode {
    /// Get the node's root directory.
    #[must_use]
    pub fn root_dir(&self) -> &PathBuf {
        &self.config.root_dir
    }

    /// Handle to the settlement instance.
    #[must_use]
    pub fn chain(&self) -> &ChainHandle {
        &self.chain
    }

    /// The provider/service registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The admission gate.
    #[must_use]
    pub fn admission(&self) -> &Arc<AdmissionControl> {
        &self.admission
    }

    /// The relayer.
    #[must_use]
    pub fn relayer(&self) -> &Arc<Relayer> {
        &self.relayer
    }

    /// Admit a signed voucher through the gate, emitting
    /// [`NodeEvent::VoucherAdmitted`] on success.
    ///
    /// # Errors
    ///
    /// See [`AdmissionControl::admit`].
    pub fn admit_voucher(
        &self,
        debit: Debit,
        signature: Signature,
        service: &Service,
        payload: &serde_json::Value,
    ) -> Result<B256> {
        let payer = debit.payer;
        let provider = debit.provider;
        let amount = debit.amount;
        let id = self.admission.admit(debit, signature, service, payload)?;
        let _ = self.events_tx.send(NodeEvent::VoucherAdmitted {
            id,
            payer,
            provider,
            amount,
        });
        Ok(id)
    }

    /// Claim pending vouchers for a provider, emitting
    /// [`NodeEvent::BatchSettled`] when a batch lands.
    ///
    /// # Errors
    ///
    /// See [`Relayer::claim_for_provider`]; a failed claim also emits
    /// [`NodeEvent::Error`].
    pub fn claim_for_provider(&self, provider: Address) -> Result<Option<SubmissionReceipt>> {
        match self.relayer.claim_for_provider(provider) {
            Ok(Some(receipt)) => {
                let _ = self.events_tx.send(NodeEvent::BatchSettled {
                    provider,
                    tx_id: receipt.tx_id,
                    count: receipt.count,
                });
                Ok(Some(receipt))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let _ = self.events_tx.send(NodeEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Authenticate a provider by API key, then claim its pending vouchers.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Unauthorized`] for an unknown key, otherwise as
    /// [`Self::claim_for_provider`].
    pub fn claim_with_key(&self, api_key: &str) -> Result<Option<SubmissionReceipt>> {
        let provider = self.registry.authenticate(api_key)?;
        self.claim_for_provider(provider.address)
    }

    /// Bump a payer's epoch, revoking all outstanding vouchers signed under
    /// the prior epoch. Returns the new epoch.
    pub fn bump_epoch(&self, payer: Address) -> u64 {
        let epoch = self.chain.with(|c| c.bump_epoch(payer));
        let _ = self.events_tx.send(NodeEvent::EpochBumped { payer, epoch });
        epoch
    }

    /// Get a receiver for node events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<NodeEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to node events.
    #[must_use]
    pub fn subscribe_events(&self) -> NodeEventsChannel {
        self.events_tx.subscribe()
    }

    /// Run the node until shutdown is requested.
    ///
    /// Sweeps due expiries on an interval so abandoned vouchers release
    /// their payers' budgets without waiting for the next claim.
    ///
    /// # Errors
    ///
    /// Returns an error if the node encounters a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting mcpay-node");

        let _ = self.events_tx.send(NodeEvent::Started);

        let mut sweep = tokio::time::interval(Duration::from_secs(
            self.config.admission.expiry_sweep_secs.max(1),
        ));

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
                _ = sweep.tick() => {
                    let now = self.chain.with(|c| c.sync_to_wall_clock());
                    let expired = self.store.expire_due(now);
                    if !expired.is_empty() {
                        let _ = self.events_tx.send(NodeEvent::VoucherExpired {
                            count: expired.len(),
                        });
                    }
                }
            }
        }

        let _ = self.events_tx.send(NodeEvent::ShuttingDown);
        info!("Node shutdown complete");
        Ok(())
    }

    /// Request the node to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
