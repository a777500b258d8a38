//! Provider and service repositories.
//!
//! Explicit store objects passed by reference into the admission and relayer
//! layers; lifecycle is tied to the node, never process-wide statics.

use crate::error::{Error, Result};
use crate::pricing::PricingUnit;
use alloy_primitives::{keccak256, Address, B256, U256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// A registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Settlement address payments are credited to.
    pub address: Address,
    /// Display name.
    pub name: String,
    /// API key used to authenticate claim requests.
    pub api_key: String,
}

/// A priced service offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// `keccak256("{provider}:{slug}")`.
    pub service_id: B256,
    /// Owning provider's settlement address.
    pub provider: Address,
    /// URL-safe service name, unique per provider.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Billing unit.
    pub unit: PricingUnit,
    /// Price per unit, in the token's smallest unit.
    pub price_per_unit: U256,
    /// Settlement token the service is billed in.
    pub token: Address,
}

/// Derive a service identifier from its provider and slug.
#[must_use]
pub fn service_id(provider: Address, slug: &str) -> B256 {
    keccak256(format!("{provider}:{slug}").as_bytes())
}

/// In-memory provider/service repositories.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<HashMap<String, Provider>>,
    services: RwLock<HashMap<B256, Service>>,
}

impl Registry {
    /// Create empty repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, keyed by its API key.
    pub fn register_provider(&self, provider: Provider) {
        info!(address = %provider.address, name = %provider.name, "provider registered");
        self.providers
            .write()
            .insert(provider.api_key.clone(), provider);
    }

    /// Authenticate a claim request by API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for an unknown key.
    pub fn authenticate(&self, api_key: &str) -> Result<Provider> {
        self.providers
            .read()
            .get(api_key)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("bad api key".to_string()))
    }

    /// Register a service; the id is derived from provider and slug.
    pub fn register_service(
        &self,
        provider: Address,
        slug: &str,
        title: &str,
        description: Option<String>,
        unit: PricingUnit,
        price_per_unit: U256,
        token: Address,
    ) -> Service {
        let service = Service {
            service_id: service_id(provider, slug),
            provider,
            slug: slug.to_string(),
            title: title.to_string(),
            description,
            unit,
            price_per_unit,
            token,
        };
        info!(service_id = %service.service_id, %provider, slug, "service registered");
        self.services
            .write()
            .insert(service.service_id, service.clone());
        service
    }

    /// Look up a service by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownService`] if no service has this id.
    pub fn service(&self, id: B256) -> Result<Service> {
        self.services
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownService(id))
    }

    /// All services owned by a provider address.
    #[must_use]
    pub fn services_by_provider(&self, provider: Address) -> Vec<Service> {
        self.services
            .read()
            .values()
            .filter(|s| s.provider == provider)
            .cloned()
            .collect()
    }
}
