//! Shared state for the HTTP adapters.

use std::sync::Arc;

use crate::application::{AccessGate, GetAccessFlagHandler, GetAccountHandler, ReconcileWebhookHandler};
use crate::domain::billing::{PlanCatalog, WebhookVerifier};
use crate::ports::{
    AccessFlagReader, IdentityVerifier, ReconciliationStore, StoreHealth, UserDirectory,
};

/// Application state shared by all routes.
///
/// Handlers are built once at startup; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub webhook_handler: Arc<ReconcileWebhookHandler>,
    pub account_handler: Arc<GetAccountHandler>,
    pub access_flag_handler: Arc<GetAccessFlagHandler>,
    pub access_gate: AccessGate,
    pub identity_verifier: Arc<dyn IdentityVerifier>,
    pub store_health: Arc<dyn StoreHealth>,
}

impl AppState {
    /// Builds every handler from one store that serves all the store ports.
    pub fn new<S>(
        store: Arc<S>,
        verifier: WebhookVerifier,
        catalog: PlanCatalog,
        identity_verifier: Arc<dyn IdentityVerifier>,
    ) -> Self
    where
        S: ReconciliationStore + AccessFlagReader + UserDirectory + StoreHealth + 'static,
    {
        let reconciliation: Arc<dyn ReconciliationStore> = store.clone();
        let reader: Arc<dyn AccessFlagReader> = store.clone();
        let directory: Arc<dyn UserDirectory> = store.clone();
        let store_health: Arc<dyn StoreHealth> = store;

        Self {
            webhook_handler: Arc::new(ReconcileWebhookHandler::new(
                Arc::new(verifier),
                reconciliation,
                Arc::new(catalog),
            )),
            account_handler: Arc::new(GetAccountHandler::new(directory, reader.clone())),
            access_flag_handler: Arc::new(GetAccessFlagHandler::new(reader.clone())),
            access_gate: AccessGate::new(reader),
            identity_verifier,
            store_health,
        }
    }
}
