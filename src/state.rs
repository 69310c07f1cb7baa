use std::sync::Arc;

use crate::{
    auth::{OpaqueTokenIdentity, SharedIdentity},
    services::{ledger::TripLedger, storage::SharedStore},
};

#[derive(Clone)]
pub struct AppState {
    pub ledger: TripLedger,
    pub identity: SharedIdentity,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        Self::with_identity(store, Arc::new(OpaqueTokenIdentity))
    }

    pub fn with_identity(store: SharedStore, identity: SharedIdentity) -> Self {
        Self {
            ledger: TripLedger::new(store),
            identity,
        }
    }
}
