//! Backend collaborators the carts depend on. The HTTP adapter lives in
//! `farmacia-client`; tests use in-memory fakes.

use async_trait::async_trait;

use crate::{
    errors::Error,
    inputs::{LotRecord, MedicationHit, ReferenceId},
    inventory::{CpmUpdate, LotEdit},
    report::{ReportFormat, ReportRequest},
    workflows::{BulkUploadResults, PatientRecord, UploadFile, Workflow},
};

#[async_trait]
pub trait MedicationSearch: Send + Sync {
    /// Active medications matching `query` by key or description.
    async fn search_medications(&self, query: &str) -> Result<Vec<MedicationHit>, Error>;
}

#[async_trait]
pub trait LotLookup: Send + Sync {
    /// Lot by id or lot code, as read from a QR label or typed.
    async fn lookup_lot(&self, code: &str) -> Result<LotRecord, Error>;
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn patient_by_curp(&self, curp: &str) -> Result<PatientRecord, Error>;

    async fn patient_by_name(&self, name: &str) -> Result<PatientRecord, Error>;
}

#[async_trait]
pub trait CommitGateway<W: Workflow>: Send + Sync {
    /// Persist the whole batch in one request.
    async fn commit(&self, payload: &W::Payload, idempotency_key: &str) -> Result<W::Receipt, Error>;
}

#[async_trait]
pub trait ReportGateway: Send + Sync {
    async fn generate_report(&self, format: ReportFormat, report: &ReportRequest) -> Result<Vec<u8>, Error>;
}

#[async_trait]
pub trait BulkUploadGateway: Send + Sync {
    async fn upload(&self, file: &UploadFile) -> Result<BulkUploadResults, Error>;
}

#[async_trait]
pub trait InventoryMaintenance: Send + Sync {
    /// Store a medication's CPM; returns the value the backend kept.
    async fn update_cpm(&self, update: &CpmUpdate) -> Result<u64, Error>;

    /// Edit a lot row; returns the backend's confirmation message.
    async fn edit_lot(&self, lote_id: &ReferenceId, edit: &LotEdit) -> Result<String, Error>;
}

/// Supplies the anti-forgery token the host page owns.
pub trait CredentialSupplier: Send + Sync {
    fn csrf_token(&self) -> Option<String>;
}

/// A token fixed at startup, or none.
#[derive(Clone, Debug, Default)]
pub struct StaticCredential(pub Option<String>);

impl CredentialSupplier for StaticCredential {
    fn csrf_token(&self) -> Option<String> {
        self.0.clone()
    }
}
