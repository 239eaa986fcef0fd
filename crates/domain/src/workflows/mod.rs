//! Per-screen configuration of the staging cart.

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    cart::{Candidate, LineItem},
    errors::RejectReason,
};

/// Medication entry (`entrada`)
pub mod entry;

/// Dispensing to a patient (`salida`)
pub mod dispense;

/// Excel bulk upload and its result display
pub mod bulk_upload;

pub use bulk_upload::{
    BulkDetail, BulkRow, BulkUpload, BulkUploadResponse, BulkUploadResults, ResultRow, UploadFile,
    UploadWarning,
};
pub use dispense::{
    Dispense, DispenseDetail, DispenseHeader, DispenseReceipt, FormFields, PatientRecord,
};
pub use entry::{
    Entry, EntryDetail, EntryHeader, EntryInput, EntryLine, EntryPayload, EntryReceipt,
};

/// What differs between the screens that share one cart implementation.
pub trait Workflow: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Name used in logs and event envelopes.
    const NAME: &'static str;

    /// Reject a second item with the same lot code.
    const DEDUP_BY_LOT: bool;

    /// Items carry a unit price and contribute to the cart total.
    const PRICED: bool;

    /// Trusted record returned by this screen's lookup endpoint.
    type Lookup: Clone + Debug + Send + Sync;

    /// Fields the operator types alongside the quantity.
    type Input: Debug;

    /// Workflow-specific data carried by each line item.
    type Detail: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;

    /// Form fields outside the cart that go into the commit.
    type Header: Debug + Send + Sync;

    /// Body of the commit request.
    type Payload: Serialize + Debug + Send + Sync;

    /// Decoded success response of the commit request.
    type Receipt: Debug + Send;

    fn candidate(
        lookup: &Self::Lookup,
        quantity: i64,
        input: Self::Input,
    ) -> Result<Candidate<Self::Detail>, RejectReason>;

    /// Lot code known at lookup time, checked against the cart before the
    /// operator types a quantity.
    fn lookup_lot_code(_lookup: &Self::Lookup) -> Option<&str> {
        None
    }

    fn validate_header(_header: &Self::Header) -> Result<(), RejectReason> {
        Ok(())
    }

    /// `idempotency_key` is the key of the pending commit, if any; anything
    /// the workflow generates for a blank header field derives from it.
    fn payload(
        header: &Self::Header,
        items: &[LineItem<Self::Detail>],
        idempotency_key: Option<&str>,
    ) -> Self::Payload;
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), RejectReason> {
    if value.trim().is_empty() {
        return Err(RejectReason::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}
