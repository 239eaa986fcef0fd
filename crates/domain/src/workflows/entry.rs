use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{
    cart::{Candidate, LineItem},
    errors::RejectReason,
    inputs::{MedicationHit, ReferenceId},
};

use super::{require, Workflow};

/// `tipo_entrada` value that takes an institution instead of a warehouse.
pub const TRANSFER: &str = "TRANSFERENCIA";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Entry;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct EntryDetail {
    pub clave: String,
    pub presentacion_id: String,
    pub presentacion: String,
    pub caducidad: NaiveDate,
}

/// Fields typed by the operator after picking a medication.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryInput {
    pub presentacion_id: String,
    pub presentacion: String,
    pub lote: String,
    pub caducidad: NaiveDate,
    pub precio_unitario: Option<Decimal>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct EntryHeader {
    /// Blank means "generate one"
    pub folio: String,
    pub fecha: NaiveDate,
    pub tipo_entrada: String,
    pub almacen: Option<String>,
    pub institucion: Option<String>,
    pub fuente_financiamiento: String,
    pub contrato: String,
    pub proceso: String,
    pub recibido_por: String,
}

impl EntryHeader {
    /// Fill in a generated folio once, so later reads see the same one.
    pub fn ensure_folio(&mut self) -> &str {
        if self.folio.trim().is_empty() {
            self.folio = folio_for(&Ulid::new());
        }
        &self.folio
    }

    /// The typed folio, or one derived from the commit's idempotency key so
    /// every attempt under that key sends the same value.
    pub fn folio_or_derived(&self, idempotency_key: Option<&str>) -> String {
        if !self.folio.trim().is_empty() {
            return self.folio.clone();
        }

        let ulid = idempotency_key
            .and_then(|key| Ulid::from_string(key).ok())
            .unwrap_or_else(Ulid::new);
        folio_for(&ulid)
    }

    pub fn is_transfer(&self) -> bool {
        self.tipo_entrada == TRANSFER
    }
}

fn folio_for(ulid: &Ulid) -> String {
    let date = DateTime::<Utc>::from(ulid.datetime()).date_naive();
    generate_folio(date, (ulid.random() % 10_000) as u16)
}

/// `ENT-YYYYMMDD-NNNN`
pub fn generate_folio(date: NaiveDate, suffix: u16) -> String {
    format!("ENT-{}-{:04}", date.format("%Y%m%d"), suffix % 10_000)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntryPayload {
    pub folio: String,
    pub fecha: NaiveDate,
    pub tipo_entrada: String,
    pub almacen: Option<String>,
    pub institucion: Option<String>,
    pub fuente_financiamiento: String,
    pub contrato: String,
    pub proceso: String,
    pub recibido_por: String,
    pub detalles: Vec<EntryLine>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntryLine {
    pub medicamento_id: ReferenceId,
    pub lote: String,
    pub caducidad: NaiveDate,
    pub cantidad: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub precio_unitario: Decimal,
    pub presentacion_id: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryReceipt {
    pub folio: String,
    pub redirect_url: Option<String>,
}

impl Workflow for Entry {
    const NAME: &'static str = "entrada";
    const DEDUP_BY_LOT: bool = true;
    const PRICED: bool = true;

    type Lookup = MedicationHit;
    type Input = EntryInput;
    type Detail = EntryDetail;
    type Header = EntryHeader;
    type Payload = EntryPayload;
    type Receipt = EntryReceipt;

    fn candidate(
        lookup: &MedicationHit,
        quantity: i64,
        input: EntryInput,
    ) -> Result<Candidate<EntryDetail>, RejectReason> {
        require("presentacion", &input.presentacion_id)?;
        require("lote", &input.lote)?;

        if input.caducidad < Utc::now().date_naive() {
            return Err(RejectReason::ExpiredLot {
                caducidad: input.caducidad.to_string(),
            });
        }

        Ok(Candidate {
            reference_id: lookup.id.clone(),
            display_label: lookup.descripcion.clone(),
            lot_code: Some(input.lote.trim().to_string()),
            quantity,
            max_quantity: None,
            unit_price: input.precio_unitario,
            detail: EntryDetail {
                clave: lookup.clave.clone(),
                presentacion_id: input.presentacion_id,
                presentacion: input.presentacion,
                caducidad: input.caducidad,
            },
        })
    }

    fn validate_header(header: &EntryHeader) -> Result<(), RejectReason> {
        require("tipo_entrada", &header.tipo_entrada)?;
        require("fuente_financiamiento", &header.fuente_financiamiento)?;
        require("proceso", &header.proceso)?;
        require("recibido_por", &header.recibido_por)?;

        if header.is_transfer() {
            require("institucion", header.institucion.as_deref().unwrap_or_default())?;
        } else {
            require("almacen", header.almacen.as_deref().unwrap_or_default())?;
        }
        Ok(())
    }

    fn payload(
        header: &EntryHeader,
        items: &[LineItem<EntryDetail>],
        idempotency_key: Option<&str>,
    ) -> EntryPayload {
        let folio = header.folio_or_derived(idempotency_key);
        let header = header.clone();

        let detalles = items
            .iter()
            .map(|item| EntryLine {
                medicamento_id: item.reference_id.clone(),
                lote: item.lot_code.clone().unwrap_or_default(),
                caducidad: item.detail.caducidad,
                cantidad: item.quantity,
                precio_unitario: item.unit_price.unwrap_or_default(),
                presentacion_id: item.detail.presentacion_id.clone(),
            })
            .collect();

        EntryPayload {
            folio,
            fecha: header.fecha,
            tipo_entrada: header.tipo_entrada,
            almacen: header.almacen.filter(|s| !s.is_empty()),
            institucion: header.institucion.filter(|s| !s.is_empty()),
            fuente_financiamiento: header.fuente_financiamiento,
            contrato: header.contrato,
            proceso: header.proceso,
            recibido_por: header.recibido_por,
            detalles,
        }
    }
}
