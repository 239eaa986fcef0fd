use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::StagingCart,
    errors::RejectReason,
    workflows::{Entry, EntryHeader},
};

pub const ENTRY_REPORT_TITLE: &str = "REPORTE DE ENTRADA DE MEDICAMENTOS";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Xlsx,
}

impl ReportFormat {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "generar-reporte-pdf",
            ReportFormat::Xlsx => "generar-reporte-excel",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    /// `ENTRADA_{folio}.{ext}`
    pub fn file_name(&self, folio: &str) -> String {
        format!("ENTRADA_{}.{}", folio, self.extension())
    }
}

/// Snapshot of an entry cart sent to the report endpoints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportRequest {
    pub titulo: String,
    pub folio: String,
    pub fecha: NaiveDate,
    pub tipo_entrada: String,
    pub almacen: Option<String>,
    pub institucion: Option<String>,
    pub fuente_financiamiento: String,
    pub proceso: String,
    pub items: Vec<ReportItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportItem {
    pub nombre: String,
    pub lote: String,
    pub presentacion: String,
    pub cantidad: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub precio_unitario: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl ReportRequest {
    pub fn for_entry(cart: &StagingCart<Entry>, header: &EntryHeader) -> Result<Self, RejectReason> {
        if cart.is_empty() {
            return Err(RejectReason::EmptyCart);
        }

        let items = cart
            .items()
            .iter()
            .map(|item| ReportItem {
                nombre: item.display_label.clone(),
                lote: item.lot_code.clone().unwrap_or_default(),
                presentacion: item.detail.presentacion.clone(),
                cantidad: item.quantity,
                precio_unitario: item.unit_price.unwrap_or_default(),
                total: item.computed_total().unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            titulo: ENTRY_REPORT_TITLE.to_string(),
            folio: header.folio.clone(),
            fecha: header.fecha,
            tipo_entrada: header.tipo_entrada.clone(),
            almacen: header.almacen.clone(),
            institucion: header.institucion.clone(),
            fuente_financiamiento: header.fuente_financiamiento.clone(),
            proceso: header.proceso.clone(),
            items,
            total: cart.total(),
        })
    }
}
