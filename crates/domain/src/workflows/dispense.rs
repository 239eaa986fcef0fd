use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    cart::{Candidate, LineItem},
    errors::RejectReason,
    inputs::{LotRecord, ReferenceId},
};

use super::{require, Workflow};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Dispense;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseDetail {
    pub clave: Option<String>,
    pub caducidad: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseHeader {
    pub paciente_curp: String,
    pub paciente_nombre: String,
    pub paciente_nacimiento: NaiveDate,
    pub receta_origen: String,
    pub receta_folio: String,
}

impl DispenseHeader {
    /// Copy what the patient directory knows into the form.
    pub fn fill_from(&mut self, patient: &PatientRecord) {
        self.paciente_nombre = patient.nombre_completo.clone();
        self.paciente_nacimiento = patient.fecha_nacimiento;
        if let Some(curp) = patient.curp.as_deref().filter(|c| !c.is_empty()) {
            self.paciente_curp = curp.to_string();
        }
    }
}

/// Patient as returned by `/api/get_paciente_info/{curp}/` and
/// `/api/get_paciente_by_name/{nombre}/`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PatientRecord {
    pub id: ReferenceId,
    pub nombre_completo: String,
    #[serde(default)]
    pub curp: Option<String>,
    pub fecha_nacimiento: NaiveDate,
}

/// CURPs are only looked up once complete.
pub const CURP_LEN: usize = 18;

pub fn normalize_curp(curp: &str) -> String {
    curp.trim().to_uppercase()
}

/// Form-encoded body: header fields, then one `item_lote_{i}` /
/// `item_cantidad_{i}` pair per line item.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct FormFields(pub Vec<(String, String)>);

impl FormFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DispenseReceipt {
    pub pdf_url: String,
    pub message: Option<String>,
}

impl Workflow for Dispense {
    const NAME: &'static str = "salida";
    const DEDUP_BY_LOT: bool = true;
    const PRICED: bool = false;

    type Lookup = LotRecord;
    type Input = ();
    type Detail = DispenseDetail;
    type Header = DispenseHeader;
    type Payload = FormFields;
    type Receipt = DispenseReceipt;

    fn candidate(
        lookup: &LotRecord,
        quantity: i64,
        _input: (),
    ) -> Result<Candidate<DispenseDetail>, RejectReason> {
        Ok(Candidate {
            reference_id: lookup.id.clone(),
            display_label: lookup.medicamento_nombre.clone(),
            lot_code: Some(lookup.lote_numero.clone()),
            quantity,
            max_quantity: Some(lookup.cantidad_actual),
            unit_price: None,
            detail: DispenseDetail {
                clave: lookup.clave.clone(),
                caducidad: lookup.caducidad.clone(),
            },
        })
    }

    fn lookup_lot_code(lookup: &LotRecord) -> Option<&str> {
        Some(&lookup.lote_numero)
    }

    fn validate_header(header: &DispenseHeader) -> Result<(), RejectReason> {
        require("paciente_nombre", &header.paciente_nombre)
    }

    fn payload(
        header: &DispenseHeader,
        items: &[LineItem<DispenseDetail>],
        _idempotency_key: Option<&str>,
    ) -> FormFields {
        let mut fields = vec![
            ("paciente_curp".to_string(), normalize_curp(&header.paciente_curp)),
            ("paciente_nombre".to_string(), header.paciente_nombre.trim().to_string()),
            (
                "paciente_nacimiento".to_string(),
                header.paciente_nacimiento.format("%Y-%m-%d").to_string(),
            ),
            ("receta_origen".to_string(), header.receta_origen.clone()),
            ("receta_folio".to_string(), header.receta_folio.clone()),
        ];

        for (index, item) in items.iter().enumerate() {
            fields.push((format!("item_lote_{}", index), item.reference_id.to_string()));
            fields.push((format!("item_cantidad_{}", index), item.quantity.to_string()));
        }

        FormFields(fields)
    }
}
