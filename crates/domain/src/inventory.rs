//! Inventory maintenance: monthly consumption (CPM) edits, lot row edits and
//! the stock alert level derived from them.

use std::fmt;

use chrono::NaiveDate;
use derive_new::new;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{errors::RejectReason, inputs::ReferenceId};

/// Stock against monthly consumption.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StockAlert {
    /// At or below half a month of consumption
    Critical,
    /// At or below one month of consumption
    Low,
    Sufficient,
}

impl fmt::Display for StockAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StockAlert::Critical => "critical",
            StockAlert::Low => "low",
            StockAlert::Sufficient => "sufficient",
        };
        f.write_str(s)
    }
}

impl StockAlert {
    /// Level for `existencia` units on hand. Without a CPM there is nothing
    /// to compare against, so no alert is raised.
    pub fn classify(existencia: u64, cpm: u64) -> Self {
        if cpm == 0 {
            StockAlert::Sufficient
        } else if existencia.saturating_mul(2) <= cpm {
            StockAlert::Critical
        } else if existencia <= cpm {
            StockAlert::Low
        } else {
            StockAlert::Sufficient
        }
    }
}

/// Stock as a percentage of CPM, one decimal. `None` without a CPM.
pub fn coverage_percent(existencia: u64, cpm: u64) -> Option<Decimal> {
    if cpm == 0 {
        return None;
    }
    let percent = Decimal::from(existencia) * Decimal::ONE_HUNDRED / Decimal::from(cpm);
    Some(percent.round_dp(1))
}

/// Operator-typed CPM: a whole number, zero or more.
pub fn parse_cpm(raw: &str) -> Result<u64, RejectReason> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RejectReason::InvalidCpm);
    }
    raw.parse().map_err(|_| RejectReason::InvalidCpm)
}

/// Body of `POST /editar-cpm/`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct CpmUpdate {
    pub medicamento_id: ReferenceId,
    pub cpm: u64,
}

/// Reply of `POST /editar-cpm/`: either `nuevo_cpm` or `error`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct CpmUpdateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub nuevo_cpm: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Fields of `POST /editar_lote/{id}/`. Blank fields are left unchanged
/// by the backend, so only the ones set are sent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct LotEdit {
    #[new(default)]
    pub lote_codigo: Option<String>,
    #[new(default)]
    pub existencia: Option<u32>,
    #[new(default)]
    pub cpm: Option<u64>,
    #[new(default)]
    pub presentacion: Option<String>,
    #[new(default)]
    pub fecha_caducidad: Option<NaiveDate>,
}

impl LotEdit {
    pub fn is_empty(&self) -> bool {
        self.form_fields().is_empty()
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();

        if let Some(code) = self.lote_codigo.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            fields.push(("lote_codigo", code.to_string()));
        }
        if let Some(existencia) = self.existencia {
            fields.push(("existencia", existencia.to_string()));
        }
        if let Some(cpm) = self.cpm {
            fields.push(("cpm", cpm.to_string()));
        }
        if let Some(presentacion) = self.presentacion.as_deref().filter(|p| !p.is_empty()) {
            fields.push(("presentacion", presentacion.to_string()));
        }
        if let Some(fecha) = self.fecha_caducidad {
            fields.push(("fecha_caducidad", fecha.format("%Y-%m-%d").to_string()));
        }

        fields
    }
}

/// Reply of `POST /editar_lote/{id}/`: `mensaje` or `error`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct LotEditResponse {
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_levels_follow_half_and_full_cpm() {
        assert_eq!(StockAlert::classify(0, 100), StockAlert::Critical);
        assert_eq!(StockAlert::classify(50, 100), StockAlert::Critical);
        assert_eq!(StockAlert::classify(51, 100), StockAlert::Low);
        assert_eq!(StockAlert::classify(100, 100), StockAlert::Low);
        assert_eq!(StockAlert::classify(101, 100), StockAlert::Sufficient);
        assert_eq!(StockAlert::classify(3, 0), StockAlert::Sufficient);
    }

    #[test]
    fn odd_cpm_halves_without_rounding() {
        // 3 is 60% of 5
        assert_eq!(StockAlert::classify(3, 5), StockAlert::Low);
        assert_eq!(StockAlert::classify(2, 5), StockAlert::Critical);
        assert_eq!(coverage_percent(2, 5), Some(Decimal::new(400, 1)));
        assert_eq!(coverage_percent(1, 3), Some(Decimal::new(333, 1)));
        assert_eq!(coverage_percent(1, 0), None);
    }

    #[test]
    fn cpm_is_a_non_negative_whole_number() {
        assert_eq!(parse_cpm(" 120 "), Ok(120));
        assert_eq!(parse_cpm("0"), Ok(0));
        for raw in ["", "-5", "12.5", "1e3", "doce"] {
            assert_eq!(parse_cpm(raw), Err(RejectReason::InvalidCpm), "{:?}", raw);
        }
    }

    #[test]
    fn lot_edit_sends_only_what_was_set() {
        let mut edit = LotEdit::new();
        assert!(edit.is_empty());

        edit.existencia = Some(0);
        edit.lote_codigo = Some("  ".to_string());
        edit.fecha_caducidad = NaiveDate::from_ymd_opt(2027, 5, 31);

        assert_eq!(
            edit.form_fields(),
            vec![
                ("existencia", "0".to_string()),
                ("fecha_caducidad", "2027-05-31".to_string()),
            ]
        );
    }
}
