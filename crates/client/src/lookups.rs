use async_trait::async_trait;
use farmacia_domain::{
    inputs::{LotRecord, MedicationHit},
    ports::{LotLookup, MedicationSearch, PatientDirectory},
    workflows::{dispense::normalize_curp, PatientRecord},
    Error,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::backend::{decode, error_message, send, server_error, HttpBackend};

#[async_trait]
impl MedicationSearch for HttpBackend {
    async fn search_medications(&self, query: &str) -> Result<Vec<MedicationHit>, Error> {
        let url = self.endpoint(&["api", "medicamentos", "buscar"])?;
        tracing::debug!("Searching medications for {:?}", query);

        let response = send(self.get(url).query(&[("q", query)])).await?;
        if !response.status().is_success() {
            return Err(server_error(response, |s| format!("Search failed: {}", s)).await);
        }
        decode(response).await
    }
}

#[async_trait]
impl LotLookup for HttpBackend {
    async fn lookup_lot(&self, code: &str) -> Result<LotRecord, Error> {
        let url = self.endpoint(&["api", "buscar_lote", code])?;
        tracing::info!("Looking up lot {}", code);

        found(send(self.get(url)).await?, "Lot not found").await
    }
}

#[async_trait]
impl PatientDirectory for HttpBackend {
    async fn patient_by_curp(&self, curp: &str) -> Result<PatientRecord, Error> {
        let curp = normalize_curp(curp);
        let url = self.endpoint(&["api", "get_paciente_info", &curp])?;

        found(send(self.get(url)).await?, "Patient not found").await
    }

    async fn patient_by_name(&self, name: &str) -> Result<PatientRecord, Error> {
        let url = self.endpoint(&["api", "get_paciente_by_name", name.trim()])?;

        found(send(self.get(url)).await?, "Patient not found").await
    }
}

/// Decode a single record; 404 becomes `LookupNotFound` with the backend's
/// own message.
async fn found<T: DeserializeOwned>(response: Response, not_found: &str) -> Result<T, Error> {
    match response.status() {
        StatusCode::NOT_FOUND => {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| not_found.to_string());
            Err(Error::LookupNotFound { message })
        }
        status if status.is_success() => decode(response).await,
        _ => Err(server_error(response, |s| format!("Lookup failed: {}", s)).await),
    }
}
