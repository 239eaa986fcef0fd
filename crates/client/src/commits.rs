use async_trait::async_trait;
use farmacia_domain::{
    inputs::{DispenseCommitResponse, EntryCommitResponse},
    ports::CommitGateway,
    workflows::{Dispense, DispenseReceipt, Entry, EntryPayload, EntryReceipt, FormFields},
    Error,
};

use crate::backend::{decode, send, server_error, HttpBackend};

#[async_trait]
impl CommitGateway<Entry> for HttpBackend {
    async fn commit(&self, payload: &EntryPayload, idempotency_key: &str) -> Result<EntryReceipt, Error> {
        let url = self.endpoint(&["api", "entradas", "guardar"])?;
        tracing::info!(
            "Saving entry {} with {} items",
            payload.folio,
            payload.detalles.len()
        );

        let response = send(self.post(url, Some(idempotency_key)).json(payload)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(server_error(response, |s| format!("Server error: {}", s.as_u16())).await);
        }

        let body: EntryCommitResponse = decode(response).await?;
        if !body.success {
            let message = body
                .error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or("Unknown error while saving".to_string());
            tracing::warn!("Entry {} refused: {}", payload.folio, message);
            return Err(Error::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(EntryReceipt {
            folio: body.folio.unwrap_or_else(|| payload.folio.clone()),
            redirect_url: body.redirect_url,
        })
    }
}

#[async_trait]
impl CommitGateway<Dispense> for HttpBackend {
    async fn commit(&self, payload: &FormFields, idempotency_key: &str) -> Result<DispenseReceipt, Error> {
        let url = self.endpoint(&["salidas"])?;
        tracing::info!(
            "Registering dispense for {}",
            payload.get("paciente_nombre").unwrap_or_default()
        );

        let response = send(self.post(url, Some(idempotency_key)).form(&payload.0)).await?;
        if !response.status().is_success() {
            return Err(server_error(response, |_| "Unknown server error".to_string()).await);
        }

        let body: DispenseCommitResponse = decode(response).await?;
        match body.pdf_url {
            Some(pdf_url) if !pdf_url.is_empty() => Ok(DispenseReceipt {
                pdf_url,
                message: body.message,
            }),
            _ => Err(Error::Malformed {
                message: body
                    .error
                    .unwrap_or("dispense response has no pdf_url".to_string()),
            }),
        }
    }
}
