use async_trait::async_trait;
use farmacia_domain::{
    ports::{BulkUploadGateway, CommitGateway, ReportGateway},
    report::{ReportFormat, ReportRequest},
    workflows::{BulkUpload, BulkUploadResponse, BulkUploadResults, UploadFile},
    Error,
};
use reqwest::{
    multipart::{Form, Part},
    StatusCode,
};

use crate::backend::{decode, send, server_error, transport, HttpBackend};

/// Multipart field the backend reads the spreadsheet from.
pub const UPLOAD_FIELD: &str = "archivo";

#[async_trait]
impl BulkUploadGateway for HttpBackend {
    async fn upload(&self, file: &UploadFile) -> Result<BulkUploadResults, Error> {
        self.send_sheet(file, None).await
    }
}

/// Commit of a staged bulk cart: the sheet goes out under the cart's key.
#[async_trait]
impl CommitGateway<BulkUpload> for HttpBackend {
    async fn commit(&self, file: &UploadFile, idempotency_key: &str) -> Result<BulkUploadResults, Error> {
        self.send_sheet(file, Some(idempotency_key)).await
    }
}

impl HttpBackend {
    async fn send_sheet(
        &self,
        file: &UploadFile,
        idempotency_key: Option<&str>,
    ) -> Result<BulkUploadResults, Error> {
        let url = self.endpoint(&["api", "carga-masiva", "procesar"])?;
        tracing::info!(
            "Uploading {} ({} bytes)",
            file.file_name(),
            file.bytes().len()
        );

        let part = Part::bytes(file.bytes().to_vec()).file_name(file.file_name().to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = send(self.post(url, idempotency_key).multipart(form)).await?;

        // 207 means some rows failed; the body is still a full result.
        match response.status() {
            StatusCode::OK | StatusCode::MULTI_STATUS => {
                let body: BulkUploadResponse = decode(response).await?;
                let results = body.resultados.ok_or_else(|| Error::Malformed {
                    message: body
                        .error
                        .unwrap_or("upload response has no resultados".to_string()),
                })?;

                tracing::info!(
                    "Upload processed: {} rows, {} created, {} updated, {} errors",
                    results.total,
                    results.exitosos,
                    results.actualizados,
                    results.errores.len()
                );
                Ok(results)
            }
            _ => Err(server_error(response, |_| "Unknown error".to_string()).await),
        }
    }
}

#[async_trait]
impl ReportGateway for HttpBackend {
    async fn generate_report(&self, format: ReportFormat, report: &ReportRequest) -> Result<Vec<u8>, Error> {
        let url = self.endpoint(&["api", format.endpoint()])?;
        tracing::info!("Generating {} report for {}", format.extension(), report.folio);

        let response = send(self.post(url, None).json(report)).await?;
        let status = response.status();

        // The backend streams a file or a bare error page, never JSON.
        if !status.is_success() {
            tracing::error!("Report generation failed with status {}", status.as_u16());
            return Err(Error::Server {
                status: status.as_u16(),
                message: format!("Failed to generate {}", format.extension().to_uppercase()),
            });
        }

        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}
