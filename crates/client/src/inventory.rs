use async_trait::async_trait;
use farmacia_domain::{
    inputs::ReferenceId,
    inventory::{CpmUpdate, CpmUpdateResponse, LotEdit, LotEditResponse},
    ports::InventoryMaintenance,
    Error,
};

use crate::backend::{decode, send, server_error, HttpBackend};

#[async_trait]
impl InventoryMaintenance for HttpBackend {
    async fn update_cpm(&self, update: &CpmUpdate) -> Result<u64, Error> {
        let url = self.endpoint(&["editar-cpm"])?;
        tracing::info!(
            "Setting CPM of medication {} to {}",
            update.medicamento_id,
            update.cpm
        );

        let response = send(self.post(url, None).json(update)).await?;
        if !response.status().is_success() {
            return Err(server_error(response, |s| format!("Server error: {}", s.as_u16())).await);
        }

        let body: CpmUpdateResponse = decode(response).await?;
        match (body.success, body.nuevo_cpm) {
            (true, Some(cpm)) => Ok(cpm),
            _ => Err(Error::Malformed {
                message: body
                    .error
                    .unwrap_or("CPM response has no nuevo_cpm".to_string()),
            }),
        }
    }

    async fn edit_lot(&self, lote_id: &ReferenceId, edit: &LotEdit) -> Result<String, Error> {
        let url = self.endpoint(&["editar_lote", lote_id.as_str()])?;
        let fields = edit.form_fields();
        tracing::info!("Editing lot {} ({} fields)", lote_id, fields.len());

        let response = send(self.post(url, None).form(&fields)).await?;
        if !response.status().is_success() {
            return Err(server_error(response, |s| format!("Server error: {}", s.as_u16())).await);
        }

        let body: LotEditResponse = decode(response).await?;
        body.mensaje.ok_or_else(|| Error::Malformed {
            message: body
                .error
                .unwrap_or("lot edit response has no mensaje".to_string()),
        })
    }
}
