//! CPM edits and lot row edits.

mod common;

use chrono::NaiveDate;
use farmacia_domain::{
    inputs::MedicationHit,
    inventory::{parse_cpm, CpmUpdate, LotEdit, StockAlert},
    ports::{InventoryMaintenance, MedicationSearch},
    Error,
};

async fn paracetamol(backend: &farmacia_client::HttpBackend) -> MedicationHit {
    backend
        .search_medications("paracetamol")
        .await
        .unwrap()
        .remove(0)
}

#[tokio::test]
async fn cpm_update_returns_the_stored_value() {
    let (backend, fake) = common::spawn().await;
    let hit = paracetamol(&backend).await;

    let update = CpmUpdate::new(hit.id, parse_cpm("120").unwrap());
    let stored = backend.update_cpm(&update).await.unwrap();

    assert_eq!(stored, 120);
    assert_eq!(StockAlert::classify(60, stored), StockAlert::Critical);
    assert_eq!(StockAlert::classify(61, stored), StockAlert::Low);

    let sent = fake.to("/editar-cpm/");
    assert_eq!(sent[0].body, serde_json::json!({"medicamento_id": "104", "cpm": 120}));
    assert_eq!(sent[0].csrf.as_deref(), Some(common::TOKEN));
}

#[tokio::test]
async fn unknown_medication_surfaces_backend_error() {
    let (backend, _) = common::spawn().await;
    let hit: MedicationHit = serde_json::from_value(serde_json::json!({
        "id": 999, "clave": "X", "descripcion": "Inexistente"
    }))
    .unwrap();

    let err = backend.update_cpm(&CpmUpdate::new(hit.id, 5)).await.unwrap_err();

    assert!(matches!(err, Error::Server { status: 404, .. }));
    assert_eq!(err.operator_message(), "Medicamento no encontrado");
}

#[tokio::test]
async fn lot_edit_posts_only_set_fields() {
    let (backend, fake) = common::spawn().await;
    let hit = paracetamol(&backend).await;

    let mut edit = LotEdit::new();
    edit.existencia = Some(40);
    edit.fecha_caducidad = NaiveDate::from_ymd_opt(2027, 3, 31);

    let mensaje = backend.edit_lot(&hit.id, &edit).await.unwrap();

    assert_eq!(mensaje, "Lote actualizado correctamente");
    let sent = fake.to("/editar_lote/104/");
    assert_eq!(
        sent[0].body,
        serde_json::json!([["existencia", "40"], ["fecha_caducidad", "2027-03-31"]])
    );
}

#[tokio::test]
async fn lot_edit_error_without_message_uses_status() {
    let (backend, _) = common::spawn().await;
    let lot: farmacia_domain::inputs::LotRecord = serde_json::from_value(serde_json::json!({
        "id": 404, "medicamento_nombre": "X", "lote_numero": "L",
        "caducidad": "30/06/2027", "cantidad_actual": 1,
    }))
    .unwrap();

    let err = backend.edit_lot(&lot.id, &LotEdit::new()).await.unwrap_err();
    assert_eq!(err.operator_message(), "Server error: 404");
}
