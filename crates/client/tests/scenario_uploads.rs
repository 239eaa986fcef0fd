//! Bulk spreadsheet upload and entry report downloads.

mod common;

use chrono::{Days, NaiveDate, Utc};
use farmacia_domain::{
    inputs::MedicationHit,
    ports::{BulkUploadGateway, ReportGateway},
    report::{ReportFormat, ReportRequest},
    workflows::{
        bulk_upload::{read_rows, TEMPLATE_COLUMNS},
        BulkUpload, Entry, EntryHeader, EntryInput, UploadFile,
    },
    CartSession, CartStatus, Error, StagingCart,
};

#[tokio::test]
async fn partial_upload_returns_results_and_warnings() {
    let (backend, fake) = common::spawn().await;
    let file = UploadFile::new("inventario.xlsx", vec![0x50, 0x4b, 0x03, 0x04]).unwrap();

    let results = backend.upload(&file).await.unwrap();

    assert_eq!(results.total, 3);
    assert_eq!(results.exitosos, 1);
    assert!(results.has_errors());

    let rows = results.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].kind, "warning");
    assert_eq!(
        rows[0].message,
        "Row 2 - Key: 010.000.0104.00, Lot: P1 - Caduca en 20 días"
    );
    assert_eq!(rows[1].message, "La clave no puede estar vacía");

    let sent = fake.to("/api/carga-masiva/procesar/");
    assert_eq!(sent[0].body[0]["field"], "archivo");
    assert_eq!(sent[0].body[0]["file_name"], "inventario.xlsx");
    assert_eq!(sent[0].body[0]["size"], 4);
    assert_eq!(sent[0].csrf.as_deref(), Some(common::TOKEN));
}

#[tokio::test]
async fn rejected_upload_reports_backend_error() {
    let (backend, _) = common::spawn().await;
    let file = UploadFile::new("vacio.xls", Vec::new()).unwrap();

    let err = backend.upload(&file).await.unwrap_err();
    assert!(matches!(err, Error::Server { status: 400, .. }));
    assert_eq!(err.operator_message(), "El archivo está vacío");
}

#[tokio::test]
async fn staged_bulk_cart_commits_the_sheet_under_its_key() {
    let (backend, fake) = common::spawn().await;
    let preview = format!(
        "{}\n{}\n{}\n",
        TEMPLATE_COLUMNS.join(","),
        "010.000.0104.00,Paracetamol 500mg,P1,10,1.25,30/08/2027,,,",
        "010.000.2154.00,Enoxaparina 40mg,P1,2,682.57,30/06/2027,,,"
    );

    let mut session = CartSession::new(StagingCart::<BulkUpload>::new());
    let refused = session
        .cart_mut()
        .stage_rows(read_rows(preview.as_bytes()).unwrap())
        .await
        .unwrap();
    assert!(refused.is_empty());
    assert_eq!(session.cart().len(), 2);

    let file = UploadFile::new("inventario.xlsx", vec![0x50, 0x4b]).unwrap();
    let results = session.commit(&backend, &file).await.unwrap();

    assert_eq!(results.total, 3);
    assert_eq!(session.cart().status(), CartStatus::Empty);
    let sent = fake.to("/api/carga-masiva/procesar/");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].idempotency_key.is_some());
    assert_eq!(sent[0].body[0]["size"], 2);
}

#[tokio::test]
async fn unstaged_bulk_cart_is_not_sent() {
    let (backend, fake) = common::spawn().await;
    let mut session = CartSession::new(StagingCart::<BulkUpload>::new());
    let file = UploadFile::new("inventario.xlsx", vec![0x50]).unwrap();

    let err = session.commit(&backend, &file).await.unwrap_err();

    assert_eq!(err.operator_message(), "There are no items to save");
    assert!(fake.to("/api/carga-masiva/procesar/").is_empty());
}

async fn report() -> ReportRequest {
    let hit: MedicationHit = serde_json::from_value(serde_json::json!({
        "id": 104, "clave": "010.000.0104.00", "descripcion": "Paracetamol 500mg"
    }))
    .unwrap();

    let mut cart = StagingCart::<Entry>::new();
    cart.set_lookup(hit).unwrap();
    cart.add(
        10,
        EntryInput {
            presentacion_id: "4".to_string(),
            presentacion: "TABLETA".to_string(),
            lote: "P1".to_string(),
            caducidad: Utc::now().date_naive() + Days::new(30),
            precio_unitario: Some("1.25".parse().unwrap()),
        },
    )
    .await
    .unwrap();

    let header = EntryHeader {
        folio: "ENT-20261016-0007".to_string(),
        fecha: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        tipo_entrada: "COMPRA".to_string(),
        almacen: Some("1".to_string()),
        ..Default::default()
    };
    ReportRequest::for_entry(&cart, &header).unwrap()
}

#[tokio::test]
async fn pdf_report_streams_bytes() {
    let (backend, fake) = common::spawn().await;
    let report = report().await;

    let bytes = backend.generate_report(ReportFormat::Pdf, &report).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(ReportFormat::Pdf.file_name(&report.folio), "ENTRADA_ENT-20261016-0007.pdf");

    let sent = fake.to("/api/generar-reporte-pdf/");
    assert_eq!(sent[0].body["total"], 12.5);
    assert_eq!(sent[0].body["items"][0]["lote"], "P1");
}

#[tokio::test]
async fn failed_excel_report_uses_generic_message() {
    let (backend, _) = common::spawn().await;

    let err = backend
        .generate_report(ReportFormat::Xlsx, &report().await)
        .await
        .unwrap_err();
    assert_eq!(err.operator_message(), "Failed to generate XLSX");
}
