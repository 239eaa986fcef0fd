//! In-process fake of the pharmacy backend, bound to an ephemeral port.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use farmacia_client::{ClientConfig, HttpBackend, CSRF_HEADER, IDEMPOTENCY_HEADER};
use serde_json::{json, Value};

pub const TOKEN: &str = "csrf-test-token";

#[derive(Clone, Debug)]
pub struct Recorded {
    pub path: String,
    pub csrf: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeBackend {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn to(&self, path: &str) -> Vec<Recorded> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    fn record(&self, path: &str, headers: &HeaderMap, body: Value) -> usize {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let mut requests = self.requests.lock().unwrap();
        requests.push(Recorded {
            path: path.to_string(),
            csrf: header(CSRF_HEADER),
            idempotency_key: header(IDEMPOTENCY_HEADER),
            body,
        });
        requests.iter().filter(|r| r.path == path).count()
    }
}

pub async fn spawn() -> (HttpBackend, FakeBackend) {
    spawn_with(|config| config).await
}

pub async fn spawn_with(configure: impl FnOnce(ClientConfig) -> ClientConfig) -> (HttpBackend, FakeBackend) {
    let fake = FakeBackend::default();

    let app = Router::new()
        .route("/api/medicamentos/buscar/", get(search))
        .route("/api/buscar_lote/:code/", get(lot))
        .route("/api/get_paciente_info/:curp/", get(patient_by_curp))
        .route("/api/get_paciente_by_name/:nombre/", get(patient_by_name))
        .route("/api/entradas/guardar/", post(save_entry))
        .route("/salidas/", post(save_dispense))
        .route("/api/carga-masiva/procesar/", post(bulk_upload))
        .route("/editar-cpm/", post(edit_cpm))
        .route("/editar_lote/:id/", post(edit_lot))
        .route("/api/generar-reporte-pdf/", post(report_pdf))
        .route("/api/generar-reporte-excel/", post(report_excel))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = configure(ClientConfig::new(format!("http://{}", addr)).with_csrf_token(TOKEN));
    (HttpBackend::new(&config).unwrap(), fake)
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let q = params.get("q").cloned().unwrap_or_default().to_lowercase();
    let catalog = [
        (142, "010.000.0142.00", "Salmeterol fluticasona", "CAJA"),
        (104, "010.000.0104.00", "Paracetamol 500mg", "TABLETA"),
        (2154, "010.000.2154.00", "Enoxaparina 40mg", "JERINGA"),
    ];

    let hits: Vec<Value> = catalog
        .iter()
        .filter(|(_, clave, descripcion, _)| {
            q.len() >= 2 && (clave.contains(&q) || descripcion.to_lowercase().contains(&q))
        })
        .map(|(id, clave, descripcion, presentacion)| {
            json!({"id": id, "clave": clave, "descripcion": descripcion, "presentacion": presentacion})
        })
        .collect();

    Json(Value::Array(hits))
}

async fn lot(Path(code): Path<String>) -> (StatusCode, Json<Value>) {
    match code.as_str() {
        "X15675A" | "SLOW" => {
            if code == "SLOW" {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            (
                StatusCode::OK,
                Json(json!({
                    "id": 31,
                    "medicamento_nombre": "Enoxaparina 40mg",
                    "clave": "010.000.2154.00",
                    "lote_numero": code,
                    "caducidad": "30/06/2027",
                    "cantidad_actual": 12,
                })),
            )
        }
        "BROKEN" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "traceback"})),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Lote \"{}\" no encontrado", code)})),
        ),
    }
}

fn patient() -> Value {
    json!({
        "id": 5,
        "nombre_completo": "Juan Pérez",
        "curp": "GODE561231HDFRRN09",
        "fecha_nacimiento": "1956-12-31",
    })
}

async fn patient_by_curp(Path(curp): Path<String>) -> (StatusCode, Json<Value>) {
    if curp == "GODE561231HDFRRN09" {
        (StatusCode::OK, Json(patient()))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Paciente no encontrado"})),
        )
    }
}

async fn patient_by_name(Path(nombre): Path<String>) -> (StatusCode, Json<Value>) {
    if nombre == "Juan Pérez" {
        (StatusCode::OK, Json(patient()))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Paciente no encontrado"})),
        )
    }
}

async fn save_entry(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let attempt = fake.record("/api/entradas/guardar/", &headers, body.clone());

    if body["proceso"] == "" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Campo proceso es requerido"})),
        );
    }
    if body["folio"] == "DUP" {
        return (
            StatusCode::OK,
            Json(json!({"success": false, "error": "El folio DUP ya existe"})),
        );
    }
    if body["folio"] == "FLAKY" && attempt == 1 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"success": false, "error": "Base de datos ocupada"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "folio": body["folio"],
            "redirect_url": "/entrada-medicamentos/",
        })),
    )
}

async fn save_dispense(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> (StatusCode, Json<Value>) {
    let nombre = fields
        .iter()
        .find(|(k, _)| k == "paciente_nombre")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    fake.record("/salidas/", &headers, json!(fields));

    if nombre == "ERROR" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "Lote agotado"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Salida registrada exitosamente.",
            "pdf_url": "/salidas/comprobante/15/",
        })),
    )
}

async fn bulk_upload(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let size = field.bytes().await.unwrap().len();
        files.push(json!({"field": name, "file_name": file_name, "size": size}));
    }
    let empty = files.iter().any(|f| f["size"] == 0);
    fake.record("/api/carga-masiva/procesar/", &headers, Value::Array(files));

    if empty {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "El archivo está vacío"})),
        );
    }

    (
        StatusCode::MULTI_STATUS,
        Json(json!({
            "success": true,
            "mensaje": "Carga masiva completada",
            "resultados": {
                "total": 3,
                "exitosos": 1,
                "actualizados": 1,
                "errores": [{"fila": 4, "clave": "N/A", "error": "La clave no puede estar vacía"}],
                "advertencias": [
                    {"tipo": "caducidad_proxima", "fila": 2, "clave": "010.000.0104.00",
                     "lote": "P1", "mensaje": "Caduca en 20 días"}
                ],
            },
        })),
    )
}

async fn report_pdf(State(fake): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Vec<u8>) {
    fake.record("/api/generar-reporte-pdf/", &headers, body);
    (StatusCode::OK, b"%PDF-1.4 fake".to_vec())
}

async fn report_excel(State(fake): State<FakeBackend>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Vec<u8>) {
    fake.record("/api/generar-reporte-excel/", &headers, body);
    (StatusCode::INTERNAL_SERVER_ERROR, b"<h1>Server Error</h1>".to_vec())
}

async fn edit_cpm(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.record("/editar-cpm/", &headers, body.clone());

    if body["medicamento_id"] == "999" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Medicamento no encontrado"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "CPM actualizado correctamente",
            "nuevo_cpm": body["cpm"],
        })),
    )
}

async fn edit_lot(
    State(fake): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> (StatusCode, Json<Value>) {
    let path = format!("/editar_lote/{}/", id);
    let existencia = fields
        .iter()
        .find(|(k, _)| k == "existencia")
        .map(|(_, v)| v.clone());
    fake.record(&path, &headers, json!(fields));

    if existencia.is_some_and(|v| v.parse::<i64>().is_err()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Existencia inválida"})),
        );
    }
    if id == "404" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found"})));
    }

    (
        StatusCode::OK,
        Json(json!({"mensaje": "Lote actualizado correctamente"})),
    )
}
