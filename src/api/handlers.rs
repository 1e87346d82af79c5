//! API request handlers

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use super::auth;
use super::server::AppState;
use crate::error::{SheetError, SheetResult};
use crate::excel::{format_number, SheetReader, SheetWriter};
use crate::storage::sanitize_filename;
use crate::types::{FileKind, Row, SheetView, UploadRecord};

const INDEX_HTML: &str = include_str!("static/index.html");

/// Multipart field names accepted for the uploaded file
const FILE_FIELDS: [&str; 2] = ["file", "excel_file"];

//==============================================================================
// Error responses
//==============================================================================

impl SheetError {
    pub fn status(&self) -> StatusCode {
        match self {
            SheetError::Validation(_) => StatusCode::BAD_REQUEST,
            SheetError::Unauthorized => StatusCode::UNAUTHORIZED,
            SheetError::NotFound(_) => StatusCode::NOT_FOUND,
            SheetError::Parse(_) | SheetError::Unsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SheetError::Persistence(_) | SheetError::Io(_) | SheetError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to send to the client
    pub fn public_message(&self) -> String {
        match self {
            SheetError::Persistence(_) => {
                "File saved, but logging to the database failed".to_string()
            }
            SheetError::Io(_) | SheetError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SheetError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Run spreadsheet I/O off the async workers
async fn run_blocking<T, F>(work: F) -> SheetResult<T>
where
    F: FnOnce() -> SheetResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SheetError::Internal(format!("worker task failed: {}", e)))?
}

/// Registered upload whose backing file still exists
fn registered(state: &AppState, filename: &str) -> SheetResult<UploadRecord> {
    if filename.trim().is_empty() {
        return Err(SheetError::validation("filename is required"));
    }
    match state.registry.get(filename) {
        Some(record) if record.path.is_file() => Ok(record),
        _ => Err(SheetError::not_found("File not found")),
    }
}

//==============================================================================
// Pages and service info
//==============================================================================

/// GET / - Editor page
pub async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !auth::is_authorized(&state, &jar) {
        return Redirect::to("/login").into_response();
    }
    Html(INDEX_HTML).into_response()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut features: Vec<String> = ["upload", "edit", "save", "download", "dropdowns"]
        .iter()
        .map(|f| f.to_string())
        .collect();
    if state.mirror.is_some() {
        features.push("mirror".to_string());
    }
    if state.login_enabled() {
        features.push("login".to_string());
    }
    Json(VersionResponse {
        version: state.version.clone(),
        features,
    })
}

//==============================================================================
// Upload
//==============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub sheets: Vec<String>,
}

/// POST /upload - Store a spreadsheet and register it
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> SheetResult<Json<UploadResponse>> {
    let mut file: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SheetError::validation(format!("Malformed upload: {}", e)))?
    {
        if !field.name().is_some_and(|name| FILE_FIELDS.contains(&name)) {
            continue;
        }
        let client_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| SheetError::validation(format!("Malformed upload: {}", e)))?;
        file = Some((client_name, bytes));
        break;
    }

    let (client_name, bytes) = file.ok_or_else(|| SheetError::validation("No file part"))?;
    let filename = sanitize_filename(&client_name)?;
    let kind = FileKind::from_filename(&filename)?;

    let uploads = state.uploads.clone();
    let record = run_blocking(move || {
        let (path, ()) = uploads.store_checked(&filename, &bytes, |staged| {
            SheetReader::new(staged, kind).sheet_names().map(drop)
        })?;
        // CSV sheet names come from the stored file's stem
        let sheets = SheetReader::new(&path, kind).sheet_names()?;
        Ok(UploadRecord::new(filename, path, kind, sheets))
    })
    .await?;

    info!(filename = %record.filename, kind = ?record.kind, sheets = record.sheets.len(), "file uploaded");
    let response = UploadResponse {
        message: "File uploaded successfully".to_string(),
        filename: record.filename.clone(),
        sheets: record.sheets.clone(),
    };
    state.registry.put(record);
    Ok(Json(response))
}

//==============================================================================
// Edit
//==============================================================================

#[derive(Debug, Deserialize)]
pub struct EditQuery {
    #[serde(default)]
    pub filename: String,
    pub sheet: Option<String>,
}

/// GET /edit - Sheet rows plus dropdown options
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EditQuery>,
) -> SheetResult<Json<SheetView>> {
    let record = registered(&state, &query.filename)?;
    let sheet = record.resolve_sheet(query.sheet.as_deref())?;

    let view = run_blocking(move || SheetReader::new(&record.path, record.kind).read_view(&sheet))
        .await?;
    Ok(Json(view))
}

//==============================================================================
// Save
//==============================================================================

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub filename: String,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(deserialize_with = "rows_as_text")]
    pub data: Vec<Row>,
}

/// Cells arrive as any JSON scalar and are stored as text; `null` is an empty cell
fn rows_as_text<'de, D>(deserializer: D) -> Result<Vec<Row>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<IndexMap<String, Value>>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(column, value)| match cell_from_json(value) {
                    Some(text) => Ok((column, text)),
                    None => Err(serde::de::Error::custom(format!(
                        "cell '{}' must be a string, number, boolean or null",
                        column
                    ))),
                })
                .collect::<Result<Row, D::Error>>()
        })
        .collect()
}

fn cell_from_json(value: Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s),
        Value::Bool(true) => Some("TRUE".to_string()),
        Value::Bool(false) => Some("FALSE".to_string()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        }),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub rows_written: usize,
}

/// POST /save - Rewrite the sheet's data rows in place
pub async fn save(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> SheetResult<Json<SaveResponse>> {
    let Json(request) =
        payload.map_err(|e| SheetError::validation(format!("Invalid request body: {}", e.body_text())))?;

    let record = registered(&state, &request.filename)?;
    let sheet = record.resolve_sheet(request.sheet.as_deref())?;

    let table = {
        let path = record.path.clone();
        let sheet = sheet.clone();
        run_blocking(move || SheetWriter::new(&path, record.kind).write_rows(&sheet, &request.data))
            .await?
    };
    state.registry.touch(&record.filename);
    info!(filename = %record.filename, sheet = %sheet, rows = table.row_count(), "sheet saved");

    if let Some(mirror) = &state.mirror {
        mirror.record(&record.filename, &sheet, &table).await?;
    }

    Ok(Json(SaveResponse {
        message: "File saved successfully".to_string(),
        rows_written: table.row_count(),
    }))
}

//==============================================================================
// Download
//==============================================================================

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub filename: String,
    pub custom_name: Option<String>,
}

/// GET /download - Stored bytes as an attachment
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> SheetResult<Response> {
    let record = registered(&state, &query.filename)?;
    let bytes = match tokio::fs::read(&record.path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SheetError::not_found("File not found"))
        }
        Err(e) => return Err(e.into()),
    };

    let name = download_name(&record, query.custom_name.as_deref())?;
    info!(filename = %record.filename, download_as = %name, bytes = bytes.len(), "file downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, record.kind.content_type().to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&name)),
        ],
        bytes,
    )
        .into_response())
}

/// Attachment name: the custom name when given, with the stored extension
/// appended if it has none
pub fn download_name(record: &UploadRecord, custom_name: Option<&str>) -> SheetResult<String> {
    match custom_name.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(record.filename.clone()),
        Some(custom) => {
            let name = sanitize_filename(custom)?;
            if FsPath::new(&name).extension().is_some() {
                Ok(name)
            } else {
                Ok(format!("{}.{}", name, record.kind.extension()))
            }
        }
    }
}

/// `attachment; filename="…"`, adding an RFC 5987 form for non-ASCII names
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    if fallback == name {
        format!("attachment; filename=\"{}\"", name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(name)
        )
    }
}

//==============================================================================
// Registered files
//==============================================================================

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<UploadRecord>,
}

/// GET /files
pub async fn list_files(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(FilesResponse {
        files: state.registry.list(),
    })
}

/// DELETE /files/:filename - Forget an upload and remove its file
pub async fn evict_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> SheetResult<impl IntoResponse> {
    let record = state
        .registry
        .evict(&filename)
        .ok_or_else(|| SheetError::not_found("File not found"))?;
    state.uploads.remove(&record.path)?;
    info!(filename = %record.filename, "file evicted");
    Ok(Json(json!({ "message": "File removed", "filename": record.filename })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(name: &str, kind: FileKind) -> UploadRecord {
        UploadRecord::new(
            name.to_string(),
            PathBuf::from(format!("/tmp/{}", name)),
            kind,
            vec!["Sheet1".to_string()],
        )
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(SheetError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(SheetError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(SheetError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SheetError::Parse("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            SheetError::Unsupported("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            SheetError::Persistence("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_internals() {
        let io = SheetError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/srv/uploads/a.csv",
        ));
        assert_eq!(io.public_message(), "Internal server error");

        let db = SheetError::Persistence("connection refused at 10.0.0.5".into());
        assert!(!db.public_message().contains("10.0.0.5"));
        assert!(db.public_message().contains("File saved"));

        assert_eq!(SheetError::not_found("File not found").public_message(), "File not found");
    }

    #[test]
    fn test_download_name() {
        let xlsx = record("book.xlsx", FileKind::Xlsx);
        assert_eq!(download_name(&xlsx, None).unwrap(), "book.xlsx");
        assert_eq!(download_name(&xlsx, Some("  ")).unwrap(), "book.xlsx");
        assert_eq!(download_name(&xlsx, Some("report")).unwrap(), "report.xlsx");
        assert_eq!(download_name(&xlsx, Some("report.xlsx")).unwrap(), "report.xlsx");
        assert_eq!(download_name(&xlsx, Some("../x/final")).unwrap(), "final.xlsx");

        let csv = record("data.csv", FileKind::Csv);
        assert_eq!(download_name(&csv, Some("export")).unwrap(), "export.csv");
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("report.xlsx"),
            "attachment; filename=\"report.xlsx\""
        );
        assert_eq!(
            content_disposition("résumé.csv"),
            "attachment; filename=\"r_sum_.csv\"; filename*=UTF-8''r%C3%A9sum%C3%A9.csv"
        );
    }

    #[test]
    fn test_save_request_accepts_scalar_cells() {
        let request: SaveRequest = serde_json::from_value(json!({
            "filename": "book.xlsx",
            "data": [
                { "Name": "Bolt", "Qty": 7, "Price": 2.5, "Whole": 3.0, "Stocked": true, "Note": null }
            ]
        }))
        .unwrap();

        let row = &request.data[0];
        assert_eq!(row["Name"], "Bolt");
        assert_eq!(row["Qty"], "7");
        assert_eq!(row["Price"], "2.5");
        assert_eq!(row["Whole"], "3");
        assert_eq!(row["Stocked"], "TRUE");
        assert_eq!(row["Note"], "");
        assert_eq!(
            row.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Name", "Qty", "Price", "Whole", "Stocked", "Note"]
        );
    }

    #[test]
    fn test_save_request_rejects_nested_cells() {
        let err = serde_json::from_value::<SaveRequest>(json!({
            "filename": "book.xlsx",
            "data": [{ "Tags": ["a", "b"] }]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Tags"));
    }
}
