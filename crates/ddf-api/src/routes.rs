//! HTTP handlers: listing, the query endpoint, asset redirects, and the
//! service directory.

use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use ddf_catalog_storage::CatalogBackend;
use ddf_query::{compile, parse_query, CompileOutput, FromSpec};
use ddf_table::TableEngine;
use serde::Serialize;
use serde_json::json;

use crate::auth::authorize;
use crate::error::{bad_request, not_found, ApiError};
use crate::state::AppState;
use crate::stream::response_body;

const RESERVED_LATEST: &str = "latest";

#[derive(Debug, Serialize)]
struct ListEntry {
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<bool>,
}

pub async fn list_datasets<B: CatalogBackend>(State(state): State<AppState<B>>) -> Response {
    match state.catalog.list(None) {
        Ok(entries) => {
            let body: Vec<ListEntry> = entries
                .into_iter()
                .map(|e| ListEntry {
                    name: e.name,
                    version: e.version,
                    default: e.is_default.then_some(true),
                })
                .collect();
            let mut response = Json(body).into_response();
            response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            response
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

pub async fn service_directory() -> Response {
    Json(json!({
        "list": "/",
        "query": "/DATASET/VERSION",
        "assets": "DATASET/VERSION/assets/ASSET",
    }))
    .into_response()
}

/// `GET /{name}` — resolve to the default/latest version and redirect,
/// preserving the query string verbatim.
pub async fn redirect_versionless<B: CatalogBackend>(
    State(state): State<AppState<B>>,
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let resolved = resolve_version(&state, &name, None)?;
    let target = match query {
        Some(q) if !q.is_empty() => format!("/{name}/{}?{q}", resolved.version),
        _ => format!("/{name}/{}", resolved.version),
    };
    Ok(Redirect::to(&target).into_response())
}

/// `GET /{name}/{version}` — execute the query.
pub async fn run_query<B: CatalogBackend>(
    State(state): State<AppState<B>>,
    Path((name, version)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let _guard = state.admission.try_admit().map_err(|_| {
        ApiError::Busy("server is busy, please retry".to_string())
    })?;

    let resolved = resolve_version(&state, &name, Some(&version))?;

    if let Err(challenge) = authorize(&headers, &name, resolved.record.password_hash.as_deref()) {
        return Ok(challenge.into_response());
    }

    let raw_query = raw_query.unwrap_or_default();
    let query_value = crate::querystring::decode(&raw_query)
        .ok_or_else(|| bad_request("malformed query string".to_string()))?;

    let query = parse_query(&query_value).map_err(ApiError::from)?;
    let compiled = compile(&query, &resolved.record.schema).map_err(ApiError::from)?;

    let mut response = match compiled {
        CompileOutput::SchemaRows(rows) => {
            let header = vec!["key".to_string(), "value".to_string()];
            let body = json!({
                "version": resolved.version,
                "header": header,
                "rows": rows.iter().map(|r| json!([r.key_id, r.value_columns])).collect::<Vec<_>>(),
            });
            Json(body).into_response()
        }
        CompileOutput::Sql { sql, header, warnings } => {
            let engine = state.engines.acquire().await.map_err(ApiError::from)?;
            register_all_tables(&engine, &resolved.record.schema, &state, &name, &resolved.version).await?;

            let result_stream = engine.execute_stream(&sql).await.map_err(ApiError::from)?;

            let key_width = query.select.key.len();
            let filter_nulls = matches!(query.from, FromSpec::Datapoints);
            // `engine` moves into the body and is released back to the
            // pool only once the client has read the whole response (or
            // dropped the connection), per the connection-pool contract.
            let body =
                response_body(engine, sql, &resolved.version, header, result_stream, key_width, filter_nulls, warnings);
            Response::builder()
                .header(header::CONTENT_TYPE, "application/json")
                .body(body)
                .map_err(|e| ApiError::Internal(e.to_string()))?
        }
    };

    apply_cache_headers(response.headers_mut(), &state, resolved.record.is_password_protected(), &name, &resolved.version);
    Ok(response)
}

/// `GET /{name}/assets/{asset}` (versionless, 302) and
/// `GET /{name}/{version}/assets/{asset}` (versioned, 301).
pub async fn asset_redirect_versionless<B: CatalogBackend>(
    State(state): State<AppState<B>>,
    Path((name, asset)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let resolved = resolve_version(&state, &name, None)?;
    Ok(Redirect::to(&format!("/{name}/{}/assets/{asset}", resolved.version)).into_response())
}

pub async fn asset_redirect_versioned<B: CatalogBackend>(
    State(state): State<AppState<B>>,
    Path((name, version, asset)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let resolved = resolve_version(&state, &name, Some(&version))?;
    let key = format!("{name}/{}/{asset}", resolved.version);
    let url = state.store.resolve_url(&key);
    Ok(Redirect::permanent(&url).into_response())
}

struct ResolvedVersion {
    version: String,
    record: ddf_catalog_storage::CatalogRecord,
}

fn resolve_version<B: CatalogBackend>(
    state: &AppState<B>,
    name: &str,
    version: Option<&str>,
) -> Result<ResolvedVersion, ApiError> {
    let lookup_version = version.filter(|v| *v != RESERVED_LATEST);
    let record = state
        .catalog
        .lookup(name, lookup_version)?
        .ok_or_else(|| not_found(format!("dataset '{name}' not found")))?;
    Ok(ResolvedVersion { version: record.version.clone(), record })
}

async fn register_all_tables<B: CatalogBackend>(
    engine: &TableEngine,
    schema: &ddf_schema::SchemaModel,
    state: &AppState<B>,
    name: &str,
    version: &str,
) -> Result<(), ApiError> {
    let version_dir = ddf_loader::materialize::version_data_dir(&state.data_root, name, version);
    for entry in schema.concepts.values().chain(schema.entities.values()).chain(schema.datapoints.values()) {
        for shard in &entry.table.shards {
            let path = version_dir.join(format!("{}.csv", shard.db_name));
            if path.exists() {
                engine
                    .register_csv_table(&shard.db_name, &path)
                    .await
                    .map_err(ApiError::from)?;
            }
        }
    }
    Ok(())
}

fn apply_cache_headers<B: CatalogBackend>(
    headers: &mut HeaderMap,
    state: &AppState<B>,
    protected: bool,
    name: &str,
    version: &str,
) {
    if protected || !state.config.cache_allow {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate"));
        return;
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    if let Ok(tag) = HeaderValue::from_str(&format!("{name}/{version}")) {
        headers.insert(axum::http::HeaderName::from_static("cache-tag"), tag);
    }
}

/// `GET /<LOADER_IO_TOKEN>.txt` — present only when configured.
pub async fn loader_io_token<B: CatalogBackend>(State(state): State<AppState<B>>) -> impl IntoResponse {
    match &state.config.loader_io_token {
        Some(token) => (StatusCode::OK, token.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

