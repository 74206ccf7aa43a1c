use axum::{
    Router,
    routing::{get, post},
    response::IntoResponse,
    http::StatusCode,
    extract::{Path, Query, State, Multipart},
    Json,
};
use crate::models::{CreateRunResponse, ParseQuery, RunMeta};
use crate::storage::{store_run, RunStorage};
use runlog_parser::{Grammar, GrammarChoice, ProfileRegistry, PropertyMap};
use std::sync::Arc;
use tracing::{info, debug, warn, error, instrument};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<RunStorage>,
    pub registry: Arc<ProfileRegistry>,
    pub default_profile: Arc<str>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/profiles", get(list_profiles))
        .route("/parse", post(parse_log))
        .route("/runs", post(create_run))
        .route("/runs/:id", get(get_run).delete(delete_run))
        .route("/runs/:id/properties", get(get_properties))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn list_profiles(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.names().into_iter().map(String::from).collect())
}

/// Parse `text` with the named profile, honoring a grammar override.
/// Returns the properties and the grammar actually used.
fn run_parser(
    registry: &ProfileRegistry,
    profile: &str,
    choice: GrammarChoice,
    text: &str,
) -> Result<(PropertyMap, Option<Grammar>), (StatusCode, String)> {
    registry.parse_with(profile, text, choice).map_err(|e| {
        error!("Failed to parse with profile '{}': {}", profile, e);
        (StatusCode::BAD_REQUEST, e.to_string())
    })
}

fn grammar_choice(param: Option<&str>) -> Result<GrammarChoice, (StatusCode, String)> {
    GrammarChoice::from_param(param).map_err(|e| {
        error!("Bad grammar parameter: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string())
    })
}

#[instrument(skip(state, body))]
async fn parse_log(
    State(state): State<AppState>,
    Query(query): Query<ParseQuery>,
    body: String,
) -> Result<Json<PropertyMap>, (StatusCode, String)> {
    let profile = query.profile.as_deref().unwrap_or(&*state.default_profile);
    let choice = grammar_choice(query.grammar.as_deref())?;
    info!("Parsing {} bytes with profile '{}'", body.len(), profile);

    let (props, _) = run_parser(&state.registry, profile, choice, &body)?;

    info!("Extracted {} properties", props.len());
    Ok(Json(props))
}

#[instrument(skip(state, multipart))]
async fn create_run(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreateRunResponse>, (StatusCode, String)> {
    info!("Received run log upload request");

    let mut log_data: Option<Vec<u8>> = None;
    let mut profile: Option<String> = None;
    let mut grammar: Option<String> = None;

    while let Some(field) = multipart.next_field().await
        .map_err(|e| {
            error!("Multipart error: {}", e);
            (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
        })?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("unknown").to_string();
                info!("Receiving log file: {}", filename);

                let data = field.bytes().await
                    .map_err(|e| {
                        error!("Failed to read file data: {}", e);
                        (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                    })?;
                info!("File data received: {} bytes", data.len());
                log_data = Some(data.to_vec());
            }
            Some(name @ ("profile" | "grammar")) => {
                let is_profile = name == "profile";
                let value = field.text().await
                    .map_err(|e| {
                        error!("Failed to read form field: {}", e);
                        (StatusCode::BAD_REQUEST, format!("Failed to read form field: {}", e))
                    })?;
                if is_profile {
                    profile = Some(value);
                } else {
                    grammar = Some(value);
                }
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let Some(log_data) = log_data else {
        error!("No file data provided in request");
        return Err((StatusCode::BAD_REQUEST, "No file provided".to_string()));
    };

    let profile = profile
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| state.default_profile.to_string());
    let choice = grammar_choice(grammar.as_deref())?;

    let text = String::from_utf8_lossy(&log_data);
    let (props, used_grammar) = run_parser(&state.registry, &profile, choice, &text)?;
    info!("Extracted {} properties with profile '{}'", props.len(), profile);

    let run_id = state.storage.create_run()
        .map_err(|e| {
            error!("Failed to create run: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to create run: {}", e))
        })?;

    save_run(&state.storage, &run_id, &profile, used_grammar, log_data.len(), &props)?;

    info!("Stored run: {}", run_id);
    Ok(Json(CreateRunResponse {
        run_id,
        profile,
        property_count: props.len(),
    }))
}

/// Stores a freshly created run, removing its directory again if the write
/// fails so no run is left without a `run.json`.
fn save_run(
    storage: &RunStorage,
    run_id: &str,
    profile: &str,
    grammar: Option<Grammar>,
    log_bytes: usize,
    props: &PropertyMap,
) -> Result<RunMeta, (StatusCode, String)> {
    store_run(storage, run_id, profile, grammar, log_bytes, props).map_err(|e| {
        error!("Failed to store run {}: {}", run_id, e);
        if let Err(cleanup) = storage.delete_run(run_id) {
            warn!("Failed to remove incomplete run {}: {}", run_id, cleanup);
        }
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to store run: {}", e))
    })
}

async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunMeta>, (StatusCode, String)> {
    let meta = state.storage.read_meta(&run_id)
        .map_err(|e| (StatusCode::NOT_FOUND, format!("Run not found: {}", e)))?;

    Ok(Json(meta))
}

async fn get_properties(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let props = state.storage.read_properties(&run_id)
        .map_err(|e| (StatusCode::NOT_FOUND, format!("Run not found: {}", e)))?;

    Ok(Json(props))
}

async fn delete_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let existed = state.storage.delete_run(&run_id)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => (StatusCode::NOT_FOUND, format!("Run not found: {}", e)),
            _ => {
                error!("Failed to delete run {}: {}", run_id, e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to delete: {}", e))
            }
        })?;

    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        warn!("Delete requested for unknown run: {}", run_id);
        Err((StatusCode::NOT_FOUND, format!("Run not found: {}", run_id)))
    }
}
