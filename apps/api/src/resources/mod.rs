//! Generic CRUD endpoints shared by profiles, prompts and templates.
//!
//! Each resource type implements [`Resource`] to supply its collection name,
//! input struct and default table; [`routes`] mounts the same five handlers
//! for every type.

pub mod profiles;
pub mod prompts;
pub mod templates;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{generate_id, record_id, timestamp, CollectionStore, Record, StoreError};

pub use profiles::Profile;
pub use prompts::Prompt;
pub use templates::Template;

/// What DELETE does when the id is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Answer 404.
    RequireExisting,
    /// Answer the usual confirmation.
    Idempotent,
}

pub trait Resource: Send + Sync + 'static {
    /// File stem and URL segment, e.g. `profiles`.
    const COLLECTION: &'static str;
    /// Singular name used in messages, e.g. `Profile`.
    const LABEL: &'static str;
    const DELETE_POLICY: DeletePolicy;

    /// Client-supplied creation fields, all optional.
    /// An empty request body creates from `Input::default()`.
    type Input: DeserializeOwned + Default + Send + 'static;

    /// Known fields with defaults substituted, in storage order.
    fn fields(input: Self::Input) -> Record;
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Mirrors JavaScript truthiness for JSON values: `null`, `false`, `0` and
/// `""` are falsy, everything else (including `[]` and `{}`) is truthy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Substitutes `default` when `value` is missing or falsy. Present values of
/// any other shape pass through unchanged.
pub fn or_default(value: Option<Value>, default: impl Into<Value>) -> Value {
    match value {
        Some(v) if !is_falsy(&v) => v,
        _ => default.into(),
    }
}

pub fn not_found<R: Resource>() -> AppError {
    AppError::NotFound(format!("{} not found", R::LABEL))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// A missing or blank body means "all defaults". Anything else must parse
/// as the input object, whatever content type was sent.
fn creation_input<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    json_body(Json::from_bytes(body))
}

/// Assigns id and timestamps, applies defaults and stores the new record.
pub async fn create_record<R: Resource>(
    store: &dyn CollectionStore,
    input: R::Input,
) -> Result<Record, AppError> {
    let now = Utc::now();
    let mut record = Record::new();
    record.insert("id".into(), Value::String(generate_id(now)));
    record.extend(R::fields(input));
    record.insert("createdAt".into(), Value::String(timestamp(now)));
    record.insert("updatedAt".into(), Value::String(timestamp(now)));

    let created = store.insert(R::COLLECTION, record).await?;
    info!(
        "Created {} {}",
        R::LABEL,
        record_id(&created).unwrap_or_default()
    );
    Ok(created)
}

/// GET /api/{collection}
pub async fn handle_list<R: Resource>(
    State(state): State<AppState>,
) -> Result<Json<Vec<Record>>, AppError> {
    Ok(Json(state.store.load_all(R::COLLECTION).await?))
}

/// GET /api/{collection}/:id
pub async fn handle_get<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>, AppError> {
    state
        .store
        .find_by_id(R::COLLECTION, &id)
        .await?
        .map(Json)
        .ok_or_else(not_found::<R>)
}

/// POST /api/{collection}
pub async fn handle_create<R: Resource>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let input = creation_input::<R::Input>(&body)?;
    let created = create_record::<R>(state.store.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/{collection}/:id
pub async fn handle_update<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Record>, JsonRejection>,
) -> Result<Json<Record>, AppError> {
    let fields = json_body(payload)?;
    match state.store.replace_at(R::COLLECTION, &id, fields).await {
        Ok(updated) => {
            info!("Updated {} {id}", R::LABEL);
            Ok(Json(updated))
        }
        Err(StoreError::NotFound(_)) => Err(not_found::<R>()),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /api/{collection}/:id
pub async fn handle_delete<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let removed = state.store.remove(R::COLLECTION, &id).await?;
    if !removed && R::DELETE_POLICY == DeletePolicy::RequireExisting {
        return Err(not_found::<R>());
    }
    if removed {
        info!("Deleted {} {id}", R::LABEL);
    }

    Ok(Json(DeleteResponse {
        message: format!("{} deleted successfully", R::LABEL),
    }))
}

/// LIST/GET/CREATE/UPDATE/DELETE for one resource type, relative to `/api`.
pub fn routes<R: Resource>() -> Router<AppState> {
    let collection = format!("/{}", R::COLLECTION);
    let item = format!("/{}/:id", R::COLLECTION);

    Router::new()
        .route(&collection, get(handle_list::<R>).post(handle_create::<R>))
        .route(
            &item,
            get(handle_get::<R>)
                .put(handle_update::<R>)
                .delete(handle_delete::<R>),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values() {
        assert!(is_falsy(&Value::Null));
        assert!(is_falsy(&json!(false)));
        assert!(is_falsy(&json!(0)));
        assert!(is_falsy(&json!(0.0)));
        assert!(is_falsy(&json!("")));
    }

    #[test]
    fn test_truthy_values() {
        assert!(!is_falsy(&json!(true)));
        assert!(!is_falsy(&json!(0.1)));
        assert!(!is_falsy(&json!("0")));
        assert!(!is_falsy(&json!([])));
        assert!(!is_falsy(&json!({})));
    }

    #[test]
    fn test_or_default_passes_malformed_values_through() {
        assert_eq!(or_default(Some(json!("hot")), 0.7), json!("hot"));
        assert_eq!(or_default(None, 0.7), json!(0.7));
        assert_eq!(or_default(Some(json!(0)), 2000), json!(2000));
    }

    #[test]
    fn test_blank_creation_body_uses_defaults() {
        let input: prompts::PromptInput = creation_input(b"").unwrap();
        assert_eq!(Prompt::fields(input)["title"], "Untitled Prompt");

        let input: prompts::PromptInput = creation_input(b" \n").unwrap();
        assert_eq!(Prompt::fields(input)["category"], "general");
    }

    #[test]
    fn test_creation_body_must_be_an_object() {
        let err = creation_input::<prompts::PromptInput>(b"\"hello\"").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = creation_input::<prompts::PromptInput>(b"title=x").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
