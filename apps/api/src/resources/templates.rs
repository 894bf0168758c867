use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::resources::profiles::ProfileInput;
use crate::resources::{create_record, not_found, or_default, DeletePolicy, Profile, Resource};
use crate::state::AppState;
use crate::store::Record;

/// A shareable profile blueprint with authorship and visibility.
pub struct Template;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInput {
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub system_instructions: Option<Value>,
    pub initiation_prompt: Option<Value>,
    pub category: Option<Value>,
    pub is_public: Option<Value>,
    pub author: Option<Value>,
}

impl Resource for Template {
    const COLLECTION: &'static str = "templates";
    const LABEL: &'static str = "Template";
    const DELETE_POLICY: DeletePolicy = DeletePolicy::Idempotent;

    type Input = TemplateInput;

    fn fields(input: TemplateInput) -> Record {
        let mut record = Record::new();
        record.insert("name".into(), or_default(input.name, "Untitled Template"));
        record.insert("description".into(), or_default(input.description, ""));
        record.insert(
            "systemInstructions".into(),
            or_default(input.system_instructions, ""),
        );
        record.insert(
            "initiationPrompt".into(),
            or_default(input.initiation_prompt, ""),
        );
        record.insert("category".into(), or_default(input.category, "general"));
        record.insert("isPublic".into(), or_default(input.is_public, false));
        record.insert("author".into(), or_default(input.author, "Anonymous"));
        record
    }
}

/// Profile input copied from a template. The new profile keeps no
/// reference back to it.
pub fn profile_from_template(template: &Record) -> ProfileInput {
    let name = match template.get("name") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => "Untitled Template".to_string(),
        Some(other) => other.to_string(),
    };

    ProfileInput {
        name: Some(Value::String(format!("{name} (from template)"))),
        description: template.get("description").cloned(),
        system_instructions: template.get("systemInstructions").cloned(),
        initiation_prompt: template.get("initiationPrompt").cloned(),
        ..Default::default()
    }
}

/// POST /api/templates/:id/use
pub async fn handle_use_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let template = state
        .store
        .find_by_id(Template::COLLECTION, &id)
        .await?
        .ok_or_else(not_found::<Template>)?;

    let profile =
        create_record::<Profile>(state.store.as_ref(), profile_from_template(&template)).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}
