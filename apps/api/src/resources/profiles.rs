use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::resources::{not_found, or_default, DeletePolicy, Resource};
use crate::state::AppState;
use crate::store::{timestamp, Record};

/// A GPT configuration: instructions plus sampling parameters.
pub struct Profile;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub name: Option<Value>,
    pub description: Option<Value>,
    pub system_instructions: Option<Value>,
    pub initiation_prompt: Option<Value>,
    pub temperature: Option<Value>,
    pub max_tokens: Option<Value>,
}

impl Resource for Profile {
    const COLLECTION: &'static str = "profiles";
    const LABEL: &'static str = "Profile";
    const DELETE_POLICY: DeletePolicy = DeletePolicy::RequireExisting;

    type Input = ProfileInput;

    fn fields(input: ProfileInput) -> Record {
        let mut record = Record::new();
        record.insert("name".into(), or_default(input.name, "Untitled GPT"));
        record.insert("description".into(), or_default(input.description, ""));
        record.insert(
            "systemInstructions".into(),
            or_default(input.system_instructions, ""),
        );
        record.insert(
            "initiationPrompt".into(),
            or_default(input.initiation_prompt, ""),
        );
        record.insert("temperature".into(), or_default(input.temperature, 0.7));
        record.insert("maxTokens".into(), or_default(input.max_tokens, 2000));
        record
    }
}

/// Shareable view of a profile without bookkeeping fields.
/// Fields missing from the stored record are omitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileExport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiation_prompt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Value>,
    pub exported_at: String,
}

impl ProfileExport {
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.get("name").cloned(),
            description: record.get("description").cloned(),
            system_instructions: record.get("systemInstructions").cloned(),
            initiation_prompt: record.get("initiationPrompt").cloned(),
            temperature: record.get("temperature").cloned(),
            max_tokens: record.get("maxTokens").cloned(),
            exported_at: timestamp(Utc::now()),
        }
    }
}

/// Download filename: lowercase alphanumeric runs joined by `-`.
pub fn export_filename(name: Option<&Value>) -> String {
    let name = name.and_then(Value::as_str).unwrap_or_default();
    let slug = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "profile.json".to_string()
    } else {
        format!("{slug}.json")
    }
}

/// GET /api/profiles/:id/export
pub async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .store
        .find_by_id(Profile::COLLECTION, &id)
        .await?
        .ok_or_else(not_found::<Profile>)?;

    let filename = export_filename(profile.get("name"));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| anyhow::anyhow!("invalid export filename {filename}: {e}"))?;

    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(ProfileExport::from_record(&profile)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_for_empty_input() {
        let fields = Profile::fields(ProfileInput::default());
        assert_eq!(fields["name"], "Untitled GPT");
        assert_eq!(fields["description"], "");
        assert_eq!(fields["systemInstructions"], "");
        assert_eq!(fields["initiationPrompt"], "");
        assert_eq!(fields["temperature"], 0.7);
        assert_eq!(fields["maxTokens"], 2000);
    }

    #[test]
    fn test_zero_temperature_falls_back_to_default() {
        let input = ProfileInput {
            temperature: Some(json!(0)),
            ..Default::default()
        };
        assert_eq!(Profile::fields(input)["temperature"], 0.7);
    }

    #[test]
    fn test_export_omits_bookkeeping_fields() {
        let record: Record = serde_json::from_value(json!({
            "id": "1",
            "name": "Tester",
            "description": "",
            "systemInstructions": "be nice",
            "initiationPrompt": "",
            "temperature": 1.2,
            "maxTokens": 2000,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();

        let export = serde_json::to_value(ProfileExport::from_record(&record)).unwrap();
        assert!(export.get("id").is_none());
        assert!(export.get("createdAt").is_none());
        assert!(export.get("updatedAt").is_none());
        assert_eq!(export["temperature"], 1.2);
        assert!(export["exportedAt"].is_string());
    }

    #[test]
    fn test_export_filename_slug() {
        assert_eq!(
            export_filename(Some(&json!("My  Coding Buddy!"))),
            "my-coding-buddy.json"
        );
        assert_eq!(export_filename(Some(&json!("???"))), "profile.json");
        assert_eq!(export_filename(None), "profile.json");
    }
}
