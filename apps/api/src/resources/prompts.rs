use serde::Deserialize;
use serde_json::{json, Value};

use crate::resources::{or_default, DeletePolicy, Resource};
use crate::store::Record;

/// A reusable prompt snippet in the library.
pub struct Prompt;

#[derive(Debug, Default, Deserialize)]
pub struct PromptInput {
    pub title: Option<Value>,
    pub content: Option<Value>,
    pub category: Option<Value>,
    pub tags: Option<Value>,
}

impl Resource for Prompt {
    const COLLECTION: &'static str = "prompts";
    const LABEL: &'static str = "Prompt";
    const DELETE_POLICY: DeletePolicy = DeletePolicy::Idempotent;

    type Input = PromptInput;

    fn fields(input: PromptInput) -> Record {
        let mut record = Record::new();
        record.insert("title".into(), or_default(input.title, "Untitled Prompt"));
        record.insert("content".into(), or_default(input.content, ""));
        record.insert("category".into(), or_default(input.category, "general"));
        record.insert("tags".into(), or_default(input.tags, json!([])));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_input() {
        let fields = Prompt::fields(PromptInput::default());
        assert_eq!(fields["title"], "Untitled Prompt");
        assert_eq!(fields["content"], "");
        assert_eq!(fields["category"], "general");
        assert_eq!(fields["tags"], json!([]));
    }

    #[test]
    fn test_tags_keep_order() {
        let input = PromptInput {
            tags: Some(json!(["writing", "email", "formal"])),
            ..Default::default()
        };
        assert_eq!(
            Prompt::fields(input)["tags"],
            json!(["writing", "email", "formal"])
        );
    }
}
