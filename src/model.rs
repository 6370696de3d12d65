// Wire types: the JSON shapes exchanged with the GPT-4 proxy API, the
// records written to an image manifest and the lines of a batch run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of upload, sent as the `type` form field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    /// Documents handed to the model as files.
    MyFiles,
    /// Images for multimodal prompts.
    Multimodal,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::MyFiles => "my_files",
            UploadType::Multimodal => "multimodal",
        }
    }
}

/// Chat payload for `/standard/all-tools`. `attachments` and `parts` hold
/// whatever the upload endpoint returned, untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    #[serde(default)]
    pub gizmo_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stream: bool,
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub history_and_training_disabled: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        ChatRequest {
            message: message.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_gizmo(mut self, gizmo_id: impl Into<String>) -> Self {
        self.gizmo_id = gizmo_id.into();
        self
    }
}

/// Response of the chat endpoint. Unknown fields are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub end_turn: bool,
    #[serde(default)]
    pub contents: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<String>,
    /// Local names given to `downloads` that were saved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spec_downloads: Vec<SpecDownload>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SpecDownload {
    pub origin: String,
    pub local: String,
}

/// Response of the upload endpoint. `attachment` and `part` are opaque and
/// are only ever passed back to the chat endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UploadResponse {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<Value>,
}

/// One line of an image manifest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestRecord {
    pub id: String,
    pub asks: Vec<Ask>,
    pub extra: String,
}

/// One question of a record. `images` go up as multimodal uploads and
/// `files` as documents before the question is sent.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Ask {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// A batch input/output line. A manifest line reads as one; after a run
/// it carries the chat responses in `answers`, or the failure in `iErr`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BatchRecord {
    pub id: String,
    #[serde(default)]
    pub asks: Vec<Ask>,
    #[serde(default)]
    pub answers: Vec<ChatResponse>,
    #[serde(rename = "iErr", default, skip_serializing_if = "Option::is_none")]
    pub ierr: Option<IErr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IErr {
    pub code: u16,
    pub message: String,
}

impl ManifestRecord {
    /// Record number `index` asking `prompt` about `image`.
    pub fn new(index: usize, prompt: &str, image: String) -> Self {
        ManifestRecord {
            id: format!("in-{}", index),
            asks: vec![Ask {
                id: format!("ask-{}", index),
                content: prompt.to_string(),
                images: vec![image.clone()],
                files: Vec::new(),
            }],
            extra: image,
        }
    }
}
