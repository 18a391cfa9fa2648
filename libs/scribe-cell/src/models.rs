use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Four-section clinical note produced from a consultation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

impl SoapNote {
    /// Returned whenever the transcript cannot be analysed.
    pub fn placeholder() -> Self {
        Self {
            subjective: "Transcript analysis unavailable. Check API connectivity.".to_string(),
            objective: "No exam data extracted.".to_string(),
            assessment: "Pending review.".to_string(),
            plan: "Manual documentation required.".to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateSoapRequest {
    #[serde(default)]
    pub transcript: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSoapResponse {
    pub note: SoapNote,
    pub generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSoapNoteRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    #[serde(flatten)]
    pub note: SoapNote,
    pub diagnosis: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSoapNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    pub doctor_name: Option<String>,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub diagnosis: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotesQuery {
    pub patient_id: Option<Uuid>,
}

// Gemini REST payloads

#[derive(Debug, Deserialize)]
pub struct GeminiModelList {
    #[serde(default)]
    pub models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiPart {
    pub text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Gemini API error: {0}")]
    Api(String),

    #[error("Invalid Gemini response: {0}")]
    InvalidResponse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<reqwest::Error> for ScribeError {
    fn from(error: reqwest::Error) -> Self {
        ScribeError::Api(error.to_string())
    }
}
