// libs/scribe-cell/src/services/gemini.rs
use reqwest::{header, Client};
use serde_json::json;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{GeminiModelList, GeminiResponse, ScribeError, SoapNote};

pub const FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// Preferred flash models, best first.
const MODEL_PREFERENCE: [&str; 3] = ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-1.5-flash"];

/// Gemini-backed clinical scribe.
pub struct GeminiScribe {
    client: Client,
    api_key: String,
    base_url: String,
    doctor_name: String,
}

impl GeminiScribe {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            doctor_name: config.clinic_doctor_name.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }

    fn system_instruction(&self) -> String {
        format!(
            "You are an expert Pediatric Scribe for {} in Balamban, Cebu. \
             The transcript may contain a mix of Bisaya (Cebuano) and English. \
             Translate all Bisaya phrases into professional clinical English. \
             Organize the findings into a standard SOAP note format.",
            self.doctor_name
        )
    }

    /// Best available flash model, or the fallback when discovery fails.
    pub async fn discover_model(&self) -> String {
        match self.list_models().await {
            Ok(names) => pick_model(&names),
            Err(e) => {
                warn!("Model discovery failed, falling back to {}: {}", FALLBACK_MODEL, e);
                FALLBACK_MODEL.to_string()
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ScribeError> {
        let url = format!("{}/models", self.base_url);
        debug!("Listing Gemini models from {}", url);

        let response = self.client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(ScribeError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let list: GeminiModelList = response.json().await?;
        Ok(list
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }

    /// Turns a consultation transcript into a SOAP note. Never fails: any problem
    /// yields the placeholder note.
    pub async fn generate_soap_note(&self, transcript: &str) -> SoapNote {
        if !self.is_configured() || transcript.trim().is_empty() {
            debug!("Skipping SOAP generation: scribe unconfigured or transcript empty");
            return SoapNote::placeholder();
        }

        match self.try_generate(transcript).await {
            Ok(note) => note,
            Err(e) => {
                error!("SOAP generation failed: {}", e);
                SoapNote::placeholder()
            }
        }
    }

    async fn try_generate(&self, transcript: &str) -> Result<SoapNote, ScribeError> {
        let model = self.discover_model().await;
        info!("Generating SOAP note with {}", model);

        let prompt = format!(
            "Analyze this pediatric consultation transcript:\n\"{}\"\n\n\
             Generate a JSON object with exactly these keys:\n\
             - subjective: Patient/Parent history and complaints.\n\
             - objective: Physical examination findings, vitals, and observations.\n\
             - assessment: Diagnosis, differential diagnosis, or clinical impression.\n\
             - plan: Medications (dosage/duration), labs, follow-up, and home care advice.\n\n\
             Return ONLY valid JSON. If Bisaya was spoken, ensure the JSON content is in English.",
            transcript
        );

        let body = json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction() }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.2 }
        });

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(ScribeError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let gemini: GeminiResponse = response.json().await?;
        let text = gemini
            .text()
            .ok_or_else(|| ScribeError::InvalidResponse("no candidate text".to_string()))?;

        parse_soap_json(&text)
    }
}

pub fn pick_model(names: &[String]) -> String {
    MODEL_PREFERENCE
        .iter()
        .find_map(|preferred| names.iter().find(|name| name.contains(preferred)))
        .cloned()
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

/// Drops Markdown code fences the model likes to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn parse_soap_json(text: &str) -> Result<SoapNote, ScribeError> {
    serde_json::from_str(&strip_code_fences(text))
        .map_err(|e| ScribeError::InvalidResponse(e.to_string()))
}
