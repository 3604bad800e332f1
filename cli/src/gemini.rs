use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use nutrilog_core::assistant::{
    AssistantRequest, ChatMessage, ChatRole, NutritionAssistant, system_instruction,
};
use nutrilog_core::coach::WorkoutCoach;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEMPERATURE: f64 = 0.7;
const COACH_TEMPERATURE: f64 = 0.8;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        inline_data: None,
    }
}

fn image_part(base64_jpeg: &str) -> Part {
    Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: "image/jpeg".to_string(),
            data: base64_jpeg.to_string(),
        }),
    }
}

fn message_content(role: ChatRole, text: &str, image: Option<&str>) -> Content {
    let role = match role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    };
    let mut parts = vec![text_part(text)];
    parts.extend(image.map(image_part));
    Content {
        role: Some(role.to_string()),
        parts,
    }
}

fn build_request(request: &AssistantRequest<'_>) -> GenerateRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .filter(|m| !m.is_error)
        .map(|m: &ChatMessage| message_content(m.role, &m.text, m.image.as_deref()))
        .collect();
    contents.push(message_content(ChatRole::User, request.text, request.image));

    GenerateRequest {
        system_instruction: Some(Content {
            role: None,
            parts: vec![text_part(&system_instruction(
                request.targets,
                request.log,
                request.date,
            ))],
        }),
        contents,
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
        },
    }
}

fn coach_request(prompt: &str) -> GenerateRequest {
    GenerateRequest {
        system_instruction: None,
        contents: vec![message_content(ChatRole::User, prompt, None)],
        generation_config: GenerationConfig {
            temperature: COACH_TEMPERATURE,
        },
    }
}

fn reply_text(response: GenerateResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("Assistant returned no candidates")?;
    let text: String = candidate
        .content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    Ok(text)
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("nutrilog/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    async fn generate(&self, body: &GenerateRequest) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            log::debug!("Gemini error body: {detail}");
            bail!("Gemini API returned {status}");
        }

        let data: GenerateResponse = resp
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        reply_text(data)
    }
}

impl NutritionAssistant for GeminiClient {
    async fn analyze(&self, request: &AssistantRequest<'_>) -> Result<String> {
        self.generate(&build_request(request)).await
    }
}

impl WorkoutCoach for GeminiClient {
    async fn advise(&self, prompt: &str) -> Result<String> {
        self.generate(&coach_request(prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::models::{DailyLog, Targets, parse_date_key};

    #[test]
    fn test_request_shape() {
        let history = vec![
            ChatMessage::model("Welcome!"),
            ChatMessage::error("Could not reach the assistant."),
            ChatMessage::user("eggs", Some("aGk=".to_string())),
        ];
        let targets = Targets::default();
        let log = DailyLog::default();
        let request = AssistantRequest {
            history: &history,
            text: "and toast",
            image: None,
            targets: &targets,
            log: &log,
            date: parse_date_key("2024-10-01").unwrap(),
        };

        let value = serde_json::to_value(build_request(&request)).unwrap();
        let contents = value["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[1]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(contents[2]["parts"][0]["text"], "and toast");
        assert_eq!(contents[2]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(value["generationConfig"]["temperature"], 0.7);
        assert!(
            value["systemInstruction"]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .contains("Date: 2024-10-01")
        );
        assert!(value["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn test_coach_request_has_no_system_instruction() {
        let value = serde_json::to_value(coach_request("Analyze this")).unwrap();
        assert!(value.get("systemInstruction").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Analyze this");
        assert_eq!(value["generationConfig"]["temperature"], 0.8);
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let raw = r#"{"candidates": [{"content": {"role": "model",
            "parts": [{"text": "Hello "}, {"text": "there"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(reply_text(response).unwrap(), "Hello there");
    }

    #[test]
    fn test_reply_without_candidates_is_error() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(reply_text(response).is_err());
    }

    #[tokio::test]
    #[ignore = "requires GEMINI_API_KEY and network access"]
    async fn test_live_exchange() {
        let key = std::env::var("GEMINI_API_KEY").unwrap();
        let client = GeminiClient::new(key, "gemini-3-flash-preview".to_string()).unwrap();
        let targets = Targets::default();
        let log = DailyLog::default();
        let request = AssistantRequest {
            history: &[],
            text: "I ate one banana",
            image: None,
            targets: &targets,
            log: &log,
            date: parse_date_key("2024-10-01").unwrap(),
        };
        let raw = client.analyze(&request).await.unwrap();
        assert!(!raw.is_empty());
    }
}
