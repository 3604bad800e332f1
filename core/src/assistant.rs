//! Conversation with the nutrition assistant and extraction of the totals
//! patch it appends to each reply.

use std::future::Future;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DATE_FORMAT, DailyLog, Targets};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    /// Base64-encoded JPEG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: &str, image: Option<String>) -> Self {
        Self::new(ChatRole::User, text, image, false)
    }

    #[must_use]
    pub fn model(text: &str) -> Self {
        Self::new(ChatRole::Model, text, None, false)
    }

    #[must_use]
    pub fn error(text: &str) -> Self {
        Self::new(ChatRole::Model, text, None, true)
    }

    fn new(role: ChatRole, text: &str, image: Option<String>, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.to_string(),
            image,
            is_error,
        }
    }
}

pub const WELCOME_TEXT: &str = "Welcome! Tell me what you ate or send a photo of your meal \
and I'll keep your daily totals up to date. Your log syncs to the cloud, so it survives \
clearing this device.";

pub const ERROR_TEXT: &str = "Could not reach the assistant. Please try again.";

/// Messages shown in the chat, plus whether a reply is being awaited.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
    pub pending: bool,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_welcome() -> Self {
        Self {
            messages: vec![ChatMessage::model(WELCOME_TEXT)],
            pending: false,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

// --- Patch ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PartialTotals {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PartialSupplements {
    pub creatine: Option<bool>,
    pub multivitamin: Option<bool>,
}

/// Cumulative values the assistant wants written into today's log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPatch {
    pub daily_totals: Option<PartialTotals>,
    pub supplements: Option<PartialSupplements>,
}

impl AiPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.daily_totals.is_none() && self.supplements.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub patch: Option<AiPatch>,
}

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Split a raw reply into display text and the optional trailing patch.
///
/// Only the first fenced `json` block is considered. When it parses, it is
/// cut out of the text; when it doesn't, the text is returned untouched and
/// no patch is produced.
#[must_use]
pub fn parse_reply(raw: &str) -> AssistantReply {
    let unparsed = || AssistantReply {
        text: raw.to_string(),
        patch: None,
    };

    let Some(start) = raw.find(FENCE_OPEN) else {
        return unparsed();
    };
    let body_start = start + FENCE_OPEN.len();
    let Some(body_len) = raw[body_start..].find(FENCE_CLOSE) else {
        return unparsed();
    };
    let body_end = body_start + body_len;
    let block_end = body_end + FENCE_CLOSE.len();

    match serde_json::from_str::<AiPatch>(raw[body_start..body_end].trim()) {
        Ok(patch) => {
            let text = format!("{}{}", &raw[..start], &raw[block_end..]);
            AssistantReply {
                text: text.trim().to_string(),
                patch: Some(patch),
            }
        }
        Err(e) => {
            log::error!("Discarding malformed totals block in assistant reply: {e}");
            unparsed()
        }
    }
}

// --- Assistant contract ---

/// Everything the assistant sees for one exchange.
#[derive(Debug, Clone, Copy)]
pub struct AssistantRequest<'a> {
    pub history: &'a [ChatMessage],
    pub text: &'a str,
    pub image: Option<&'a str>,
    pub targets: &'a Targets,
    pub log: &'a DailyLog,
    pub date: NaiveDate,
}

pub trait NutritionAssistant: Send + Sync {
    /// The raw reply text, patch block included.
    fn analyze(&self, request: &AssistantRequest<'_>) -> impl Future<Output = Result<String>> + Send;
}

const PERSONA: &str = "\
You are a friendly, motivating nutrition assistant. Track the user's calories and \
macros through the day from the meal photos and text they send. Estimate calories, \
protein, carbs, fat, fiber, sugar and sodium as accurately as you can. When given a \
photo, list what you see and your estimate for each item.";

const PATCH_FORMAT: &str = r#"
IMPORTANT SYSTEM INSTRUCTION FOR DATA PARSING:
At the very end of your response you MUST append a JSON block with the *updated
cumulative* daily totals and supplement status, in exactly this format:
```json
{
  "dailyTotals": {
    "calories": 1200,
    "protein": 80,
    "carbs": 150,
    "fat": 40,
    "fiber": 20,
    "sugar": 30,
    "sodium": 1500
  },
  "supplements": {
    "creatine": true,
    "multivitamin": false
  }
}
```
Do not include any other text after this JSON block."#;

/// Instruction block sent with every exchange: persona, the patch format,
/// and the current targets and log for `date`.
#[must_use]
pub fn system_instruction(targets: &Targets, log: &DailyLog, date: NaiveDate) -> String {
    let targets_json = serde_json::to_string(targets).unwrap_or_default();
    let log_json = serde_json::to_string(log).unwrap_or_default();
    format!(
        "{PERSONA}\n{PATCH_FORMAT}\n\n[SYSTEM CONTEXT]\nCurrent User Targets: {targets_json}\n\
         Current Cumulative Daily Log: {log_json}\nDate: {}\n",
        date.format(DATE_FORMAT)
    )
}
