//! Department routing for civic issues.
//!
//! [`Classifier::classify`] asks a chat-completions backend which department
//! should own an issue and falls back to a deterministic keyword scan on any
//! failure, so callers always receive a [`Classification`].

use civic_core::{Department, RoutingMethod};
use serde_json::Value;
use tracing::{debug, warn};

pub mod backend;
pub mod fallback;
pub mod priority;

pub use backend::{
    backend_from_config, AiConfig, AiError, ChatBackend, ChatMessage, ChatRequest,
    DisabledBackend, HttpChatBackend,
};
pub use fallback::fallback_classification;
pub use priority::estimate_priority;

pub const CLASSIFY_MAX_TOKENS: u32 = 500;
pub const CLASSIFY_TEMPERATURE: f64 = 0.1;
pub const IMAGE_MAX_TOKENS: u32 = 300;

const DEFAULT_CONFIDENCE: f64 = 0.5;
const INVALID_DEPARTMENT_CONFIDENCE: f64 = 0.3;
const DEFAULT_REASONING: &str = "AI categorization completed";

const IMAGE_PROMPT: &str = "Analyze this civic issue image and describe what type of problem it shows. Focus on identifying the category of issue (roads, sanitation, electricity, water, traffic, etc.) and key visual elements that would help categorize it for municipal department routing.";

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub department: Department,
    pub confidence: f64,
    pub method: RoutingMethod,
    pub reasoning: String,
}

/// What the classifier sees of an issue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueContext {
    pub title: String,
    pub description: String,
    pub location: String,
    pub image_provided: bool,
}

pub struct Classifier {
    backend: Box<dyn ChatBackend>,
}

impl Classifier {
    pub fn new(backend: Box<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Keyword routing only.
    pub fn offline() -> Self {
        Self::new(Box::new(DisabledBackend))
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(backend_from_config(config))
    }

    pub fn classify(&self, context: &IssueContext, image_base64: Option<&str>) -> Classification {
        match self.classify_with_ai(context, image_base64) {
            Ok(classification) => {
                debug!(
                    department = %classification.department,
                    confidence = classification.confidence,
                    reasoning = %classification.reasoning,
                    "AI classification"
                );
                classification
            }
            Err(err) => {
                if !matches!(err, AiError::Disabled) {
                    warn!(error = %err, "AI classification failed, using keyword fallback");
                }
                let classification =
                    fallback_classification(&context.title, &context.description);
                debug!(
                    department = %classification.department,
                    confidence = classification.confidence,
                    "fallback classification"
                );
                classification
            }
        }
    }

    /// Asks the image-understanding service what the photo shows.
    pub fn describe_image(&self, image_base64: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            messages: vec![ChatMessage::user_with_image(IMAGE_PROMPT, image_base64)],
            max_tokens: IMAGE_MAX_TOKENS,
            temperature: None,
            json_reply: false,
        };
        self.backend.chat(&request)
    }

    fn classify_with_ai(
        &self,
        context: &IssueContext,
        image_base64: Option<&str>,
    ) -> Result<Classification, AiError> {
        let mut user_content = user_prompt(context);
        if let Some(image) = image_base64 {
            match self.describe_image(image) {
                Ok(analysis) => {
                    user_content.push_str("\n\nImage Analysis: ");
                    user_content.push_str(&analysis);
                }
                Err(AiError::Disabled) => return Err(AiError::Disabled),
                Err(err) => warn!(error = %err, "image analysis failed, classifying without it"),
            }
        }

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(system_prompt()),
                ChatMessage::user(user_content),
            ],
            max_tokens: CLASSIFY_MAX_TOKENS,
            temperature: Some(CLASSIFY_TEMPERATURE),
            json_reply: true,
        };
        let reply = self.backend.chat(&request)?;
        parse_reply(&reply)
    }
}

fn system_prompt() -> String {
    let departments = Department::ROUTABLE
        .iter()
        .map(|department| format!("- {}: {}", department, department.responsibilities()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an AI assistant for a civic issue management system. Your task is to categorize civic issues and route them to the appropriate government department.

Available departments and their responsibilities:
{departments}

Analyze the provided issue details and categorize it into the most appropriate department. Consider the main problem described, keywords and context, location relevance, and urgency indicators.

Respond with a JSON object containing:
- \"department\": the most appropriate department name (must be one of the names above)
- \"confidence\": a confidence score between 0.0 and 1.0
- \"reasoning\": a brief explanation for the categorization

Guidelines for confidence scoring:
- 0.9-1.0: very clear category match with specific keywords
- 0.7-0.8: good match with contextual clues
- 0.5-0.6: reasonable match but some ambiguity
- 0.0-0.4: low confidence, unclear categorization"
    )
}

fn user_prompt(context: &IssueContext) -> String {
    let or_default = |value: &str, default: &str| {
        if value.trim().is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };
    format!(
        "Issue Title: {}\nDescription: {}\nLocation: {}\nHas Image: {}\n\nPlease categorize this civic issue.",
        or_default(&context.title, "No title"),
        or_default(&context.description, "No description"),
        or_default(&context.location, "No location specified"),
        context.image_provided,
    )
}

/// Decodes `{department, confidence, reasoning}` from the model reply.
fn parse_reply(reply: &str) -> Result<Classification, AiError> {
    let body = strip_code_fence(reply);
    let value: Value =
        serde_json::from_str(body).map_err(|e| AiError::MalformedReply(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| AiError::MalformedReply("reply is not a JSON object".to_string()))?;

    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => DEFAULT_CONFIDENCE,
        Some(Value::Number(number)) => number.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        Some(Value::String(text)) => text.trim().parse::<f64>().map_err(|_| {
            AiError::MalformedReply(format!("confidence is not a number: {text}"))
        })?,
        Some(other) => {
            return Err(AiError::MalformedReply(format!(
                "confidence is not a number: {other}"
            )))
        }
    };
    let mut confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    };

    let label = object
        .get("department")
        .and_then(Value::as_str)
        .unwrap_or(Department::PublicWorks.as_str());
    let department = match Department::from_routing_label(label) {
        Some(department) => department,
        None => {
            warn!(label, "AI returned an unknown department, routing to Public Works");
            confidence = confidence.min(INVALID_DEPARTMENT_CONFIDENCE);
            Department::PublicWorks
        }
    };

    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(DEFAULT_REASONING)
        .to_string();

    Ok(Classification {
        department,
        confidence,
        method: RoutingMethod::Ai,
        reasoning,
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
