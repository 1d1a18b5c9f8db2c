use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::model::{AnswerGrade, Question, QuizStyle};

use crate::error::OracleError;

/// Verdict for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub grade: AnswerGrade,
    pub feedback: String,
}

/// The external grading dependency.
///
/// Implementations may fail transiently; the engine treats every failure
/// as retryable and never advances past a position without a terminal
/// grade. Nothing here constrains a retry call to terminal grades — the
/// session state machine clamps a second `partial` on its own.
#[async_trait]
pub trait GradingOracle: Send + Sync {
    /// Grade one user answer against the accepted answer.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` when the oracle cannot produce a verdict.
    async fn grade(
        &self,
        question: &Question,
        user_answer: &str,
        style: QuizStyle,
    ) -> Result<GradedAnswer, OracleError>;
}

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OracleConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("QUIZ_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Chat-completions-backed grading oracle.
#[derive(Clone)]
pub struct ChatGradingOracle {
    client: Client,
    config: Option<OracleConfig>,
}

impl ChatGradingOracle {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(OracleConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<OracleConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn build_prompt(question: &Question, user_answer: &str, style: QuizStyle) -> String {
        let tone = match style {
            QuizStyle::Formal => "Write the feedback in a neutral, formal tone.",
            QuizStyle::Comedy => "Write the feedback in a light, humorous tone.",
        };
        format!(
            "You are grading one quiz answer.\n\
             Question: {question}\n\
             Accepted answer: {accepted}\n\
             User answer: {user}\n\
             Reply with JSON only: {{\"grade\": \"correct\"|\"partial\"|\"incorrect\", \"feedback\": \"...\"}}.\n\
             Use \"partial\" only when the answer is close enough that one more try is warranted.\n\
             {tone}",
            question = question.prompt(),
            accepted = question.accepted_answer(),
            user = user_answer,
        )
    }

    fn parse_verdict(content: &str) -> Result<GradedAnswer, OracleError> {
        let trimmed = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        let verdict: Verdict = serde_json::from_str(trimmed)
            .map_err(|e| OracleError::MalformedVerdict(e.to_string()))?;
        let grade = verdict
            .grade
            .parse::<AnswerGrade>()
            .map_err(|e| OracleError::MalformedVerdict(e.to_string()))?;
        Ok(GradedAnswer {
            grade,
            feedback: verdict.feedback,
        })
    }
}

#[async_trait]
impl GradingOracle for ChatGradingOracle {
    async fn grade(
        &self,
        question: &Question,
        user_answer: &str,
        style: QuizStyle,
    ) -> Result<GradedAnswer, OracleError> {
        let config = self.config.as_ref().ok_or(OracleError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: Self::build_prompt(question, user_answer, style),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OracleError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(OracleError::EmptyResponse)?;

        Self::parse_verdict(&content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    grade: String,
    feedback: String,
}
