use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::{Analysis, WordExplanation};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const BASELINE_MODEL: &str = "deepseek-chat";
const SILICONFLOW_MODEL: &str = "deepseek-ai/DeepSeek-V3";
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);
const EXPLAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Credential and endpoint for the chat-completions vendor, resolved once
/// from the settings store. The client is rebuilt when settings change;
/// nothing re-reads storage per call.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl AiConfig {
    pub fn resolve(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI 未配置，请先在设置中填写 API Key")]
    NotConfigured,
    #[error("AI 思考超时，请重试")]
    Timeout,
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("{0}")]
    Upstream(String),
    #[error("AI 返回了格式错误的内容，请重试")]
    BadFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    error: Option<VendorError>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl ChatEnvelope {
    fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Clone)]
pub struct AiClient {
    config: AiConfig,
    client: reqwest::Client,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// SiliconFlow hosts DeepSeek under a namespaced model id; everything
    /// else gets the vendor's own name.
    pub fn model(&self) -> &'static str {
        if self.config.base_url.contains("siliconflow") {
            SILICONFLOW_MODEL
        } else {
            BASELINE_MODEL
        }
    }

    /// Sentence-by-sentence lesson annotation. Errors surface to the caller;
    /// rerunning simply overwrites the previous analysis.
    pub async fn analyze_text(&self, text: &str) -> Result<Analysis, AiError> {
        let content = self
            .chat(analysis_prompt(text), 0.1, ANALYZE_TIMEOUT)
            .await?;
        serde_json::from_str(&content).map_err(|error| {
            warn!(%error, "analysis content did not match the lesson schema");
            AiError::BadFormat
        })
    }

    /// Single-word lookup. Never raises: any failure reads as "no result" so
    /// a flaky vendor cannot interrupt reading.
    pub async fn explain_word(&self, word: &str, rough_context: &str) -> Option<WordExplanation> {
        match self.try_explain(word, rough_context).await {
            Ok(explanation) => Some(explanation),
            Err(error) => {
                warn!(word, %error, "word lookup failed");
                None
            }
        }
    }

    async fn try_explain(&self, word: &str, rough_context: &str) -> Result<WordExplanation, AiError> {
        let content = self
            .chat(explain_prompt(word, rough_context), 0.3, EXPLAIN_TIMEOUT)
            .await?;
        serde_json::from_str(&content).map_err(|_| AiError::BadFormat)
    }

    async fn chat(
        &self,
        prompt: String,
        temperature: f64,
        timeout: Duration,
    ) -> Result<String, AiError> {
        let api_key = self.config.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let payload = serde_json::json!({
            "model": self.model(),
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "response_format": { "type": "json_object" }
        });

        let response = match self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(AiError::Timeout),
            Err(e) => return Err(AiError::Request(e)),
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(AiError::Timeout),
            Err(e) => return Err(AiError::Request(e)),
        };

        // Vendors report failures both as non-2xx statuses and as an `error`
        // object inside a 200 body; check the body first.
        let envelope: ChatEnvelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(AiError::Upstream(format!("API Error: {}", status.as_u16())))
            }
            Err(_) => return Err(AiError::BadFormat),
        };
        if let Some(vendor) = envelope.error {
            let message = if vendor.message.is_empty() {
                format!("API Error: {}", status.as_u16())
            } else {
                vendor.message
            };
            return Err(AiError::Upstream(message));
        }
        if !status.is_success() {
            return Err(AiError::Upstream(format!("API Error: {}", status.as_u16())));
        }

        let content = envelope.first_content().ok_or(AiError::BadFormat)?;
        Ok(strip_code_fences(content))
    }
}

/// Models sometimes wrap the requested JSON in a markdown fence even with
/// `response_format` set.
fn strip_code_fences(content: &str) -> String {
    content
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn analysis_prompt(text: &str) -> String {
    format!(
        r#"你是一位法语私教。请将文本拆解为教材。

文本：
"{text}"

任务：
1. 【拆句】：按语义拆分句子。
2. 【划重点】：不要罗列每个单词！只提取**有学习价值**的“语块”(Chunks)。
   - 组合词/短语：如 "tout le monde" (不要拆开)。
   - 时态结构：如 "on va présenter" (近将来时)。
   - 难词/变位：如 "viennent" (venir 变位)。
   - 连诵/发音：如 "vous_allez" (连读)。

请严格返回 JSON (纯文本)：
{{
  "title": "标题",
  "summary": "摘要",
  "sentences": [
    {{
      "original": "法语原句",
      "trans": "中文翻译",
      "points": [
        {{
          "chunk": "on va vous présenter",
          "type": "语法",
          "desc": "近将来时 (aller + infinitive)，表示'我们将要向您介绍'"
        }},
        {{
          "chunk": "les plus populaires",
          "type": "词汇",
          "desc": "最高级结构，'最受欢迎的'"
        }},
        {{
          "chunk": "snack",
          "type": "发音",
          "desc": "注意 ck 发音 /k/，这是外来词"
        }}
      ]
    }}
  ]
}}"#
    )
}

fn explain_prompt(word: &str, rough_context: &str) -> String {
    format!(
        r#"语境："...{rough_context}..."
单词： "{word}"。

请返回 JSON：
{{
  "meaning": "中文释义",
  "pronunciation": "IPA",
  "grammar_type": "词性",
  "note": "用法提示",
  "perfect_sentence": "标准法语句子"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_applies_when_unset_or_blank() {
        let config = AiConfig::resolve(None, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key, None);

        let config = AiConfig::resolve(Some("  ".into()), Some(String::new()));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn model_follows_the_host() {
        let deepseek = AiClient::new(AiConfig::resolve(
            Some("sk-test".into()),
            Some("https://api.deepseek.com".into()),
        ));
        assert_eq!(deepseek.model(), "deepseek-chat");

        let siliconflow = AiClient::new(AiConfig::resolve(
            Some("sk-test".into()),
            Some("https://api.siliconflow.cn".into()),
        ));
        assert_eq!(siliconflow.model(), "deepseek-ai/DeepSeek-V3");
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(
            strip_code_fences("```json\n{\"title\":\"x\"}\n```"),
            "{\"title\":\"x\"}"
        );
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    }

    #[test]
    fn prompts_embed_the_user_input() {
        let prompt = analysis_prompt("Tout le monde est là.");
        assert!(prompt.contains("Tout le monde est là."));
        assert!(prompt.contains("\"points\""));

        let prompt = explain_prompt("fromage", "du fromage et du pain");
        assert!(prompt.contains("\"fromage\""));
        assert!(prompt.contains("du fromage et du pain"));
        assert!(prompt.contains("perfect_sentence"));
    }

    #[test]
    fn vendor_error_inside_success_body_is_parsed() {
        let envelope: ChatEnvelope = serde_json::from_str(
            r#"{"error":{"message":"Invalid API key","type":"auth"}}"#,
        )
        .unwrap();
        assert_eq!(envelope.error.unwrap().message, "Invalid API key");
        assert!(envelope.choices.is_empty());
    }
}
