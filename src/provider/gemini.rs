//! Google Gemini クライアント実装
//!
//! # 責務
//!
//! - Gemini の `models/{model}:generateContent` エンドポイントとの HTTP 通信を担当
//! - [`ChatOracle`] トレイトを実装し、統一インターフェースを提供
//! - ロールの変換: `system` → `systemInstruction`、`user` → `user`、`assistant` → `model`
//!
//! 少なくとも1つのユーザーメッセージが必要です。無い場合は API を呼ばずに
//! [`ProviderError::NoUserMessage`] を返します。
//!
//! # 認証
//!
//! `x-goog-api-key` ヘッダー。API キーは引数または `GOOGLE_API_KEY` から解決します。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use super::error_from_status;
use super::traits::{ChatOracle, Message, Role};

/// デフォルトのエンドポイント
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// デフォルトのモデル
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Google Gemini クライアント
pub struct GeminiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// メッセージ列を generateContent リクエストに変換
    ///
    /// システムメッセージは連結して `systemInstruction` にまとめます。
    fn build_request(&self, messages: &[Message]) -> Result<GenerateContentRequest, ProviderError> {
        if !messages.iter().any(|m| m.role == Role::User) {
            return Err(ProviderError::NoUserMessage);
        }

        let system_text = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(if m.role == Role::User { "user" } else { "model" }.to_string()),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        Ok(GenerateContentRequest {
            system_instruction: (!system_text.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system_text),
                }],
            }),
            contents,
        })
    }

    /// 先頭候補のテキストパートを連結し、1つのアシスタントメッセージにする
    fn parse_response(&self, body: &str) -> Result<Vec<Message>, ProviderError> {
        let response: GenerateContentResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No content in response".to_string(),
            ));
        }

        Ok(vec![Message::assistant(text)])
    }
}

#[async_trait]
impl ChatOracle for GeminiOracle {
    async fn chat(&self, messages: &[Message]) -> Result<Vec<Message>, ProviderError> {
        let request = self.build_request(messages)?;

        debug!(model = %self.model, messages = messages.len(), "Gemini にリクエストを送信します");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &body));
        }

        let output = self.parse_response(&body)?;
        debug!(model = %self.model, "Gemini からレスポンスを受信しました");
        Ok(output)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// リクエスト / レスポンス型定義

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> GeminiOracle {
        GeminiOracle::new("key", DEFAULT_MODEL)
    }

    #[test]
    fn test_endpoint_includes_model() {
        assert_eq!(
            oracle().endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }

    #[test]
    fn test_build_request_requires_user_message() {
        let result = oracle().build_request(&[Message::system("only system")]);
        assert!(matches!(result, Err(ProviderError::NoUserMessage)));
    }

    #[test]
    fn test_build_request_maps_roles() {
        let messages = vec![
            Message::system("rules"),
            Message::user("question"),
            Message::assistant("answer"),
            Message::user("follow-up"),
        ];
        let request = oracle().build_request(&messages).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "rules");
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "follow-up");
    }

    #[test]
    fn test_build_request_without_system() {
        let request = oracle().build_request(&[Message::user("hi")]).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_response_concatenates_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello, "},{"text":"world"}]}}]}"#;
        let messages = oracle().parse_response(body).unwrap();
        assert_eq!(messages, vec![Message::assistant("Hello, world")]);
    }

    #[test]
    fn test_parse_response_no_candidates() {
        let result = oracle().parse_response(r#"{"candidates":[]}"#);
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_empty_text() {
        let body = r#"{"candidates":[{"content":{"parts":[]}}]}"#;
        let result = oracle().parse_response(body);
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
