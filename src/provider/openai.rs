//! OpenAI Chat Completions クライアント実装
//!
//! # 責務
//!
//! - OpenAI 互換の `/chat/completions` エンドポイントとの HTTP 通信を担当
//! - [`ChatOracle`] トレイトを実装し、統一インターフェースを提供
//! - `choices` の各メッセージを順序通りに [`Message`] へ変換
//!
//! # 認証
//!
//! `Authorization: Bearer <api_key>` ヘッダー。API キーは
//! [`ProviderRegistry`](super::ProviderRegistry) が引数または `OPENAI_API_KEY` から解決します。
//!
//! # レスポンス例
//!
//! ```json
//! {
//!   "model": "gpt-4o",
//!   "choices": [
//!     {"index": 0, "message": {"role": "assistant", "content": "Hello!"}}
//!   ]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use super::error_from_status;
use super::traits::{ChatOracle, Message, Role};

/// デフォルトのエンドポイント
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// デフォルトのモデル
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI Chat Completions クライアント
pub struct OpenAiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiOracle {
    /// 新しいクライアントを生成
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// エンドポイントのベース URL を差し替える（互換 API・テスト用）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, messages: &'a [Message]) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages,
        }
    }

    /// レスポンスボディをパースして応答メッセージ列に変換
    fn parse_response(&self, body: &str) -> Result<Vec<Message>, ProviderError> {
        let response: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        if response.choices.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No choices in response".to_string(),
            ));
        }

        Ok(response
            .choices
            .into_iter()
            .map(|choice| Message {
                role: choice.message.role,
                content: choice.message.content.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl ChatOracle for OpenAiOracle {
    async fn chat(&self, messages: &[Message]) -> Result<Vec<Message>, ProviderError> {
        if messages.is_empty() {
            return Err(ProviderError::NoUserMessage);
        }

        debug!(model = %self.model, messages = messages.len(), "OpenAI にリクエストを送信します");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.build_request(messages))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &body));
        }

        let output = self.parse_response(&body)?;
        debug!(model = %self.model, choices = output.len(), "OpenAI からレスポンスを受信しました");
        Ok(output)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// リクエスト / レスポンス型定義

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
}
