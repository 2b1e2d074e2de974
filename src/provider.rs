//! チャットオラクル（LLM プロバイダー）抽象化レイヤー
//!
//! # 責務
//!
//! - ロール付きメッセージ列を受け取り、ロール付きメッセージ列を返す
//!   [`ChatOracle`] トレイトを統一インターフェースとして提供
//! - プロバイダー名から生成関数と認証情報キーを引く [`ProviderRegistry`]
//! - HTTP ステータスから [`ProviderError`] への分類
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`ChatOracle`]、[`Message`]、[`Role`]）
//! - `openai` - OpenAI 互換 Chat Completions クライアント
//! - `gemini` - Google Gemini generateContent クライアント
//! - `registry` - プロバイダーレジストリ
//!
//! # 使用例
//!
//! ```rust,no_run
//! use autostep::provider::{Message, ProviderRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 環境変数 OPENAI_API_KEY が必要
//!     let registry = ProviderRegistry::with_defaults();
//!     let oracle = registry.resolve("openai", None, Some("gpt-4o"))?;
//!
//!     let response = oracle
//!         .chat(&[Message::user("Explain Rust ownership in one sentence.")])
//!         .await?;
//!
//!     for message in response {
//!         println!("{}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod gemini;
pub mod openai;
pub mod registry;
pub mod traits;

// 公開APIの再エクスポート
pub use registry::{OracleConstructor, OracleOptions, ProviderRegistry, ProviderRegistryBuilder};
pub use traits::{ChatOracle, Message, Role, join_contents};

use crate::error::ProviderError;

/// 失敗した HTTP レスポンスをエラーに分類する
///
/// - 401 / 403 → [`ProviderError::AuthenticationError`]
/// - 429 → [`ProviderError::RateLimitExceeded`]
/// - 408 / 504 → [`ProviderError::Timeout`]
/// - それ以外 → [`ProviderError::ApiError`]
pub(crate) fn error_from_status(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationError(body.to_string()),
        429 => ProviderError::RateLimitExceeded,
        408 | 504 => ProviderError::Timeout(body.to_string()),
        _ => ProviderError::ApiError {
            status,
            body: body.to_string(),
        },
    }
}
