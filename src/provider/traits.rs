//! チャットオラクルの共通インターフェース定義
//!
//! # 責務
//!
//! - チャットオラクルの共通トレイト [`ChatOracle`] を定義
//! - プロバイダー非依存のメッセージ型 [`Message`] とロール [`Role`] を提供
//!
//! 入力も出力も「ロール付きテキストメッセージの順序付き列」です。
//! ストリーミングや部分結果はありません。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// チャットオラクルの共通インターフェース
///
/// # 実装要件
///
/// - `Send + Sync`: マルチスレッド環境で安全に使用可能
/// - 呼び出しごとにステートレス（認証情報は生成時に解決済み）
/// - 必須ロールのメッセージが無い場合は空の呼び出しをせず
///   [`ProviderError::NoUserMessage`] を返す
#[async_trait]
pub trait ChatOracle: Send + Sync {
    /// メッセージ列を送信し、応答メッセージ列を受け取る
    ///
    /// # エラー
    ///
    /// - [`ProviderError::NoUserMessage`] - 入力が空、または必須のユーザーメッセージが無い
    /// - [`ProviderError::AuthenticationError`] - 認証失敗
    /// - [`ProviderError::RateLimitExceeded`] - レート制限超過
    /// - [`ProviderError::InvalidResponse`] - 不正なレスポンス
    async fn chat(&self, messages: &[Message]) -> Result<Vec<Message>, ProviderError>;

    /// 使用するモデル名（ログ用）
    fn model(&self) -> &str;
}

/// メッセージのロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// システム指示
    System,
    /// ユーザー入力
    User,
    /// アシスタント応答
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ロール付きメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// 全メッセージの内容を区切り文字で連結する
pub fn join_contents(messages: &[Message], separator: &str) -> String {
    messages
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
