//! プロバイダーレジストリ
//!
//! # 責務
//!
//! - プロバイダー名（大文字小文字を区別しない）から、オラクルの生成関数・
//!   認証情報キー（環境変数名）・デフォルトモデルを引く
//! - 認証情報の解決順序: 明示的な引数 → 環境変数（キーはプロバイダーごと）
//!
//! レジストリは [`ProviderRegistryBuilder`] で一度だけ構築し、以後は変更できません。
//!
//! # デフォルト登録
//!
//! | キー               | 認証情報キー       | デフォルトモデル        |
//! |--------------------|--------------------|-------------------------|
//! | `openai`           | `OPENAI_API_KEY`   | `gpt-4o`                |
//! | `google`, `gemini` | `GOOGLE_API_KEY`   | `gemini-2.0-flash-exp`  |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ProviderError;
use super::gemini::{self, GeminiOracle};
use super::openai::{self, OpenAiOracle};
use super::traits::ChatOracle;

/// オラクル生成時に渡す解決済みパラメータ
#[derive(Debug, Clone)]
pub struct OracleOptions {
    pub api_key: String,
    pub model: String,
}

/// オラクルの生成関数
pub type OracleConstructor = fn(OracleOptions) -> Arc<dyn ChatOracle>;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Clone)]
struct ProviderEntry {
    constructor: OracleConstructor,
    credential_key: String,
    default_model: String,
}

/// プロバイダーレジストリ（構築後は不変）
#[derive(Clone)]
pub struct ProviderRegistry {
    entries: HashMap<String, ProviderEntry>,
    env_lookup: EnvLookup,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// OpenAI と Gemini を登録したレジストリ
    pub fn with_defaults() -> Self {
        Self::builder().with_default_providers().build()
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.entries.contains_key(&provider.to_lowercase())
    }

    /// 登録済みのプロバイダー名（ソート済み）
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// プロバイダーの認証情報キー
    pub fn credential_key(&self, provider: &str) -> Option<&str> {
        self.entries
            .get(&provider.to_lowercase())
            .map(|entry| entry.credential_key.as_str())
    }

    /// プロバイダーのデフォルトモデル
    pub fn default_model(&self, provider: &str) -> Option<&str> {
        self.entries
            .get(&provider.to_lowercase())
            .map(|entry| entry.default_model.as_str())
    }

    /// プロバイダー名からオラクルを生成する
    ///
    /// # 引数
    ///
    /// - `provider`: プロバイダー名（大文字小文字を区別しない）
    /// - `api_key`: 明示的な API キー。`None` または空文字なら環境変数から解決
    /// - `model`: モデル名。`None` ならプロバイダーのデフォルト
    ///
    /// # エラー
    ///
    /// - [`ProviderError::UnsupportedProvider`] - 未登録のプロバイダー
    /// - [`ProviderError::MissingCredential`] - API キーが見つからない
    pub fn resolve(
        &self,
        provider: &str,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Result<Arc<dyn ChatOracle>, ProviderError> {
        let key = provider.to_lowercase();
        let entry = self
            .entries
            .get(&key)
            .ok_or_else(|| ProviderError::UnsupportedProvider(provider.to_string()))?;

        let api_key = api_key
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| (self.env_lookup)(&entry.credential_key).filter(|k| !k.is_empty()))
            .ok_or_else(|| ProviderError::MissingCredential {
                provider: key.clone(),
                credential_key: entry.credential_key.clone(),
            })?;

        let model = model
            .filter(|m| !m.is_empty())
            .unwrap_or(entry.default_model.as_str())
            .to_string();

        debug!(provider = %key, model = %model, "オラクルを生成します");
        Ok((entry.constructor)(OracleOptions { api_key, model }))
    }
}

/// [`ProviderRegistry`] のビルダー
pub struct ProviderRegistryBuilder {
    entries: HashMap<String, ProviderEntry>,
    env_lookup: EnvLookup,
}

impl ProviderRegistryBuilder {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            env_lookup: Arc::new(|key: &str| std::env::var(key).ok()),
        }
    }

    /// プロバイダーを登録（同名の登録は上書き）
    pub fn register(
        mut self,
        name: &str,
        constructor: OracleConstructor,
        credential_key: &str,
        default_model: &str,
    ) -> Self {
        self.entries.insert(
            name.to_lowercase(),
            ProviderEntry {
                constructor,
                credential_key: credential_key.to_string(),
                default_model: default_model.to_string(),
            },
        );
        self
    }

    pub fn with_default_providers(self) -> Self {
        self.register("openai", openai_constructor, "OPENAI_API_KEY", openai::DEFAULT_MODEL)
            .register("google", gemini_constructor, "GOOGLE_API_KEY", gemini::DEFAULT_MODEL)
            .register("gemini", gemini_constructor, "GOOGLE_API_KEY", gemini::DEFAULT_MODEL)
    }

    /// 環境変数の参照方法を差し替える（テスト用）
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Arc::new(lookup);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            entries: self.entries,
            env_lookup: self.env_lookup,
        }
    }
}

fn openai_constructor(options: OracleOptions) -> Arc<dyn ChatOracle> {
    Arc::new(OpenAiOracle::new(options.api_key, options.model))
}

fn gemini_constructor(options: OracleOptions) -> Arc<dyn ChatOracle> {
    Arc::new(GeminiOracle::new(options.api_key, options.model))
}
