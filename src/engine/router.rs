//! LLM によるルーター
//!
//! 説明文・親ワークフローのソース・選択肢（キーと説明）をオラクルに渡し、
//! 次に進むべき選択肢のキーを1つ選ばせます。
//!
//! 応答は全メッセージを連結して前後の空白を除き、選択肢を**宣言順に**走査して
//! 最初に部分文字列として現れたキーを採用します。どれも現れなければ
//! [`RouteDecision::NoMatch`] です。キーが互いの部分文字列になっている場合は
//! 先に宣言したほうが優先されます。

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::RouteError;
use crate::provider::{ChatOracle, Message, ProviderRegistry, join_contents};

const SYSTEM_PROMPT: &str = "You are a perfect workflow router. \
Given the workflow and context, your task is to select the most appropriate next step / action.";

/// ルーターの選択肢（宣言順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    entries: Vec<(String, String)>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 選択肢を末尾に追加
    pub fn option(mut self, key: impl Into<String>, description: impl Into<String>) -> Self {
        self.entries.push((key.into(), description.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// キーを宣言順に返す
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, description)| (key.as_str(), description.as_str()))
    }

    /// 空の選択肢・重複したキーを拒否する
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.entries.is_empty() {
            return Err(RouteError::EmptyOptions);
        }
        for (index, key) in self.keys().enumerate() {
            if self.keys().take(index).any(|previous| previous == key) {
                return Err(RouteError::DuplicateOption(key.to_string()));
            }
        }
        Ok(())
    }
}

impl<K, D> FromIterator<(K, D)> for RouteOptions
where
    K: Into<String>,
    D: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, D)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, description)| (key.into(), description.into()))
                .collect(),
        }
    }
}

/// ルーターの判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// 選ばれた選択肢のキー
    Chosen(String),
    /// どの選択肢も応答に現れなかった
    NoMatch,
}

impl RouteDecision {
    pub fn key(&self) -> Option<&str> {
        match self {
            RouteDecision::Chosen(key) => Some(key),
            RouteDecision::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, RouteDecision::Chosen(_))
    }
}

/// ルーターに渡す親ワークフローの情報
#[derive(Debug, Clone, Copy)]
pub struct WorkflowContext<'a> {
    pub name: &'a str,
    pub source: &'a str,
}

/// LLM ルーター
pub struct Router {
    name: String,
    oracle: Arc<dyn ChatOracle>,
}

impl Router {
    pub fn new(name: impl Into<String>, oracle: Arc<dyn ChatOracle>) -> Self {
        Self {
            name: name.into(),
            oracle,
        }
    }

    /// レジストリからオラクルを解決して生成
    pub fn from_registry(
        name: impl Into<String>,
        registry: &ProviderRegistry,
        provider: &str,
        model: Option<&str>,
    ) -> Result<Self, RouteError> {
        let oracle = registry.resolve(provider, None, model)?;
        Ok(Self::new(name, oracle))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 次に進む選択肢を1つ選ぶ
    ///
    /// オラクルは1回だけ呼び出されます。
    pub async fn route(
        &self,
        description: &str,
        options: &RouteOptions,
        context: WorkflowContext<'_>,
    ) -> Result<RouteDecision, RouteError> {
        options.validate()?;

        info!(
            router = %self.name,
            workflow = context.name,
            options = options.len(),
            "次のステップを選択します: {}",
            description
        );

        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_router_prompt(description, context.source, options)),
        ];
        let response = self.oracle.chat(&messages).await?;
        debug!(router = %self.name, response = %join_contents(&response, ""), "ルーターの応答");

        let decision = parse_router_response(&response, options);
        info!(router = %self.name, chosen = ?decision.key(), "選択結果");
        Ok(decision)
    }
}

/// ルーターのユーザープロンプト
pub fn build_router_prompt(description: &str, workflow_source: &str, options: &RouteOptions) -> String {
    let options_list = options
        .iter()
        .map(|(key, description)| format!("- {}: {}", key, description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Router Description: {description}

Parent Workflow Code:
{workflow_source}

Possible next steps:
{options_list}

Return only the single best step key from the above options.
"
    )
}

/// 応答から選択肢のキーを探す
pub fn parse_router_response(messages: &[Message], options: &RouteOptions) -> RouteDecision {
    let combined = join_contents(messages, "");
    let combined = combined.trim();

    options
        .keys()
        .find(|key| combined.contains(key))
        .map(|key| RouteDecision::Chosen(key.to_string()))
        .unwrap_or(RouteDecision::NoMatch)
}
