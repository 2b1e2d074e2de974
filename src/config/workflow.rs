//! Workflow 定義の読み込みと管理を行うモジュール
//!
//! # 責務
//!
//! 自己補完型ワークフローを TOML 形式で宣言し、Rust の型として扱うための機能を提供します。
//!
//! ## 主な機能
//!
//! - **TOML パース**: `workflows/` ディレクトリ内の TOML ファイルを読み込み、
//!   [`Workflow`] 構造体に変換
//! - **ステップ宣言**: 各ステップの名前・引数・説明・auto_implement フラグを保持
//! - **オラクル設定**: プロバイダー名、モデル名、コード生成の試行回数
//! - **ソース保持**: 読み込んだ TOML テキストそのものを保持し、
//!   コード生成・ルーティング時に「親ワークフローのソース」として LLM に渡す
//!
//! ## 使用例
//!
//! ```toml
//! [workflow]
//! name = "example-workflow"
//! provider = "openai"
//! model = "gpt-4o"
//!
//! [[steps]]
//! name = "add_numbers"
//! params = ["a", "b"]
//! returns = "table"
//! description = "Add two numbers and return a table with the sum."
//! auto_implement = true
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use super::dto::{WorkflowDto, WorkflowMetadataDto};
use super::step::WorkflowStep;

/// デフォルトのプロバイダー名
pub const DEFAULT_PROVIDER: &str = "openai";

/// コード生成のデフォルト試行回数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// ステップ実装を置くデフォルトのディレクトリ
pub const DEFAULT_STEPS_DIR: &str = "steps";

/// ワークフロー定義（ドメインモデル）
///
/// バリデーション済みの状態を保証します。
///
/// ## DTO との違い
///
/// - [`WorkflowDto`]: TOML デシリアライズ専用、バリデーション前の生データ
/// - [`Workflow`]: バリデーション済み、ドメインロジックを持つ
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    description: Option<String>,
    version: Option<String>,
    provider: String,
    model: Option<String>,
    max_attempts: u32,
    steps_dir: PathBuf,
    steps: Vec<WorkflowStep>,
    source: String,
}

impl Workflow {
    /// TOML ファイルからワークフローを読み込む
    ///
    /// # 処理フロー
    ///
    /// 1. ファイル読み込み
    /// 2. TOML デシリアライズ → [`WorkflowDto`]
    /// 3. バリデーション & 変換 → [`Workflow`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// TOML 文字列からワークフローを読み込む
    ///
    /// 入力文字列は [`Workflow::source`] としてそのまま保持されます。
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: WorkflowDto = toml::from_str(toml)?;
        let mut workflow = Self::try_from(dto)?;
        workflow.source = toml.to_string();
        Ok(workflow)
    }

    /// ワークフローを TOML 文字列に変換
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let dto = WorkflowDto::from(self.clone());
        Ok(toml::to_string(&dto)?)
    }

    /// ワークフローを TOML ファイルに保存
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.to_toml_string()?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// プロバイダー名（小文字化済み）
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// モデル名（未指定ならプロバイダーのデフォルト）
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn steps_dir(&self) -> &Path {
        &self.steps_dir
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// 名前でステップ宣言を検索
    pub fn step(&self, name: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| step.name() == name)
    }

    /// 親ワークフローのソーステキスト
    ///
    /// [`Workflow::from_toml`] / [`Workflow::from_file`] で読み込んだ場合は元の TOML テキスト。
    pub fn source(&self) -> &str {
        &self.source
    }

    /// プロバイダーを上書き（CLI 引数用）
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into().to_lowercase();
        self
    }

    /// モデルを上書き（CLI 引数用）
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// ステップディレクトリを上書き
    pub fn with_steps_dir(mut self, steps_dir: impl Into<PathBuf>) -> Self {
        self.steps_dir = steps_dir.into();
        self
    }
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// # 処理フロー
///
/// 1. 各フィールドのバリデーション
/// 2. ステップの変換（`WorkflowStepDto` → `WorkflowStep`）と名前の重複チェック
/// 3. `Workflow` の構築
impl TryFrom<WorkflowDto> for Workflow {
    type Error = ConfigError;

    fn try_from(dto: WorkflowDto) -> Result<Self, Self::Error> {
        let meta = dto.workflow;

        let name = meta.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "ワークフロー名が空です".to_string(),
            ));
        }

        let max_attempts = meta.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_attempts は 1 以上である必要があります".to_string(),
            ));
        }

        let provider = meta
            .provider
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(dto.steps.len());
        for step_dto in dto.steps {
            let step = WorkflowStep::try_from(step_dto)?;
            if !seen.insert(step.name().to_string()) {
                return Err(ConfigError::Validation(format!(
                    "ステップ名 '{}' が重複しています",
                    step.name()
                )));
            }
            steps.push(step);
        }

        Ok(Self {
            name,
            description: meta.description,
            version: meta.version,
            provider,
            model: meta.model.filter(|m| !m.trim().is_empty()),
            max_attempts,
            steps_dir: meta
                .steps_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STEPS_DIR)),
            steps,
            source: String::new(),
        })
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
impl From<Workflow> for WorkflowDto {
    fn from(workflow: Workflow) -> Self {
        Self {
            workflow: WorkflowMetadataDto {
                name: workflow.name,
                description: workflow.description,
                version: workflow.version,
                provider: Some(workflow.provider),
                model: workflow.model,
                max_attempts: Some(workflow.max_attempts),
                steps_dir: Some(workflow.steps_dir.to_string_lossy().into_owned()),
            },
            steps: workflow.steps.into_iter().map(Into::into).collect(),
        }
    }
}
