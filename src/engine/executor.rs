//! ワークフローランタイム
//!
//! # 責務
//!
//! このモジュールは、ワークフロー定義から各ステップを呼び出し可能にする `WorkflowRuntime` を提供します。
//! 実体化（スタブ検出 → アーカイブ → 生成 → 書き込み）とルーターを1つのオラクルで束ね、
//! 実行記録を [`RunSummary`] にまとめます。
//!
//! # 実行フロー
//!
//! 1. ワークフロー定義を読み込む
//! 2. プロバイダーレジストリからオラクルを解決する
//! 3. ステップを名前で呼び出す（必要なら実装を生成）
//! 4. 必要に応じてルーターで次のステップを選ぶ
//! 5. サマリーを出力する
//!
//! # 使用例
//!
//! ```rust,no_run
//! use autostep::config::Workflow;
//! use autostep::engine::{StepArgs, WorkflowRuntime};
//! use autostep::provider::ProviderRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = Workflow::from_file("workflows/example.toml")?;
//!     let runtime = WorkflowRuntime::from_registry(workflow, &ProviderRegistry::with_defaults(), None)?;
//!
//!     let sum = runtime.call("add_numbers", &StepArgs::new().arg(3).arg(5)).await?;
//!     println!("add_numbers(3, 5) = {}", sum);
//!
//!     println!("{}", runtime.summary().to_json()?);
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::config::Workflow;
use crate::error::{ProviderError, RouteError, StepError};
use crate::provider::{ChatOracle, ProviderRegistry};
use super::loader::{StepArgs, StepLoader};
use super::materializer::{MaterializedStep, Materializer};
use super::result::{RouteRecord, RunSummary, StepReport};
use super::router::{RouteDecision, RouteOptions, Router, WorkflowContext};
use super::store::{StepStore, VersionRecord};
use super::stub::needs_materialization;

/// ワークフローランタイム
pub struct WorkflowRuntime {
    workflow: Workflow,
    oracle: Arc<dyn ChatOracle>,
    materializer: Materializer,
}

impl WorkflowRuntime {
    /// ワークフローとオラクルからランタイムを生成
    ///
    /// ステップディレクトリと試行回数はワークフロー定義の値を使います。
    pub fn new(workflow: Workflow, oracle: Arc<dyn ChatOracle>) -> Self {
        let materializer = Materializer::new(
            workflow.name(),
            workflow.source(),
            StepStore::new(workflow.steps_dir()),
            oracle.clone(),
        )
        .with_max_attempts(workflow.max_attempts());

        Self {
            workflow,
            oracle,
            materializer,
        }
    }

    /// ワークフローの `provider` / `model` でレジストリからオラクルを解決して生成
    ///
    /// # エラー
    ///
    /// - [`ProviderError::UnsupportedProvider`] - 未登録のプロバイダー
    /// - [`ProviderError::MissingCredential`] - API キーが見つからない
    pub fn from_registry(
        workflow: Workflow,
        registry: &ProviderRegistry,
        api_key: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let oracle = registry.resolve(workflow.provider(), api_key, workflow.model())?;
        info!(
            workflow = workflow.name(),
            provider = workflow.provider(),
            model = oracle.model(),
            "ランタイムを生成しました"
        );
        Ok(Self::new(workflow, oracle))
    }

    /// ステップディレクトリを差し替える
    pub fn with_steps_dir(mut self, steps_dir: impl Into<PathBuf>) -> Self {
        self.materializer = self.materializer.with_store(StepStore::new(steps_dir));
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn StepLoader>) -> Self {
        self.materializer = self.materializer.with_loader(loader);
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn store(&self) -> &StepStore {
        self.materializer.store()
    }

    /// 宣言済みのステップを実体化付きで取得
    pub fn step(&self, name: &str) -> Result<MaterializedStep<'_>, StepError> {
        let spec = self
            .workflow
            .step(name)
            .ok_or_else(|| StepError::UnknownStep(name.to_string()))?;
        Ok(self.materializer.materialize(spec))
    }

    /// ステップを名前で呼び出す
    pub async fn call(&self, name: &str, args: &StepArgs) -> Result<Value, StepError> {
        self.step(name)?.call(args).await
    }

    /// このワークフローに紐づいたルーター
    pub fn router(&self) -> Router {
        Router::new(self.workflow.name(), self.oracle.clone())
    }

    /// ルーターで次のステップを選び、判定を記録する
    pub async fn route(
        &self,
        description: &str,
        options: &RouteOptions,
    ) -> Result<RouteDecision, RouteError> {
        let router = self.router();
        let context = WorkflowContext {
            name: self.workflow.name(),
            source: self.workflow.source(),
        };
        let decision = router.route(description, options, context).await?;

        self.materializer.with_context(|ctx| {
            ctx.record_route(RouteRecord {
                router: router.name().to_string(),
                chosen: decision.key().map(str::to_string),
                options: options.len(),
            })
        });
        Ok(decision)
    }

    /// 宣言済みの全ステップの実装状況
    pub fn check(&self) -> Result<Vec<StepReport>, StepError> {
        inspect_steps(&self.workflow, self.materializer.store())
    }

    /// ステップのアーカイブ履歴（バージョン昇順）
    pub fn history(&self, name: &str) -> Result<Vec<VersionRecord>, StepError> {
        step_history(&self.workflow, self.materializer.store(), name)
    }

    pub fn summary(&self) -> RunSummary {
        self.materializer.summary()
    }
}

/// オラクルを使わずに全ステップの実装状況を調べる
pub fn inspect_steps(workflow: &Workflow, store: &StepStore) -> Result<Vec<StepReport>, StepError> {
    workflow
        .steps()
        .iter()
        .map(|spec| -> Result<StepReport, StepError> {
            let path = store.canonical_path(spec.name());
            let stub = needs_materialization(&path).map_err(|source| StepError::Io {
                step: spec.name().to_string(),
                path,
                source,
            })?;
            Ok(StepReport {
                step: spec.name().to_string(),
                signature: spec.signature(),
                implemented: !stub,
                auto_implement: spec.auto_implement(),
                versions: step_history(workflow, store, spec.name())?.len(),
            })
        })
        .collect()
}

/// オラクルを使わずにステップのアーカイブ履歴を取得する
pub fn step_history(
    workflow: &Workflow,
    store: &StepStore,
    name: &str,
) -> Result<Vec<VersionRecord>, StepError> {
    if workflow.step(name).is_none() {
        return Err(StepError::UnknownStep(name.to_string()));
    }
    store.versions(name).map_err(|source| StepError::Io {
        step: name.to_string(),
        path: store.version_dir(),
        source,
    })
}
