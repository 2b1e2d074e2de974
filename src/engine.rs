//! ステップの実体化と実行エンジン
//!
//! # 責務
//!
//! - ステップ実装ファイルのスタブ検出
//! - 上書き前のバージョンアーカイブ
//! - チャットオラクルによるコード生成（構文チェック付きリトライ）
//! - 実装の動的ロードと呼び出し
//! - LLM ルーターによる分岐
//!
//! # モジュール構成
//!
//! - [`stub`][]: スタブ判定
//! - [`store`][]: 正規ファイルとバージョンアーカイブ
//! - [`synthesizer`][]: コード生成
//! - [`loader`][]: 構文チェックと動的ロード
//! - [`materializer`][]: 実体化と呼び出し
//! - [`router`][]: LLM ルーター
//! - [`executor`][]: ワークフローランタイム
//! - [`context`][] / [`result`][]: 実行記録
//!
//! # 使用例
//!
//! ```rust,no_run
//! use autostep::config::Workflow;
//! use autostep::engine::{RouteOptions, StepArgs, WorkflowRuntime};
//! use autostep::provider::ProviderRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workflow = Workflow::from_file("workflows/non_linear.toml")?;
//!     let runtime = WorkflowRuntime::from_registry(workflow, &ProviderRegistry::with_defaults(), None)?;
//!
//!     let options = RouteOptions::new()
//!         .option("code", "Run code implementation.")
//!         .option("llm_prompt", "Run an LLM-prompt implementation.");
//!
//!     let decision = runtime.route("Classify the step.", &options).await?;
//!     if let Some(key) = decision.key() {
//!         let step = format!("{}_step", key);
//!         let result = runtime.call(&step, &StepArgs::new()).await?;
//!         println!("Result: {}", result);
//!     }
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod executor;
pub mod loader;
pub mod materializer;
pub mod result;
pub mod router;
pub mod store;
pub mod stub;
pub mod synthesizer;

// 公開APIの再エクスポート
pub use context::ExecutionContext;
pub use executor::{WorkflowRuntime, inspect_steps, step_history};
pub use loader::{LuaStepLoader, StepArgs, StepHandle, StepLoader};
pub use materializer::{MaterializedStep, Materializer};
pub use result::{Materialization, RouteRecord, RunSummary, StepInvocation, StepReport};
pub use router::{RouteDecision, RouteOptions, Router, WorkflowContext};
pub use store::{StepStore, VersionRecord};
pub use synthesizer::{CodeSynthesizer, Synthesis, SynthesisRequest};
