//! ワークフロー定義（設定レイヤー）
//!
//! # モジュール構成
//!
//! - `dto` - TOML デシリアライズ用の DTO（内部専用）
//! - [`step`] - ステップ宣言 [`WorkflowStep`]
//! - [`workflow`] - ワークフロー定義 [`Workflow`]

mod dto;
pub mod step;
pub mod workflow;

pub use step::WorkflowStep;
pub use workflow::Workflow;
