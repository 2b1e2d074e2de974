//! TOML デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、TOML ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 変換フロー
//!
//! ```text
//! TOML ファイル
//!   ↓ (デシリアライズ)
//! WorkflowDto
//!   ↓ (TryFrom でバリデーション)
//! Workflow (ドメインモデル)
//! ```

use serde::{Deserialize, Serialize};

/// ワークフロー DTO
///
/// TOML の `[workflow]` セクションと `[[steps]]` 配列をデシリアライズ/シリアライズします。
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowDto {
    pub(super) workflow: WorkflowMetadataDto,
    #[serde(default)]
    pub(super) steps: Vec<WorkflowStepDto>,
}

/// ワークフローメタデータ DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowMetadataDto {
    pub(super) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) steps_dir: Option<String>,
}

/// ワークフローステップ DTO
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WorkflowStepDto {
    pub(super) name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(super) params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) returns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<String>,
    #[serde(default)]
    pub(super) auto_implement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(super) declaration: Option<String>,
}
