//! 実行記録の型定義
//!
//! # 主要な型
//!
//! - [`Materialization`][]: スタブを実装で置き換えた1回分の記録（アーカイブ先・試行回数）
//! - [`StepInvocation`][]: ステップ呼び出し1回分の記録
//! - [`RouteRecord`][]: ルーターの判定1回分の記録
//! - [`RunSummary`][]: ワークフロー実行全体のサマリー（JSON 出力用）
//!
//! # 使用例
//!
//! ```rust,no_run
//! use autostep::engine::result::RunSummary;
//!
//! fn report(summary: RunSummary) {
//!     println!("呼び出し回数: {}", summary.invocations.len());
//!     println!("実体化したステップ数: {}", summary.materialized_steps());
//!     if let Ok(json) = summary.to_json() {
//!         println!("{}", json);
//!     }
//! }
//! ```

use std::time::Duration;

use serde::Serialize;

use super::store::VersionRecord;

/// スタブを実装で置き換えた記録
///
/// コード生成に失敗した場合も、それまでに行ったアーカイブと試行回数は残ります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Materialization {
    /// ステップ名
    pub step: String,
    /// 置き換え前のファイルを退避したアーカイブ（正規ファイルが無かった場合は `None`）
    pub archived: Option<VersionRecord>,
    /// コード生成の試行回数（オラクル呼び出し回数）
    pub attempts: u32,
    /// 正規ファイルを書き換えたか
    pub completed: bool,
}

/// ステップ呼び出しの記録
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInvocation {
    /// ステップ名
    pub step: String,

    /// この呼び出しで実体化が行われた場合の記録
    pub materialization: Option<Materialization>,

    /// 呼び出し全体（実体化を含む）の所要時間
    pub duration: Duration,

    /// 失敗した場合のエラーメッセージ
    pub error: Option<String>,
}

impl StepInvocation {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// この呼び出しで消費したオラクル呼び出し回数
    pub fn oracle_calls(&self) -> u32 {
        self.materialization.as_ref().map_or(0, |m| m.attempts)
    }
}

/// ステップの実装状況（`check` の出力）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// ステップ名
    pub step: String,
    /// シグネチャ（`name(a, b) -> table`）
    pub signature: String,
    /// 正規ファイルが実装済みか
    pub implemented: bool,
    /// 自動実装が有効か
    pub auto_implement: bool,
    /// アーカイブ済みのバージョン数
    pub versions: usize,
}

/// ルーター判定の記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    /// ルーター名
    pub router: String,
    /// 選ばれた選択肢のキー（一致なしなら `None`）
    pub chosen: Option<String>,
    /// 提示した選択肢の数
    pub options: usize,
}

/// ワークフロー実行のサマリー
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// ワークフロー名
    pub workflow_name: String,

    /// ステップ呼び出しの記録（実行順）
    pub invocations: Vec<StepInvocation>,

    /// ルーター判定の記録（実行順）
    pub routes: Vec<RouteRecord>,

    /// オラクル呼び出しの総数（コード生成 + ルーター）
    pub total_oracle_calls: u32,

    /// 呼び出し時間の合計
    pub total_duration: Duration,
}

impl RunSummary {
    /// 結果を JSON 形式でシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// すべての呼び出しが成功したか
    pub fn is_success(&self) -> bool {
        self.invocations.iter().all(StepInvocation::is_success)
    }

    /// 実体化が完了した呼び出しの数
    pub fn materialized_steps(&self) -> usize {
        self.invocations
            .iter()
            .filter(|invocation| {
                invocation
                    .materialization
                    .as_ref()
                    .is_some_and(|m| m.completed)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn materialized(step: &str, attempts: u32) -> StepInvocation {
        StepInvocation {
            step: step.to_string(),
            materialization: Some(Materialization {
                step: step.to_string(),
                archived: Some(VersionRecord {
                    step: step.to_string(),
                    version: 1,
                    path: PathBuf::from(format!("steps/ver/{}_v1.lua", step)),
                }),
                attempts,
                completed: true,
            }),
            duration: Duration::from_millis(20),
            error: None,
        }
    }

    fn plain(step: &str) -> StepInvocation {
        StepInvocation {
            step: step.to_string(),
            materialization: None,
            duration: Duration::from_millis(1),
            error: None,
        }
    }

    #[test]
    fn test_invocation_oracle_calls() {
        assert_eq!(materialized("add", 2).oracle_calls(), 2);
        assert_eq!(plain("add").oracle_calls(), 0);
    }

    #[test]
    fn test_summary_counts() {
        let mut failed = plain("broken");
        failed.error = Some("boom".to_string());

        let summary = RunSummary {
            workflow_name: "math".to_string(),
            invocations: vec![materialized("add", 1), plain("add"), failed],
            routes: vec![],
            total_oracle_calls: 1,
            total_duration: Duration::from_millis(22),
        };

        assert_eq!(summary.materialized_steps(), 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_incomplete_materialization_counts_calls_only() {
        let mut exhausted = materialized("add", 3);
        if let Some(m) = exhausted.materialization.as_mut() {
            m.completed = false;
        }
        exhausted.error = Some("no code".to_string());
        assert_eq!(exhausted.oracle_calls(), 3);

        let summary = RunSummary {
            workflow_name: "math".to_string(),
            invocations: vec![exhausted],
            routes: vec![],
            total_oracle_calls: 3,
            total_duration: Duration::from_millis(20),
        };
        assert_eq!(summary.materialized_steps(), 0);
    }

    #[test]
    fn test_summary_to_json() {
        let summary = RunSummary {
            workflow_name: "math".to_string(),
            invocations: vec![materialized("add", 1)],
            routes: vec![RouteRecord {
                router: "math".to_string(),
                chosen: Some("add".to_string()),
                options: 2,
            }],
            total_oracle_calls: 2,
            total_duration: Duration::from_millis(20),
        };

        let json = summary.to_json().expect("JSON変換に失敗");
        assert!(json.contains("\"workflow_name\": \"math\""));
        assert!(json.contains("add_v1.lua"));
        assert!(json.contains("\"chosen\": \"add\""));
    }
}
