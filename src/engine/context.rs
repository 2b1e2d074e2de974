//! ワークフロー実行コンテキストの管理
//!
//! # 責務
//!
//! - ステップ呼び出しとルーター判定の履歴を実行順に保持
//! - テレメトリー情報（オラクル呼び出し回数、実行時間）の累積
//! - [`RunSummary`] の生成
//!
//! # 使用例
//!
//! ```rust
//! use autostep::engine::context::ExecutionContext;
//! use autostep::engine::result::StepInvocation;
//! use std::time::Duration;
//!
//! let mut ctx = ExecutionContext::new("math".to_string());
//! ctx.record_invocation(StepInvocation {
//!     step: "add_numbers".to_string(),
//!     materialization: None,
//!     duration: Duration::from_millis(3),
//!     error: None,
//! });
//!
//! assert_eq!(ctx.total_oracle_calls(), 0);
//! assert_eq!(ctx.summary().invocations.len(), 1);
//! ```

use std::time::Duration;

use super::result::{RouteRecord, RunSummary, StepInvocation};

/// ワークフロー実行コンテキスト
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    workflow_name: String,

    invocations: Vec<StepInvocation>,
    routes: Vec<RouteRecord>,
}

impl ExecutionContext {
    pub fn new(workflow_name: String) -> Self {
        Self {
            workflow_name,
            invocations: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// ステップ呼び出しを記録
    pub fn record_invocation(&mut self, invocation: StepInvocation) {
        self.invocations.push(invocation);
    }

    /// ルーター判定を記録
    pub fn record_route(&mut self, route: RouteRecord) {
        self.routes.push(route);
    }

    pub fn invocations(&self) -> &[StepInvocation] {
        &self.invocations
    }

    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// 指定したステップの最後の呼び出し
    pub fn last_invocation(&self, step: &str) -> Option<&StepInvocation> {
        self.invocations.iter().rev().find(|i| i.step == step)
    }

    /// オラクル呼び出しの総数
    ///
    /// コード生成の試行回数と、ルーター判定1回につき1回の合計です。
    pub fn total_oracle_calls(&self) -> u32 {
        let synthesis: u32 = self.invocations.iter().map(StepInvocation::oracle_calls).sum();
        synthesis + self.routes.len() as u32
    }

    /// 呼び出し時間の合計
    pub fn total_duration(&self) -> Duration {
        self.invocations.iter().map(|i| i.duration).sum()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            workflow_name: self.workflow_name.clone(),
            invocations: self.invocations.clone(),
            routes: self.routes.clone(),
            total_oracle_calls: self.total_oracle_calls(),
            total_duration: self.total_duration(),
        }
    }
}
