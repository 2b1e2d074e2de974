//! ステップの実体化と呼び出し
//!
//! # 責務
//!
//! - 呼び出しのたびに正規ファイルがスタブかどうかを判定する
//! - スタブなら既存ファイルをアーカイブし、コード生成器で実装を作り、正規ファイルを置き換える
//! - 正規ファイルを新しくロードし、呼び出し元の引数をそのまま渡して実行する
//! - 呼び出しごとの記録を [`ExecutionContext`] に残す
//!
//! # 実体化の順序
//!
//! 1. スタブ判定（実装済みなら何もしない）
//! 2. `auto_implement` が無効なら [`StepError::NotImplemented`]（ファイル・オラクルには触れない）
//! 3. 正規ファイルがあればアーカイブ（上書きより必ず先）
//! 4. コード生成（失敗時は正規ファイルを変更しない）
//! 5. 正規ファイルへ書き込み
//!
//! # 並行性
//!
//! 同じステップ名の実体化を同時に複数走らせないのは呼び出し側の責任です。
//! ステップディレクトリはロックしません。正規ファイルは最後の書き込みが勝ちます。

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WorkflowStep;
use crate::error::StepError;
use crate::provider::ChatOracle;
use super::context::ExecutionContext;
use super::loader::{LuaStepLoader, StepArgs, StepLoader};
use super::result::{Materialization, RunSummary, StepInvocation};
use super::store::StepStore;
use super::stub::needs_materialization;
use super::synthesizer::{CodeSynthesizer, SynthesisRequest};

/// ステップの実体化を担当するコンポーネント
pub struct Materializer {
    store: StepStore,
    synthesizer: CodeSynthesizer,
    loader: Arc<dyn StepLoader>,
    enclosing_source: String,
    context: Mutex<ExecutionContext>,
}

impl Materializer {
    /// # 引数
    ///
    /// - `workflow_name`: 記録に使うワークフロー名
    /// - `enclosing_source`: プロンプトに埋め込む親ワークフローのソース
    /// - `store`: 正規ファイルとアーカイブの置き場
    /// - `oracle`: コード生成に使うチャットオラクル
    pub fn new(
        workflow_name: impl Into<String>,
        enclosing_source: impl Into<String>,
        store: StepStore,
        oracle: Arc<dyn ChatOracle>,
    ) -> Self {
        Self {
            store,
            synthesizer: CodeSynthesizer::new(oracle),
            loader: Arc::new(LuaStepLoader::new()),
            enclosing_source: enclosing_source.into(),
            context: Mutex::new(ExecutionContext::new(workflow_name.into())),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.synthesizer = self.synthesizer.with_max_attempts(max_attempts);
        self
    }

    pub fn with_store(mut self, store: StepStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn StepLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn store(&self) -> &StepStore {
        &self.store
    }

    pub fn loader(&self) -> &dyn StepLoader {
        self.loader.as_ref()
    }

    /// ステップ宣言を実体化可能なハンドルで包む
    pub fn materialize<'a>(&'a self, spec: &'a WorkflowStep) -> MaterializedStep<'a> {
        MaterializedStep {
            materializer: self,
            spec,
        }
    }

    /// ルーター判定などを実行記録に追加する
    pub fn with_context<R>(&self, f: impl FnOnce(&mut ExecutionContext) -> R) -> R {
        let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut context)
    }

    pub fn summary(&self) -> RunSummary {
        self.with_context(|context| context.summary())
    }
}

/// 実体化付きのステップ
///
/// 宣言と同じ引数で [`call`](Self::call) を呼べば、必要に応じて実装が生成されてから実行されます。
/// 同じステップ名に対する実体化は、呼び出し側が同時に1つまでに制限してください。
pub struct MaterializedStep<'a> {
    materializer: &'a Materializer,
    spec: &'a WorkflowStep,
}

impl MaterializedStep<'_> {
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// 正規ファイルが存在しない、またはスタブなら `true`
    pub fn is_stub(&self) -> Result<bool, StepError> {
        let path = self.materializer.store.canonical_path(self.name());
        needs_materialization(&path).map_err(|source| self.io_error(&path, source))
    }

    /// 必要なら実装を生成して正規ファイルを置き換える
    ///
    /// 実装済みなら `Ok(None)`、生成した場合はその記録を返します。
    pub async fn ensure_implemented(&self) -> Result<Option<Materialization>, StepError> {
        let mut record = None;
        self.implement(&mut record).await?;
        Ok(record)
    }

    /// 実体化の本体
    ///
    /// アーカイブ後は `record` に途中経過（アーカイブ先・試行回数）を残すため、
    /// 失敗しても消費したオラクル呼び出しが記録から失われません。
    async fn implement(&self, record: &mut Option<Materialization>) -> Result<(), StepError> {
        let step = self.name();
        let store = &self.materializer.store;

        if !self.is_stub()? {
            debug!(step, "実装済みのためそのまま使用します");
            return Ok(());
        }

        if !self.spec.auto_implement() {
            warn!(step, "スタブを検出しましたが auto_implement が無効です");
            return Err(StepError::NotImplemented {
                step: step.to_string(),
            });
        }

        info!(step, "スタブを検出しました。実装を生成します");
        store
            .ensure_dirs()
            .map_err(|source| self.io_error(store.root(), source))?;

        let canonical = store.canonical_path(step);
        let archived = if canonical.is_file() {
            let version = store
                .archive(step)
                .map_err(|source| self.io_error(&store.version_dir(), source))?;
            Some(version)
        } else {
            None
        };
        let materialization = record.insert(Materialization {
            step: step.to_string(),
            archived,
            attempts: 0,
            completed: false,
        });

        let declaration = self.spec.declaration();
        let description = self.spec.description().unwrap_or_default();
        let request = SynthesisRequest {
            step_name: step,
            declaration: &declaration,
            enclosing_source: &self.materializer.enclosing_source,
            description,
        };
        let synthesis = match self
            .materializer
            .synthesizer
            .synthesize(&request, self.materializer.loader())
            .await
        {
            Ok(synthesis) => synthesis,
            Err(e) => {
                materialization.attempts = e.attempts;
                return Err(e.into());
            }
        };
        materialization.attempts = synthesis.attempts;

        let path = store
            .write_implementation(step, &synthesis.code)
            .map_err(|source| self.io_error(&canonical, source))?;
        materialization.completed = true;
        info!(
            step,
            path = %path.display(),
            attempts = synthesis.attempts,
            "実装ファイルを書き込みました"
        );

        Ok(())
    }

    /// 必要なら実体化してから、実装を新しくロードして呼び出す
    ///
    /// 引数はそのまま実装へ渡され、戻り値もそのまま返ります。
    /// 実装内部の実行時エラーは [`StepError::Runtime`] としてそのまま返ります。
    pub async fn call(&self, args: &StepArgs) -> Result<Value, StepError> {
        let step = self.name();
        let start = Instant::now();
        info!(
            step,
            positional = args.positional.len(),
            keyword = args.keyword.len(),
            "ステップを開始します"
        );

        let mut materialization = None;
        let result = match self.implement(&mut materialization).await {
            Ok(()) => self.load_and_invoke(args),
            Err(e) => Err(e),
        };

        let duration = start.elapsed();
        match &result {
            Ok(_) => info!(step, duration_ms = duration.as_millis() as u64, "ステップが完了しました"),
            Err(e) => warn!(step, error = %e, "ステップが失敗しました"),
        }

        self.materializer.with_context(|context| {
            context.record_invocation(StepInvocation {
                step: step.to_string(),
                materialization,
                duration,
                error: result.as_ref().err().map(|e| e.to_string()),
            })
        });

        result
    }

    fn load_and_invoke(&self, args: &StepArgs) -> Result<Value, StepError> {
        let path = self.materializer.store.canonical_path(self.name());
        let handle = self.materializer.loader.load(self.name(), &path)?;
        handle.invoke(args)
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StepError {
        StepError::Io {
            step: self.name().to_string(),
            path: path.to_path_buf(),
            source,
        }
    }
}
