//! autostep コマンドラインツール
//!
//! ```text
//! autostep run     -w workflows/example.toml add_numbers --args '[3, 5]'
//! autostep route   -w workflows/non_linear.toml "Classify the step." -o code="Run code." -o workflow="Run a sub-workflow."
//! autostep history -w workflows/example.toml add_numbers
//! autostep check   -w workflows/example.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing::{error, info};

use autostep::config::Workflow;
use autostep::engine::{RouteOptions, StepArgs, StepStore, WorkflowRuntime, inspect_steps, step_history};
use autostep::logging::{self, LogConfig};
use autostep::provider::ProviderRegistry;

#[derive(Parser, Debug)]
#[command(name = "autostep", version, about = "自己補完型ワークフローのランタイム")]
struct Cli {
    /// ワークフロー定義ファイル（TOML）
    #[arg(short, long, global = true, default_value = "workflows/example.toml")]
    workflow: PathBuf,

    /// ステップディレクトリ（ワークフロー定義の steps_dir を上書き）
    #[arg(long, global = true)]
    steps_dir: Option<PathBuf>,

    /// ログの出力先ディレクトリ
    #[arg(long, global = true, default_value = logging::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// ログレベル（RUST_LOG が優先）
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// ログファイルを JSON 形式で出力
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// ステップを呼び出す（未実装なら自動生成）
    Run {
        /// ステップ名
        step: String,

        /// 位置引数（JSON 配列）
        #[arg(long, default_value = "[]")]
        args: String,

        /// キーワード引数（JSON オブジェクト）
        #[arg(long)]
        kwargs: Option<String>,

        #[command(flatten)]
        oracle: OracleArgs,
    },

    /// ルーターに次のステップを選ばせる
    Route {
        /// ルーターへの説明
        description: String,

        /// 選択肢（`key=description`、複数指定可、指定順に評価）
        #[arg(short, long = "option", value_parser = parse_option, required = true)]
        options: Vec<(String, String)>,

        #[command(flatten)]
        oracle: OracleArgs,
    },

    /// ステップのアーカイブ履歴を表示
    History {
        /// ステップ名
        step: String,
    },

    /// 宣言済みステップの実装状況を表示
    Check,
}

#[derive(clap::Args, Debug)]
struct OracleArgs {
    /// プロバイダー（ワークフロー定義を上書き）
    #[arg(long)]
    provider: Option<String>,

    /// モデル（ワークフロー定義を上書き）
    #[arg(long)]
    model: Option<String>,

    /// API キー（未指定なら環境変数）
    #[arg(long)]
    api_key: Option<String>,
}

fn parse_option(value: &str) -> Result<(String, String), String> {
    let (key, description) = value
        .split_once('=')
        .ok_or_else(|| format!("'{}' は key=description 形式ではありません", value))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("'{}' のキーが空です", value));
    }
    Ok((key.to_string(), description.trim().to_string()))
}

fn parse_args(args: &str, kwargs: Option<&str>) -> Result<StepArgs, String> {
    let positional: Vec<Value> = serde_json::from_str(args)
        .map_err(|e| format!("--args は JSON 配列で指定してください: {}", e))?;
    let keyword: Map<String, Value> = match kwargs {
        Some(kwargs) => serde_json::from_str(kwargs)
            .map_err(|e| format!("--kwargs は JSON オブジェクトで指定してください: {}", e))?,
        None => Map::new(),
    };
    Ok(StepArgs { positional, keyword })
}

type BoxError = Box<dyn std::error::Error>;

fn load_workflow(cli: &Cli, oracle: Option<&OracleArgs>) -> Result<Workflow, BoxError> {
    let mut workflow = Workflow::from_file(&cli.workflow)?;
    if let Some(steps_dir) = &cli.steps_dir {
        workflow = workflow.with_steps_dir(steps_dir);
    }
    if let Some(oracle) = oracle {
        if let Some(provider) = &oracle.provider {
            workflow = workflow.with_provider(provider);
        }
        if let Some(model) = &oracle.model {
            workflow = workflow.with_model(model);
        }
    }
    Ok(workflow)
}

fn runtime(cli: &Cli, oracle: &OracleArgs) -> Result<WorkflowRuntime, BoxError> {
    let workflow = load_workflow(cli, Some(oracle))?;
    let registry = ProviderRegistry::with_defaults();
    Ok(WorkflowRuntime::from_registry(
        workflow,
        &registry,
        oracle.api_key.as_deref(),
    )?)
}

async fn execute(cli: &Cli) -> Result<Value, BoxError> {
    match &cli.command {
        Commands::Run {
            step,
            args,
            kwargs,
            oracle,
        } => {
            let args = parse_args(args, kwargs.as_deref())?;
            let runtime = runtime(cli, oracle)?;
            let result = runtime.call(step, &args).await;
            let summary = runtime.summary();
            info!(summary = %summary.to_json()?, "実行サマリー");
            Ok(json!({ "step": step, "result": result?, "summary": summary }))
        }
        Commands::Route {
            description,
            options,
            oracle,
        } => {
            let options: RouteOptions = options.iter().cloned().collect();
            let runtime = runtime(cli, oracle)?;
            let decision = runtime.route(description, &options).await?;
            Ok(json!({ "router": runtime.workflow().name(), "chosen": decision.key() }))
        }
        Commands::History { step } => {
            let workflow = load_workflow(cli, None)?;
            let store = StepStore::new(workflow.steps_dir());
            let versions = step_history(&workflow, &store, step)?;
            Ok(serde_json::to_value(versions)?)
        }
        Commands::Check => {
            let workflow = load_workflow(cli, None)?;
            let store = StepStore::new(workflow.steps_dir());
            Ok(serde_json::to_value(inspect_steps(&workflow, &store)?)?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env は任意
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig {
        dir: cli.log_dir.clone(),
        level: cli.log_level.clone(),
        json: cli.json_logs,
        ..LogConfig::default()
    };
    let guard = match logging::init(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ロギングの初期化に失敗しました: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(log_file = %guard.path().display(), workflow = %cli.workflow.display(), "autostep を開始します");

    let code = match execute(&cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "出力の整形に失敗しました");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(error = %e, "実行に失敗しました");
            eprintln!("エラー: {}", e);
            ExitCode::FAILURE
        }
    };

    guard.flush();
    code
}
