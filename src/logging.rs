//! ロギングの初期化
//!
//! `tracing-subscriber` を初期化し、ログを `logs/process_<unix-ts>.log` に書き出します。
//! 書き込みは `tracing-appender` のノンブロッキングライター経由で行われ、
//! 返される [`LogGuard`] を破棄した時点でバッファがフラッシュされます。
//!
//! フィルターは `RUST_LOG` が設定されていればそれを、無ければ [`LogConfig::level`] を使います。

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::LoggingError;

/// デフォルトのログディレクトリ
pub const DEFAULT_LOG_DIR: &str = "logs";

/// ロギング設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログファイルの出力先ディレクトリ
    pub dir: PathBuf,
    /// `RUST_LOG` が無い場合のフィルター（例: `info`, `autostep=debug`）
    pub level: String,
    /// ファイルへの出力を JSON 形式にする
    pub json: bool,
    /// 標準エラー出力にも書き出す
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            level: "info".to_string(),
            json: false,
            stderr: true,
        }
    }
}

/// ロガーのハンドル
///
/// 破棄するとノンブロッキングライターのバッファがフラッシュされます。
/// プロセス終了まで保持してください。
#[must_use = "破棄するとログがフラッシュされ、以降のファイル出力が失われます"]
pub struct LogGuard {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl LogGuard {
    /// 出力先のログファイル
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 明示的にフラッシュして終了する
    pub fn flush(self) {
        drop(self);
    }
}

/// `process_<unix-ts>.log`
pub fn log_file_name(timestamp: u64) -> String {
    format!("process_{}.log", timestamp)
}

/// グローバルサブスクライバーを初期化する
///
/// 2回目以降の呼び出しは [`LoggingError::Init`] を返します。
pub fn init(config: &LogConfig) -> Result<LogGuard, LoggingError> {
    std::fs::create_dir_all(&config.dir)?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let file_name = log_file_name(timestamp);
    let path = config.dir.join(&file_name);

    let appender = tracing_appender::rolling::never(&config.dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer.clone())
            .with_target(true)
            .with_filter(filter())
    });
    let text_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer.clone())
            .with_target(true)
            .with_ansi(false)
            .with_filter(filter())
    });
    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LogGuard {
        path,
        _guard: guard,
    })
}
