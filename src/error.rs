//! エラー型の定義
//!
//! このモジュールは、autostep 全体で使用されるエラー型を定義します。
//!
//! # エラー種別
//!
//! - [`ConfigError`] - ワークフロー定義の読み込み・検証エラー
//! - [`ProviderError`] - チャットオラクルの生成・通信エラー
//! - [`StepError`] - ステップの実体化・読み込み・実行エラー
//! - [`SynthesisError`] - コード生成の失敗（試行回数付き）
//! - [`RouteError`] - ルーターのエラー
//! - [`LoggingError`] - ロギング初期化のエラー

use std::path::PathBuf;

use thiserror::Error;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// TOML のシリアライズに失敗
    #[error("TOML のシリアライズに失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// チャットオラクル（LLM プロバイダー）関連のエラー
#[derive(Debug, Error)]
pub enum ProviderError {
    /// レジストリに登録されていないプロバイダー
    #[error("未対応のプロバイダーです: {0}")]
    UnsupportedProvider(String),

    /// 認証情報が引数にも環境変数にも見つからない
    #[error("プロバイダー '{provider}' の API キーがありません（引数または環境変数 {credential_key} を設定してください）")]
    MissingCredential {
        /// プロバイダー名
        provider: String,
        /// 参照した環境変数名
        credential_key: String,
    },

    /// 必須のユーザーメッセージがない
    #[error("入力がありません: ユーザーメッセージが含まれていません")]
    NoUserMessage,

    /// 認証失敗
    #[error("認証に失敗しました: {0}")]
    AuthenticationError(String),

    /// レート制限超過
    #[error("レート制限を超過しました")]
    RateLimitExceeded,

    /// タイムアウト
    #[error("タイムアウトしました: {0}")]
    Timeout(String),

    /// その他の API エラー
    #[error("API エラー (status {status}): {body}")]
    ApiError {
        /// HTTP ステータスコード
        status: u16,
        /// レスポンスボディ
        body: String,
    },

    /// 不正なレスポンス
    #[error("不正なレスポンスです: {0}")]
    InvalidResponse(String),

    /// HTTP 通信エラー
    #[error("HTTP 通信に失敗しました: {0}")]
    Http(#[from] reqwest::Error),
}

/// ステップの実体化・実行エラー
///
/// ワークフローの呼び出し元には、ステップ名と原因を含むこのエラーが1つだけ返ります。
#[derive(Debug, Error)]
pub enum StepError {
    /// スタブを検出したが auto_implement が無効
    #[error("ステップ '{step}' は未実装です（auto_implement が無効のため自動生成しません）")]
    NotImplemented {
        /// ステップ名
        step: String,
    },

    /// 試行回数内に構文的に正しいコードが得られなかった
    #[error("ステップ '{step}' のコード生成に {attempts} 回失敗しました: {last_error}")]
    SynthesisFailure {
        /// ステップ名
        step: String,
        /// 試行回数
        attempts: u32,
        /// 最後の試行のエラー
        last_error: String,
    },

    /// ステップファイル・アーカイブの操作に失敗
    #[error("ステップ '{step}' のファイル操作に失敗しました ({}): {source}", path.display())]
    Io {
        /// ステップ名
        step: String,
        /// 対象パス
        path: PathBuf,
        /// 元のエラー
        source: std::io::Error,
    },

    /// コード生成中のオラクル呼び出しエラー
    #[error("プロバイダーエラー: {0}")]
    Provider(#[from] ProviderError),

    /// 実装ファイルの読み込み（チャンク実行）に失敗
    #[error("ステップ '{step}' の読み込みに失敗しました: {source}")]
    Load {
        /// ステップ名
        step: String,
        /// Lua のエラー
        source: mlua::Error,
    },

    /// 実装ファイルにステップ名の関数が定義されていない
    #[error("ステップ '{step}' の実装に関数 '{step}' が定義されていません")]
    MissingSymbol {
        /// ステップ名
        step: String,
    },

    /// 生成されたステップ本体の実行時エラー
    #[error("ステップ '{step}' の実行中にエラーが発生しました: {source}")]
    Runtime {
        /// ステップ名
        step: String,
        /// Lua のエラー
        source: mlua::Error,
    },

    /// ワークフローに宣言されていないステップ
    #[error("ステップ '{0}' はワークフローに宣言されていません")]
    UnknownStep(String),
}

/// コード生成の失敗と、それまでに消費した試行回数
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SynthesisError {
    /// 失敗までに行ったオラクル呼び出し回数
    pub attempts: u32,
    /// 失敗の原因
    #[source]
    pub source: StepError,
}

impl From<SynthesisError> for StepError {
    fn from(error: SynthesisError) -> Self {
        error.source
    }
}

/// ルーターのエラー
#[derive(Debug, Error)]
pub enum RouteError {
    /// 候補が空
    #[error("ルーティング候補が空です")]
    EmptyOptions,

    /// 候補キーの重複
    #[error("ルーティング候補のキーが重複しています: {0}")]
    DuplicateOption(String),

    /// オラクル呼び出しエラー
    #[error("プロバイダーエラー: {0}")]
    Provider(#[from] ProviderError),
}

/// ロギング初期化のエラー
#[derive(Debug, Error)]
pub enum LoggingError {
    /// ログディレクトリの作成に失敗
    #[error("ログディレクトリの作成に失敗しました: {0}")]
    Io(#[from] std::io::Error),

    /// サブスクライバーの登録に失敗（二重初期化など）
    #[error("ロガーの初期化に失敗しました: {0}")]
    Init(String),
}
