//! autostep: 自己補完型ワークフローのランタイム
//!
//! # 責務
//!
//! - ワークフローを構成するステップのうち、未実装（ファイルなし・スタブ）のものを
//!   LLM によって自動生成し、ディスクに保存・バージョン管理した上で動的に読み込んで実行する
//! - LLM に次のステップを選ばせるルーター機能を提供する
//!
//! # モジュール構成
//!
//! - [`config`]: ワークフロー定義（TOML）の読み込み
//! - [`provider`]: チャットオラクル（OpenAI / Gemini）の抽象化とレジストリ
//! - [`engine`]: スタブ検出・コード生成・バージョン管理・動的ロード・ルーティング
//! - [`logging`]: tracing の初期化とフラッシュ
//! - [`error`]: エラー型

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
