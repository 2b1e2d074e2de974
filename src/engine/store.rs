//! ステップ実装ファイルとバージョンアーカイブの管理
//!
//! # 責務
//!
//! - 正規パス `{root}/{step}.lua` の読み書き
//! - 上書き前のスナップショットを `{root}/ver/{step}_v{N}.lua` に保存
//! - バージョン番号は既存アーカイブ名を走査して「最大値 + 1」で決める
//!   （欠番があっても再利用しない。`_v2` と `_v5` があれば次は `6`）
//!
//! アーカイブは一度書いたら変更・削除しません。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

/// ステップ実装ファイルの拡張子
pub const STEP_EXTENSION: &str = "lua";

/// アーカイブのサブディレクトリ名
pub const VERSION_DIR: &str = "ver";

/// アーカイブされた実装のスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub step: String,
    pub version: u32,
    pub path: PathBuf,
}

/// ステップ実装ディレクトリ
#[derive(Debug, Clone)]
pub struct StepStore {
    root: PathBuf,
}

impl StepStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self) -> PathBuf {
        self.root.join(VERSION_DIR)
    }

    /// `steps/` と `steps/ver/` を作成する
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.version_dir())
    }

    pub fn canonical_path(&self, step: &str) -> PathBuf {
        self.root.join(format!("{}.{}", step, STEP_EXTENSION))
    }

    pub fn version_path(&self, step: &str, version: u32) -> PathBuf {
        self.version_dir()
            .join(format!("{}_v{}.{}", step, version, STEP_EXTENSION))
    }

    /// アーカイブ済みバージョンの一覧（バージョン昇順）
    pub fn versions(&self, step: &str) -> io::Result<Vec<VersionRecord>> {
        let dir = self.version_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(version) = parse_version(file_name, step) {
                records.push(VersionRecord {
                    step: step.to_string(),
                    version,
                    path: entry.path(),
                });
            }
        }
        records.sort_by_key(|record| record.version);
        Ok(records)
    }

    /// 次のバージョン番号（アーカイブが無ければ 1）
    pub fn next_version(&self, step: &str) -> io::Result<u32> {
        let max = self
            .versions(step)?
            .last()
            .map(|record| record.version)
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// 正規ファイルをバイト単位でそのままアーカイブにコピーする
    ///
    /// 正規ファイルは変更しません。正規ファイルが無ければ `NotFound` を返します。
    pub fn archive(&self, step: &str) -> io::Result<VersionRecord> {
        self.ensure_dirs()?;
        let current = self.canonical_path(step);
        let version = self.next_version(step)?;
        let target = self.version_path(step, version);

        fs::copy(&current, &target)?;
        info!(
            step,
            version,
            from = %current.display(),
            to = %target.display(),
            "実装ファイルをアーカイブしました"
        );

        Ok(VersionRecord {
            step: step.to_string(),
            version,
            path: target,
        })
    }

    pub fn read_implementation(&self, step: &str) -> io::Result<String> {
        fs::read_to_string(self.canonical_path(step))
    }

    /// 正規ファイルの内容を完全に置き換える
    ///
    /// 末尾に改行が無ければ1つ追加します。それ以外は `code` をそのまま書き込みます。
    pub fn write_implementation(&self, step: &str, code: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.canonical_path(step);
        let mut content = code.to_string();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        fs::write(&path, content)?;
        Ok(path)
    }
}

/// `{step}_v{N}.lua` から `N` を取り出す
fn parse_version(file_name: &str, step: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(step)?
        .strip_prefix("_v")?
        .strip_suffix(STEP_EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
