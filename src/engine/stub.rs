//! スタブ検出
//!
//! ステップの実装ファイルが「実体化が必要」か「実装済み」かを判定します。
//! コードを実行せずに、ファイル内容の構造だけで判定します。
//!
//! 以下のいずれかに当てはまれば実体化が必要です:
//!
//! - ファイルが存在しない
//! - 前後の空白を除いた内容が 5 文字未満
//! - 空白をすべて除いた内容が `pass` と一致
//! - 空白をすべて除いた内容に「未実装」を送出するトークン列が含まれる

use std::io;
use std::path::Path;

const MIN_CONTENT_CHARS: usize = 5;

const PASS_TOKEN: &str = "pass";

// 空白除去・小文字化後に比較する
const NOT_IMPLEMENTED_TOKENS: [&str; 3] = [
    "error(\"notimplemented",
    "error('notimplemented",
    "raisenotimplementederror",
];

/// ファイル内容がスタブかどうか
pub fn is_stub_source(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.chars().count() < MIN_CONTENT_CHARS {
        return true;
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == PASS_TOKEN {
        return true;
    }

    let lowered = compact.to_lowercase();
    NOT_IMPLEMENTED_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}

/// 実装ファイルが存在しない、またはスタブなら `true`
pub fn needs_materialization(path: &Path) -> io::Result<bool> {
    if !path.is_file() {
        return Ok(true);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(is_stub_source(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_short_content_is_stub() {
        assert!(is_stub_source(""));
        assert!(is_stub_source("   \n\t "));
        assert!(is_stub_source("  x  "));
        assert!(is_stub_source("abcd"));
    }

    #[test]
    fn test_pass_body_is_stub() {
        assert!(is_stub_source("pass"));
        assert!(is_stub_source("\n    pass\n"));
        assert!(is_stub_source("p a s s"));
    }

    #[test]
    fn test_not_implemented_error_is_stub() {
        let stub = "function add(a, b)\n  error(\"not implemented\")\nend\n";
        assert!(is_stub_source(stub));

        let single_quoted = "function add(a, b) error('Not Implemented') end";
        assert!(is_stub_source(single_quoted));
    }

    #[test]
    fn test_raise_not_implemented_is_stub() {
        let stub = "def add(a, b):\n    raise NotImplementedError\n";
        assert!(is_stub_source(stub));
    }

    #[test]
    fn test_real_body_is_not_stub() {
        let body = "function add(a, b)\n  return { sum = a + b }\nend\n";
        assert!(!is_stub_source(body));
    }

    #[test]
    fn test_five_chars_is_not_stub() {
        assert!(!is_stub_source("x = 1"));
    }

    #[test]
    fn test_missing_file_needs_materialization() {
        let dir = tempfile::tempdir().unwrap();
        assert!(needs_materialization(&dir.path().join("absent.lua")).unwrap());
    }

    #[test]
    fn test_directory_needs_materialization() {
        let dir = tempfile::tempdir().unwrap();
        assert!(needs_materialization(dir.path()).unwrap());
    }

    #[test]
    fn test_implemented_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.lua");
        std::fs::write(&path, "function step() return 1 end\n").unwrap();
        assert!(!needs_materialization(&path).unwrap());

        std::fs::write(&path, "pass\n").unwrap();
        assert!(needs_materialization(&path).unwrap());
    }
}
