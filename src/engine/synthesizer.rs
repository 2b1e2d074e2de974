//! LLM によるステップ実装の生成
//!
//! # 責務
//!
//! - ステップ宣言と親ワークフローのソースからプロンプトを組み立てる
//! - チャットオラクルの応答から最初のフェンス付きコードブロックを抽出する
//! - 抽出したコードを構文チェックし、失敗したらエラー内容を添えて再依頼する
//!
//! # 生成フロー
//!
//! 1. システム指示 + ユーザープロンプト（宣言・親ソース・ステップ名・説明）を送信
//! 2. 応答メッセージを連結し、最初の ```` ``` ```` の組を探す（無ければ「コードブロックなし」）
//! 3. 先頭行の言語タグ（`lua` など）を除去し、前後の空白を削る
//! 4. 構文チェックに通れば即座に返す
//! 5. 失敗したらエラー内容を含む追加のユーザーメッセージを付けて 2 へ
//! 6. 試行回数を使い切ったら [`StepError::SynthesisFailure`]

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{StepError, SynthesisError};
use crate::provider::{ChatOracle, Message, join_contents};
use super::loader::StepLoader;

/// コード生成のデフォルト試行回数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const FENCE: &str = "```";

const SYSTEM_PROMPT: &str = "You are a perfect Lua 5.4 coding assistant. \
Given a parent workflow, a function's signature and its description, \
output a complete Lua function that fulfills the requirements. \
Wrap the code in a single triple-backtick (```) code block.";

/// 1回のコード生成依頼
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    /// ステップ名（生成される関数名）
    pub step_name: &'a str,
    /// ステップの宣言テキスト（`@step` 行は除去される）
    pub declaration: &'a str,
    /// 親ワークフローのソース全文
    pub enclosing_source: &'a str,
    /// 説明文
    pub description: &'a str,
}

/// 生成結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// 構文チェック済みのコード
    pub code: String,
    /// 使用した試行回数（= オラクル呼び出し回数）
    pub attempts: u32,
}

/// 1回の試行の失敗理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// 応答にコードブロックが無い
    NoCodeBlock,
    /// 構文エラー（パーサーのメッセージ）
    Parse(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::NoCodeBlock => f.write_str("No code block found."),
            AttemptError::Parse(message) => f.write_str(message),
        }
    }
}

/// コード生成器
pub struct CodeSynthesizer {
    oracle: Arc<dyn ChatOracle>,
    max_attempts: u32,
}

impl CodeSynthesizer {
    pub fn new(oracle: Arc<dyn ChatOracle>) -> Self {
        Self {
            oracle,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// 試行回数を設定（0 は 1 として扱う）
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 構文的に正しい実装が得られるまでオラクルに依頼する
    ///
    /// オラクル自体のエラー（通信・認証など）は再試行せずにそのまま返します。
    /// 失敗時のエラーにはそれまでの試行回数が付きます。
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        validator: &dyn StepLoader,
    ) -> Result<Synthesis, SynthesisError> {
        let step = request.step_name;
        let declaration = strip_step_annotations(request.declaration);

        let mut messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(
                &declaration,
                request.enclosing_source,
                step,
                request.description,
            )),
        ];
        let mut last_error: Option<AttemptError> = None;

        for attempt in 1..=self.max_attempts {
            if let Some(error) = &last_error {
                messages.push(Message::user(retry_prompt(error)));
            }

            info!(
                step,
                attempt,
                max_attempts = self.max_attempts,
                model = self.oracle.model(),
                "LLM にコード生成を依頼します"
            );
            let response = self.oracle.chat(&messages).await.map_err(|e| SynthesisError {
                attempts: attempt,
                source: e.into(),
            })?;

            let outcome = match extract_code_block(&response) {
                None => Err(AttemptError::NoCodeBlock),
                Some(code) => validator
                    .check_syntax(step, &code)
                    .map(|()| code)
                    .map_err(AttemptError::Parse),
            };

            match outcome {
                Ok(code) => {
                    info!(step, attempt, "構文チェックに成功しました");
                    return Ok(Synthesis {
                        code,
                        attempts: attempt,
                    });
                }
                Err(error) => {
                    warn!(step, attempt, error = %error, "生成コードが不正です");
                    messages.extend(response);
                    last_error = Some(error);
                }
            }
        }

        Err(SynthesisError {
            attempts: self.max_attempts,
            source: StepError::SynthesisFailure {
                step: step.to_string(),
                attempts: self.max_attempts,
                last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
            },
        })
    }
}

/// 初回のユーザープロンプト
pub fn build_prompt(
    declaration: &str,
    enclosing_source: &str,
    step_name: &str,
    description: &str,
) -> String {
    format!(
        "The function to be implemented is:
<function_definition>
{declaration}
</function_definition>

This function is part of the following parent workflow:
<parent_workflow>
{enclosing_source}
</parent_workflow>

Requirements:
1) The function must be valid Lua 5.4 code.
2) Define it as a global function named exactly '{step_name}'.
3) Wrap the entire function in triple backticks (```).
4) Make sure the final code is logically and syntactically correct.
5) Only output the full working function code. Implement it fully and only output the function code.

You must fully implement the function '{step_name}' that satisfies the following description:
<description>
{description}
</description>
"
    )
}

/// 再試行時に追加するユーザーメッセージ
pub fn retry_prompt(error: &AttemptError) -> String {
    format!(
        "There was a syntax error in the code you provided:\n{}\nPlease fix it and provide the complete code again wrapped in triple backticks.",
        error
    )
}

/// 応答から最初のコードブロックを抽出する
///
/// 全メッセージを改行で連結し、最初の ```` ``` ```` とその次の ```` ``` ```` の間を取り出します。
/// 閉じ側が無ければ `None`。ブロックが複数行で先頭行が既知の言語タグならその行を捨てます。
/// `do` や `end` のような Lua の文は言語タグとみなしません。
pub fn extract_code_block(messages: &[Message]) -> Option<String> {
    let text = join_contents(messages, "\n");

    let start = text.find(FENCE)? + FENCE.len();
    let end = start + text[start..].find(FENCE)?;

    let block = text[start..end].trim();
    let block = match block.split_once('\n') {
        Some((first, rest)) if is_language_tag(first) => rest.trim(),
        _ => block,
    };
    Some(block.to_string())
}

const LANGUAGE_TAGS: &[&str] = &[
    "lua", "luau", "python", "py", "python3", "rust", "rs", "javascript", "js", "typescript",
    "ts", "bash", "sh", "shell", "text", "plaintext", "txt", "json", "toml", "yaml",
];

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    LANGUAGE_TAGS
        .iter()
        .any(|tag| line.eq_ignore_ascii_case(tag))
}

/// `@step` アノテーション行を除去する
///
/// `@step(...)`、`--@step`、`---@step` で始まる行が対象です。
pub fn strip_step_annotations(source: &str) -> String {
    source
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start().trim_start_matches('-').trim_start();
            !trimmed.starts_with("@step")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::LuaStepLoader;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 決められた応答を順番に返すモックオラクル
    struct MockOracle {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl MockOracle {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().rev().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatOracle for MockOracle {
        async fn chat(&self, messages: &[Message]) -> Result<Vec<Message>, ProviderError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "no more responses".to_string());
            Ok(vec![Message::assistant(response)])
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    fn request() -> SynthesisRequest<'static> {
        SynthesisRequest {
            step_name: "add",
            declaration: "---@step auto_implement=true\nfunction add(a, b) end",
            enclosing_source: "[workflow]\nname = \"w\"",
            description: "Add two numbers.",
        }
    }

    #[test]
    fn test_extract_code_block_with_language_tag() {
        let messages = vec![Message::assistant(
            "Here you go:\n```lua\nfunction add(a, b)\n  return a + b\nend\n```\nDone.",
        )];
        assert_eq!(
            extract_code_block(&messages).unwrap(),
            "function add(a, b)\n  return a + b\nend"
        );
    }

    #[test]
    fn test_extract_code_block_python_tag() {
        let messages = vec![Message::assistant("```python\ndef f():\n    return 1\n```")];
        assert_eq!(extract_code_block(&messages).unwrap(), "def f():\n    return 1");
    }

    #[test]
    fn test_extract_code_block_without_tag() {
        let messages = vec![Message::assistant("```\nlocal x = 1\nreturn x\n```")];
        assert_eq!(extract_code_block(&messages).unwrap(), "local x = 1\nreturn x");
    }

    #[test]
    fn test_extract_code_block_keeps_lua_statement_first_line() {
        let messages = vec![Message::assistant("```\ndo\n  x = 1\nend\n```")];
        assert_eq!(extract_code_block(&messages).unwrap(), "do\n  x = 1\nend");

        let messages = vec![Message::assistant("```\nreturn\n```")];
        assert_eq!(extract_code_block(&messages).unwrap(), "return");
    }

    #[test]
    fn test_extract_code_block_tag_case_insensitive() {
        let messages = vec![Message::assistant("```Lua\nlocal x = 1\n```")];
        assert_eq!(extract_code_block(&messages).unwrap(), "local x = 1");
    }

    #[test]
    fn test_extract_code_block_single_line_keeps_content() {
        let messages = vec![Message::assistant("```lua```")];
        assert_eq!(extract_code_block(&messages).unwrap(), "lua");
    }

    #[test]
    fn test_extract_code_block_only_first_block() {
        let messages = vec![Message::assistant(
            "```lua\nfunction a() end\n```\n```lua\nfunction b() end\n```",
        )];
        assert_eq!(extract_code_block(&messages).unwrap(), "function a() end");
    }

    #[test]
    fn test_extract_code_block_spans_messages() {
        let messages = vec![
            Message::assistant("```lua\nfunction a()"),
            Message::assistant("  return 1\nend\n```"),
        ];
        assert_eq!(
            extract_code_block(&messages).unwrap(),
            "function a()\n  return 1\nend"
        );
    }

    #[test]
    fn test_extract_code_block_none() {
        assert_eq!(extract_code_block(&[Message::assistant("no code here")]), None);
        assert_eq!(extract_code_block(&[Message::assistant("```lua\nunterminated")]), None);
        assert_eq!(extract_code_block(&[]), None);
    }

    #[test]
    fn test_strip_step_annotations() {
        let source = "@step(auto_implement=True)\n---@step auto\n  --@step\nfunction f()\n  -- body\nend";
        let stripped = strip_step_annotations(source);
        assert!(!stripped.contains("auto_implement"));
        assert!(stripped.starts_with("function f()"));
        assert!(stripped.ends_with("end"));
    }

    #[test]
    fn test_strip_keeps_other_annotations() {
        let source = "---@param a any\nfunction f(a) end";
        assert_eq!(strip_step_annotations(source), source);
    }

    #[test]
    fn test_build_prompt_embeds_everything() {
        let prompt = build_prompt("function add(a, b) end", "[workflow]", "add", "Add numbers");
        assert!(prompt.contains("<function_definition>\nfunction add(a, b) end\n</function_definition>"));
        assert!(prompt.contains("<parent_workflow>\n[workflow]\n</parent_workflow>"));
        assert!(prompt.contains("'add'"));
        assert!(prompt.contains("<description>\nAdd numbers\n</description>"));
    }

    #[test]
    fn test_attempt_error_display() {
        assert_eq!(AttemptError::NoCodeBlock.to_string(), "No code block found.");
        assert_eq!(AttemptError::Parse("bad".to_string()).to_string(), "bad");
    }

    #[tokio::test]
    async fn test_synthesize_first_attempt() {
        let oracle = Arc::new(MockOracle::new(&[
            "```lua\nfunction add(a, b)\n  return a + b\nend\n```",
        ]));
        let synthesizer = CodeSynthesizer::new(oracle.clone());

        let synthesis = synthesizer
            .synthesize(&request(), &LuaStepLoader::new())
            .await
            .unwrap();

        assert_eq!(synthesis.attempts, 1);
        assert_eq!(synthesis.code, "function add(a, b)\n  return a + b\nend");

        let requests = oracle.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 2);
        assert_eq!(requests[0][0].role, crate::provider::Role::System);
        assert!(!requests[0][1].content.contains("@step"));
        assert!(requests[0][1].content.contains("function add(a, b) end"));
    }

    #[tokio::test]
    async fn test_synthesize_retries_with_error_feedback() {
        let oracle = Arc::new(MockOracle::new(&[
            "no code at all",
            "```lua\nfunction add(a, b) return a + end\n```",
            "```lua\nfunction add(a, b) return a + b end\n```",
        ]));
        let synthesizer = CodeSynthesizer::new(oracle.clone());

        let synthesis = synthesizer
            .synthesize(&request(), &LuaStepLoader::new())
            .await
            .unwrap();
        assert_eq!(synthesis.attempts, 3);
        assert_eq!(synthesis.code, "function add(a, b) return a + b end");

        let requests = oracle.requests();
        assert_eq!(requests.len(), 3);
        let second_feedback = requests[1].last().unwrap();
        assert!(second_feedback.content.contains("No code block found."));
        let third_feedback = requests[2].last().unwrap();
        assert!(third_feedback.content.contains("syntax error"));
        assert_ne!(third_feedback.content, second_feedback.content);
    }

    #[tokio::test]
    async fn test_synthesize_exhausts_budget() {
        let oracle = Arc::new(MockOracle::new(&["nothing", "still nothing"]));
        let synthesizer = CodeSynthesizer::new(oracle.clone()).with_max_attempts(2);

        let result = synthesizer
            .synthesize(&request(), &LuaStepLoader::new())
            .await
            .map_err(|e| {
                assert_eq!(e.attempts, 2);
                StepError::from(e)
            });

        match result {
            Err(StepError::SynthesisFailure { step, attempts, last_error }) => {
                assert_eq!(step, "add");
                assert_eq!(attempts, 2);
                assert_eq!(last_error, "No code block found.");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(oracle.requests().len(), 2);
    }

    /// 2回目の呼び出しで通信エラーを返すオラクル
    struct FlakyOracle {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ChatOracle for FlakyOracle {
        async fn chat(&self, _messages: &[Message]) -> Result<Vec<Message>, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 2 {
                return Err(ProviderError::RateLimitExceeded);
            }
            Ok(vec![Message::assistant("no code")])
        }

        fn model(&self) -> &str {
            "flaky-model"
        }
    }

    #[tokio::test]
    async fn test_synthesize_oracle_error_reports_attempts() {
        let oracle = Arc::new(FlakyOracle { calls: Mutex::new(0) });
        let synthesizer = CodeSynthesizer::new(oracle);

        let error = synthesizer
            .synthesize(&request(), &LuaStepLoader::new())
            .await
            .unwrap_err();

        assert_eq!(error.attempts, 2);
        assert!(matches!(
            error.source,
            StepError::Provider(ProviderError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let oracle = Arc::new(MockOracle::new(&[]));
        assert_eq!(CodeSynthesizer::new(oracle).with_max_attempts(0).max_attempts(), 1);
    }
}
