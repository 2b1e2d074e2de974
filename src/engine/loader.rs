//! ステップ実装の構文チェックと動的ロード
//!
//! # 責務
//!
//! - 生成されたソースが構文的に正しいか（実行せずに）検査する
//! - 正規ファイルを読み込み、ステップ名の関数を解決した呼び出し可能なハンドルを返す
//! - 呼び出し引数（JSON 値）を Lua 値へ、戻り値を JSON 値へ変換する
//!
//! [`StepLoader::load`] は呼び出しのたびにファイルを読み直し、新しい Lua ステートを作ります。
//! 書き換えられたファイルは必ず次回ロードで反映され、古いハンドルがキャッシュされることはありません。

use std::fs;
use std::path::Path;

use mlua::{Function, Lua, LuaSerdeExt, SerializeOptions, Variadic};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StepError;

/// ステップ呼び出しの引数
///
/// 位置引数は順番どおりに渡され、キーワード引数は空でなければ末尾に1つのテーブルとして渡されます。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepArgs {
    #[serde(default)]
    pub positional: Vec<Value>,
    #[serde(default)]
    pub keyword: Map<String, Value>,
}

impl StepArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 位置引数のみで生成
    pub fn positional<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self {
            positional: values.into_iter().collect(),
            keyword: Map::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }
}

/// ステップ実装のローダー
pub trait StepLoader: Send + Sync {
    /// ソースを実行せずに構文チェックする。エラー時はパーサーのメッセージを返す
    fn check_syntax(&self, step: &str, source: &str) -> Result<(), String>;

    /// 正規ファイルを読み込み、ステップ名の関数を解決する
    fn load(&self, step: &str, path: &Path) -> Result<Box<dyn StepHandle>, StepError>;
}

/// ロード済みのステップ
pub trait StepHandle {
    /// 引数をそのまま渡して呼び出し、戻り値をそのまま返す
    fn invoke(&self, args: &StepArgs) -> Result<Value, StepError>;
}

/// Lua 5.4 によるローダー
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaStepLoader;

impl LuaStepLoader {
    pub fn new() -> Self {
        Self
    }
}

impl StepLoader for LuaStepLoader {
    fn check_syntax(&self, step: &str, source: &str) -> Result<(), String> {
        let lua = Lua::new();
        lua.load(source)
            .set_name(step)
            .into_function()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn load(&self, step: &str, path: &Path) -> Result<Box<dyn StepHandle>, StepError> {
        let source = fs::read_to_string(path).map_err(|source| StepError::Io {
            step: step.to_string(),
            path: path.to_path_buf(),
            source,
        })?;

        let lua = Lua::new();
        let load_error = |source| StepError::Load {
            step: step.to_string(),
            source,
        };

        lua.load(source.as_str())
            .set_name(format!("@{}", path.display()))
            .exec()
            .map_err(load_error)?;

        let function: Option<Function> = lua.globals().get(step).map_err(load_error)?;
        let function = function.ok_or_else(|| StepError::MissingSymbol {
            step: step.to_string(),
        })?;

        Ok(Box::new(LuaStepHandle {
            step: step.to_string(),
            function,
            lua,
        }))
    }
}

// function は lua より先に破棄する
struct LuaStepHandle {
    step: String,
    function: Function,
    lua: Lua,
}

impl LuaStepHandle {
    fn runtime_error(&self, source: mlua::Error) -> StepError {
        StepError::Runtime {
            step: self.step.clone(),
            source,
        }
    }
}

// null は nil として渡す
fn serialize_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

impl StepHandle for LuaStepHandle {
    fn invoke(&self, args: &StepArgs) -> Result<Value, StepError> {
        let mut values = Vec::with_capacity(args.positional.len() + 1);
        for arg in &args.positional {
            values.push(
                self.lua
                    .to_value_with(arg, serialize_options())
                    .map_err(|e| self.runtime_error(e))?,
            );
        }
        if !args.keyword.is_empty() {
            values.push(
                self.lua
                    .to_value_with(&args.keyword, serialize_options())
                    .map_err(|e| self.runtime_error(e))?,
            );
        }

        let result: mlua::Value = self
            .function
            .call(Variadic::from_iter(values))
            .map_err(|e| self.runtime_error(e))?;

        self.lua
            .from_value(result)
            .map_err(|e| self.runtime_error(e))
    }
}
