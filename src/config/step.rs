//! ワークフローステップの定義
//!
//! # 責務
//!
//! Workflow を構成する Step の宣言体を提供するモジュール。
//! アプリケーションに対して、[WorkflowStep] を提供する。
//!
//! ステップは名前で一意に識別され、宣言されたシグネチャ（引数・戻り値）と説明を持ちます。
//! 実装本体はここでは持たず、`steps/{name}.lua` に置かれます（無ければ自動生成）。

use crate::error::ConfigError;
use super::dto::WorkflowStepDto;

const LUA_KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// ワークフローステップ（ドメインモデル）
///
/// ## DTO との違い
///
/// - [`WorkflowStepDto`](super::dto::WorkflowStepDto): TOML デシリアライズ専用
/// - [`WorkflowStep`]: バリデーション済み、ドメインロジックを持つ
///
/// # 例
///
/// ```rust
/// use autostep::config::WorkflowStep;
///
/// let step = WorkflowStep::new("add_numbers")
///     .with_params(["a", "b"])
///     .with_returns("table")
///     .with_description("Add two numbers")
///     .with_auto_implement(true);
///
/// assert_eq!(step.signature(), "add_numbers(a, b) -> table");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    name: String,
    params: Vec<String>,
    returns: Option<String>,
    description: Option<String>,
    auto_implement: bool,
    declaration: Option<String>,
}

impl WorkflowStep {
    /// 名前だけを持つステップを生成（auto_implement は無効）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            description: None,
            auto_implement: false,
            declaration: None,
        }
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = Some(returns.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_auto_implement(mut self, auto_implement: bool) -> Self {
        self.auto_implement = auto_implement;
        self
    }

    /// 明示的な宣言テキストを設定
    ///
    /// `@step` アノテーション行を含んでいても構いません（コード生成時に除去されます）。
    pub fn with_declaration(mut self, declaration: impl Into<String>) -> Self {
        self.declaration = Some(declaration.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn returns(&self) -> Option<&str> {
        self.returns.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn auto_implement(&self) -> bool {
        self.auto_implement
    }

    /// シグネチャ文字列（例: `add_numbers(a, b) -> table`）
    pub fn signature(&self) -> String {
        let mut signature = format!("{}({})", self.name, self.params.join(", "));
        if let Some(returns) = &self.returns {
            signature.push_str(" -> ");
            signature.push_str(returns);
        }
        signature
    }

    /// 宣言テキスト
    ///
    /// 明示的な宣言があればそれを、無ければ Lua のスタブ関数として描画したものを返します。
    pub fn declaration(&self) -> String {
        if let Some(declaration) = &self.declaration {
            return declaration.clone();
        }

        let mut lines = Vec::new();
        if let Some(description) = &self.description {
            for line in description.lines() {
                lines.push(format!("--- {}", line.trim()));
            }
        }
        for param in &self.params {
            lines.push(format!("---@param {} any", param));
        }
        if let Some(returns) = &self.returns {
            lines.push(format!("---@return {}", returns));
        }
        lines.push(format!("function {}({})", self.name, self.params.join(", ")));
        lines.push("  error(\"not implemented\")".to_string());
        lines.push("end".to_string());
        lines.join("\n")
    }

    /// ステップ宣言のバリデーション
    ///
    /// - 名前が Lua の識別子として有効であること（予約語は不可）
    /// - 引数名も同様に有効で、重複しないこと
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.name) {
            return Err(ConfigError::Validation(format!(
                "ステップ名 '{}' は識別子として無効です",
                self.name
            )));
        }

        for (index, param) in self.params.iter().enumerate() {
            if !is_identifier(param) {
                return Err(ConfigError::Validation(format!(
                    "ステップ '{}' の引数名 '{}' は識別子として無効です",
                    self.name, param
                )));
            }
            if self.params[..index].contains(param) {
                return Err(ConfigError::Validation(format!(
                    "ステップ '{}' の引数名 '{}' が重複しています",
                    self.name, param
                )));
            }
        }

        Ok(())
    }
}

/// Lua の識別子として有効か
pub(crate) fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !LUA_KEYWORDS.contains(&value)
}

/// DTO からドメインモデルへの変換（読み込み方向）
///
/// バリデーションを実施し、不正なデータの場合は [`ConfigError::Validation`] を返します。
impl TryFrom<WorkflowStepDto> for WorkflowStep {
    type Error = ConfigError;

    fn try_from(dto: WorkflowStepDto) -> Result<Self, Self::Error> {
        let step = Self {
            name: dto.name.trim().to_string(),
            params: dto.params.into_iter().map(|p| p.trim().to_string()).collect(),
            returns: dto.returns.filter(|r| !r.trim().is_empty()),
            description: dto.description.filter(|d| !d.trim().is_empty()),
            auto_implement: dto.auto_implement,
            declaration: dto.declaration.filter(|d| !d.trim().is_empty()),
        };
        step.validate()?;
        Ok(step)
    }
}

/// ドメインモデルから DTO への変換（書き込み方向）
impl From<WorkflowStep> for WorkflowStepDto {
    fn from(step: WorkflowStep) -> Self {
        Self {
            name: step.name,
            params: step.params,
            returns: step.returns,
            description: step.description,
            auto_implement: step.auto_implement,
            declaration: step.declaration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_with_returns() {
        let step = WorkflowStep::new("multiply_numbers")
            .with_params(["a", "b"])
            .with_returns("table");
        assert_eq!(step.signature(), "multiply_numbers(a, b) -> table");
    }

    #[test]
    fn test_signature_without_params() {
        let step = WorkflowStep::new("code_step");
        assert_eq!(step.signature(), "code_step()");
    }

    #[test]
    fn test_rendered_declaration_is_lua_stub() {
        let step = WorkflowStep::new("add_numbers")
            .with_params(["a", "b"])
            .with_returns("table")
            .with_description("Add two numbers.");

        let declaration = step.declaration();
        assert!(declaration.starts_with("--- Add two numbers."));
        assert!(declaration.contains("---@param a any"));
        assert!(declaration.contains("---@return table"));
        assert!(declaration.contains("function add_numbers(a, b)"));
        assert!(declaration.trim_end().ends_with("end"));
    }

    #[test]
    fn test_explicit_declaration_wins() {
        let step = WorkflowStep::new("x").with_declaration("function x() end");
        assert_eq!(step.declaration(), "function x() end");
    }

    #[test]
    fn test_validate_rejects_keyword_name() {
        let step = WorkflowStep::new("end");
        assert!(matches!(step.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_identifier() {
        assert!(WorkflowStep::new("1step").validate().is_err());
        assert!(WorkflowStep::new("my-step").validate().is_err());
        assert!(WorkflowStep::new("").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_params() {
        let step = WorkflowStep::new("f").with_params(["a", "a"]);
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("add_numbers"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("step2"));
        assert!(!is_identifier("function"));
        assert!(!is_identifier("a b"));
    }
}
