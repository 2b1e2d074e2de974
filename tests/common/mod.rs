#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autostep::error::ProviderError;
use autostep::provider::{ChatOracle, Message};

/// 用意した応答を順番に返し、受け取ったリクエストを記録するオラクル
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatOracle for ScriptedOracle {
    async fn chat(&self, messages: &[Message]) -> Result<Vec<Message>, ProviderError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".to_string()))?;
        Ok(vec![Message::assistant(response)])
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Lua のコードをフェンス付きコードブロックで包む
pub fn fenced(code: &str) -> String {
    format!("Here is the implementation:\n```lua\n{}\n```\n", code)
}

pub const MATH_WORKFLOW: &str = r#"
[workflow]
name = "math"
max_attempts = 3

[[steps]]
name = "add_numbers"
params = ["a", "b"]
returns = "table"
description = "Add two numbers and return { sum = a + b }."
auto_implement = true

[[steps]]
name = "multiply_numbers"
params = ["a", "b"]
returns = "table"
description = "Multiply two numbers, returning { product = a * b }."
auto_implement = false
"#;
