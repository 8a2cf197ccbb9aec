//! 快取鍵

use serde::Serialize;
use std::fmt;

/// 快取鍵參數
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyParam {
    Int(i64),
    Text(String),
}

impl From<i64> for KeyParam {
    fn from(value: i64) -> Self {
        KeyParam::Int(value)
    }
}

impl From<i32> for KeyParam {
    fn from(value: i32) -> Self {
        KeyParam::Int(value.into())
    }
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        KeyParam::Text(value.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(value: String) -> Self {
        KeyParam::Text(value)
    }
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParam::Int(value) => write!(f, "{value}"),
            KeyParam::Text(value) => write!(f, "{value:?}"),
        }
    }
}

/// 快取鍵：操作名稱 + 有序參數
///
/// 以值比較，相同操作與參數即為同一鍵。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    operation: String,
    params: Vec<KeyParam>,
}

impl CacheKey {
    /// 創建無參數的鍵
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    /// 建構器模式：附加參數
    pub fn with_param(mut self, param: impl Into<KeyParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &[KeyParam] {
        &self.params
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operation)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")
    }
}
