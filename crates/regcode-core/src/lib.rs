//! # Regcode Core
//!
//! 法規資料模型、設定與資料提供者介面

pub mod agency;
pub mod config;
pub mod document;
pub mod provider;
pub mod rule;
pub mod snapshot;

// Re-export 主要類型
pub use agency::{Agency, AgencyYear, Chapter};
pub use config::{
    EngineConfig, NamespaceConfig, AGENCIES_NAMESPACE, AGGREGATES_NAMESPACE,
    DEFAULT_BASELINE_YEAR, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_YEAR_SPAN,
    DIFFERENCES_NAMESPACE,
};
pub use document::{parse_snapshot, SnapshotDocument};
pub use provider::{JsonDirectoryProvider, MemoryProvider, SnapshotProvider};
pub use rule::{Rule, RuleIdx, RuleTree};
pub use snapshot::Snapshot;

/// 法規引擎錯誤類型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegError {
    #[error("無效的年份範圍: {start}..={end}")]
    InvalidRange { start: i32, end: i32 },

    #[error("找不到資料: {0}")]
    NotFound(String),

    #[error("資料提供者錯誤: {0}")]
    Provider(String),

    #[error("無效的快照文件: {0}")]
    InvalidDocument(String),

    #[error("設定錯誤: {0}")]
    Configuration(String),
}

impl RegError {
    /// 是否為暫時性錯誤（呼叫端可重試）
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegError::Provider(_))
    }

    /// 是否為呼叫端輸入錯誤（對應 4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(self, RegError::InvalidRange { .. } | RegError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, RegError>;

/// 檢查年份範圍 `start..=end`
pub fn check_range(start: i32, end: i32) -> Result<()> {
    if end < start {
        return Err(RegError::InvalidRange { start, end });
    }
    Ok(())
}
