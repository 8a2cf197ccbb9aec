//! 引擎設定

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::{RegError, Result};

/// 差異計算快取命名空間
pub const DIFFERENCES_NAMESPACE: &str = "differences";
/// 年度彙總快取命名空間
pub const AGGREGATES_NAMESPACE: &str = "aggregates";
/// 機關統計快取命名空間
pub const AGENCIES_NAMESPACE: &str = "agencies";

/// 預設基準年度（資料集第一年）
pub const DEFAULT_BASELINE_YEAR: i32 = 1998;

/// 預設同時讀取快照的上限
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// 預設單次查詢可涵蓋的最多年度數
pub const DEFAULT_MAX_YEAR_SPAN: u32 = 500;

/// 快取命名空間設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    /// 命名空間名稱
    pub name: String,

    /// 最大項目數
    pub max_size: usize,
}

impl NamespaceConfig {
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        Self {
            name: name.into(),
            max_size,
        }
    }
}

/// 引擎設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// 累計統計的基準年度
    pub baseline_year: i32,

    /// 快取命名空間
    pub namespaces: Vec<NamespaceConfig>,

    /// 對資料提供者同時進行中的讀取上限（整個引擎共用）
    pub max_concurrent_fetches: usize,

    /// 單次年份範圍查詢可涵蓋的最多年度數
    pub max_year_span: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baseline_year: DEFAULT_BASELINE_YEAR,
            namespaces: vec![
                NamespaceConfig::new(DIFFERENCES_NAMESPACE, 500),
                NamespaceConfig::new(AGGREGATES_NAMESPACE, 1000),
                NamespaceConfig::new(AGENCIES_NAMESPACE, 1000),
            ],
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            max_year_span: DEFAULT_MAX_YEAR_SPAN,
        }
    }
}

impl EngineConfig {
    /// 創建預設設定
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：設置基準年度
    pub fn with_baseline_year(mut self, year: i32) -> Self {
        self.baseline_year = year;
        self
    }

    /// 建構器模式：設置（或覆蓋）命名空間容量
    pub fn with_namespace(mut self, name: impl Into<String>, max_size: usize) -> Self {
        let name = name.into();
        match self.namespaces.iter_mut().find(|ns| ns.name == name) {
            Some(ns) => ns.max_size = max_size,
            None => self.namespaces.push(NamespaceConfig::new(name, max_size)),
        }
        self
    }

    /// 建構器模式：設置同時讀取上限
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    /// 建構器模式：設置單次查詢的最多年度數
    pub fn with_max_year_span(mut self, span: u32) -> Self {
        self.max_year_span = span;
        self
    }

    /// 所有命名空間統一容量
    pub fn with_uniform_capacity(mut self, max_size: usize) -> Self {
        for ns in &mut self.namespaces {
            ns.max_size = max_size;
        }
        self
    }

    /// 從 JSON 文字載入
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RegError::Configuration(format!("設定格式錯誤: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 從 JSON 檔案載入
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RegError::Configuration(format!("無法讀取設定檔 {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceConfig> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// 驗證設定：容量與上限必須大於 0、名稱不可重複、引擎所需命名空間必須存在
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(RegError::Configuration("同時讀取上限必須大於 0".to_string()));
        }
        if self.max_year_span == 0 {
            return Err(RegError::Configuration("年度範圍上限必須大於 0".to_string()));
        }

        let mut seen = HashSet::new();
        for ns in &self.namespaces {
            if ns.max_size == 0 {
                return Err(RegError::Configuration(format!(
                    "命名空間 {} 的容量必須大於 0",
                    ns.name
                )));
            }
            if !seen.insert(ns.name.as_str()) {
                return Err(RegError::Configuration(format!("命名空間重複: {}", ns.name)));
            }
        }

        for required in [DIFFERENCES_NAMESPACE, AGGREGATES_NAMESPACE, AGENCIES_NAMESPACE] {
            if !seen.contains(required) {
                return Err(RegError::Configuration(format!("缺少命名空間: {required}")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::new();
        assert_eq!(config.baseline_year, 1998);
        assert_eq!(config.namespace(DIFFERENCES_NAMESPACE).unwrap().max_size, 500);
        assert_eq!(config.max_concurrent_fetches, DEFAULT_MAX_CONCURRENT_FETCHES);
        assert_eq!(config.max_year_span, DEFAULT_MAX_YEAR_SPAN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = EngineConfig::new().with_max_concurrent_fetches(0);
        assert!(matches!(config.validate(), Err(RegError::Configuration(_))));

        let config = EngineConfig::new().with_max_year_span(0);
        assert!(matches!(config.validate(), Err(RegError::Configuration(_))));

        let config = EngineConfig::from_json_str(r#"{ "max_concurrent_fetches": 2 }"#).unwrap();
        assert_eq!(config.max_concurrent_fetches, 2);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_baseline_year(2005)
            .with_namespace(DIFFERENCES_NAMESPACE, 16)
            .with_namespace("extra", 4);

        assert_eq!(config.baseline_year, 2005);
        assert_eq!(config.namespace(DIFFERENCES_NAMESPACE).unwrap().max_size, 16);
        assert_eq!(config.namespaces.len(), 4);

        let uniform = config.with_uniform_capacity(8);
        assert!(uniform.namespaces.iter().all(|ns| ns.max_size == 8));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = EngineConfig::new().with_namespace(AGGREGATES_NAMESPACE, 0);
        assert!(matches!(config.validate(), Err(RegError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_and_missing() {
        let mut config = EngineConfig::new();
        config.namespaces.push(NamespaceConfig::new(AGENCIES_NAMESPACE, 3));
        assert!(matches!(config.validate(), Err(RegError::Configuration(_))));

        let mut config = EngineConfig::new();
        config.namespaces.retain(|ns| ns.name != AGENCIES_NAMESPACE);
        assert!(matches!(config.validate(), Err(RegError::Configuration(_))));
    }

    #[test]
    fn test_from_json_defaults_missing_fields() {
        let config = EngineConfig::from_json_str(r#"{ "baseline_year": 2010 }"#).unwrap();
        assert_eq!(config.baseline_year, 2010);
        assert_eq!(config.namespaces.len(), 3);

        let err = EngineConfig::from_json_str(r#"{ "baseline": 2010 }"#).unwrap_err();
        assert!(matches!(err, RegError::Configuration(_)));
    }
}
