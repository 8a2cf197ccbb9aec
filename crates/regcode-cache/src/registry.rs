//! 快取命名空間註冊表
//!
//! 啟動時建立全部命名空間，之後只讀共享（查詢命名空間不需上鎖）。

use regcode_core::{NamespaceConfig, RegError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::key::CacheKey;
use crate::namespace::{CacheStats, Namespace};

/// 命名空間註冊表
pub struct CacheRegistry<V> {
    namespaces: HashMap<String, Arc<Namespace<V>>>,
}

impl<V> Default for CacheRegistry<V> {
    fn default() -> Self {
        Self {
            namespaces: HashMap::new(),
        }
    }
}

impl<V> CacheRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 依設定建立所有命名空間
    pub fn from_configs(configs: &[NamespaceConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.create_namespace(&config.name, config.max_size)?;
        }
        Ok(registry)
    }

    /// 註冊新的命名空間；名稱重複或容量為 0 時回傳設定錯誤
    pub fn create_namespace(&mut self, name: &str, max_size: usize) -> Result<()> {
        if self.namespaces.contains_key(name) {
            return Err(RegError::Configuration(format!("命名空間已存在: {name}")));
        }

        let namespace = Namespace::new(name, max_size)?;
        self.namespaces.insert(name.to_string(), Arc::new(namespace));
        tracing::debug!("建立快取命名空間 {}，容量 {}", name, max_size);
        Ok(())
    }

    pub fn namespace(&self, name: &str) -> Result<&Arc<Namespace<V>>> {
        self.namespaces
            .get(name)
            .ok_or_else(|| RegError::Configuration(format!("未註冊的命名空間: {name}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// 已註冊的命名空間名稱（排序）
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, namespace: &str, key: &CacheKey) -> Result<Option<V>> {
        Ok(self.namespace(namespace)?.get(key))
    }

    pub fn put(&self, namespace: &str, key: CacheKey, value: V) -> Result<()> {
        self.namespace(namespace)?.put(key, value);
        Ok(())
    }

    /// 見 [`Namespace::get_or_compute`]
    pub async fn get_or_compute<F, Fut>(&self, namespace: &str, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let namespace = Arc::clone(self.namespace(namespace)?);
        namespace.get_or_compute(key, compute).await
    }

    /// 清空所有命名空間
    pub fn clear_all(&self) {
        for namespace in self.namespaces.values() {
            namespace.clear();
        }
        tracing::info!("已清空 {} 個快取命名空間", self.namespaces.len());
    }

    /// 各命名空間統計（依名稱排序）
    pub fn stats(&self) -> Vec<CacheStats> {
        let mut stats: Vec<CacheStats> = self.namespaces.values().map(|ns| ns.stats()).collect();
        stats.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        stats
    }
}
