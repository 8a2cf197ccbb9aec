//! 資料提供者介面與實作
//!
//! 引擎只透過 [`SnapshotProvider`] 取得年度快照；資料庫、檔案或遠端服務
//! 皆屬外部協作者。

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::document::parse_snapshot;
use crate::snapshot::Snapshot;
use crate::{RegError, Result};

/// 年度快照資料提供者
pub trait SnapshotProvider: Send + Sync + 'static {
    /// 取得年度快照；無資料的年度回傳空快照而非錯誤
    fn get_snapshot(&self, year: i32) -> impl Future<Output = Result<Snapshot>> + Send;

    /// 有資料的年度（遞增排序）
    ///
    /// 機關統計以其中最大者為最新年度，因此每個提供者都必須列出年度。
    fn available_years(&self) -> impl Future<Output = Result<Vec<i32>>> + Send;

    /// 該年度簽署的法案數
    fn law_count(&self, _year: i32) -> impl Future<Output = Result<u64>> + Send {
        async { Ok(0) }
    }

    /// 查詢機關年度代理鍵
    fn get_agency_year_id(
        &self,
        agency_id: &str,
        year: i32,
    ) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let snapshot = self.get_snapshot(year).await?;
            snapshot
                .agency(agency_id)
                .and_then(|agency| agency.agency_year_id)
                .ok_or_else(|| RegError::NotFound(format!("機關 {agency_id} 年度 {year}")))
        }
    }
}

/// 記憶體內資料提供者
///
/// 適用於嵌入式使用與測試：記錄讀取次數，可模擬延遲與暫時性失敗。
#[derive(Debug, Default)]
pub struct MemoryProvider {
    snapshots: HashMap<i32, Snapshot>,
    laws: HashMap<i32, u64>,
    latency: Option<Duration>,
    transient_failures: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：加入年度快照
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshots.insert(snapshot.year, snapshot);
        self
    }

    /// 建構器模式：設置年度法案數
    pub fn with_law_count(mut self, year: i32, count: u64) -> Self {
        self.laws.insert(year, count);
        self
    }

    /// 建構器模式：每次讀取的延遲
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 建構器模式：接下來 `count` 次讀取失敗
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// 快照讀取次數
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// 同時進行中讀取的最大數
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn read(&self, year: i32) -> Result<Snapshot> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RegError::Provider(format!("年度 {year} 讀取失敗")));
        }

        Ok(self
            .snapshots
            .get(&year)
            .cloned()
            .unwrap_or_else(|| Snapshot::empty(year)))
    }
}

impl SnapshotProvider for MemoryProvider {
    async fn get_snapshot(&self, year: i32) -> Result<Snapshot> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let result = self.read(year).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn available_years(&self) -> Result<Vec<i32>> {
        let mut years: Vec<i32> = self.snapshots.keys().copied().collect();
        years.sort_unstable();
        Ok(years)
    }

    async fn law_count(&self, year: i32) -> Result<u64> {
        Ok(self.laws.get(&year).copied().unwrap_or(0))
    }
}

/// JSON 目錄資料提供者
///
/// 目錄結構：
/// - `nested_{year}.json`：年度快照文件
/// - `laws/signed_bills_{year}.json`：年度法案數（`totalBills`）
#[derive(Debug, Clone)]
pub struct JsonDirectoryProvider {
    root: PathBuf,
}

impl JsonDirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, year: i32) -> PathBuf {
        self.root.join(format!("nested_{year}.json"))
    }

    fn laws_path(&self, year: i32) -> PathBuf {
        self.root.join("laws").join(format!("signed_bills_{year}.json"))
    }

    /// 讀取檔案；檔案不存在時回傳 None
    async fn read_optional(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RegError::Provider(format!("無法讀取 {}: {e}", path.display()))),
        }
    }
}

/// 從檔名 `nested_{year}.json` 取出年度
fn year_from_file_name(name: &str) -> Option<i32> {
    name.strip_prefix("nested_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

impl SnapshotProvider for JsonDirectoryProvider {
    async fn get_snapshot(&self, year: i32) -> Result<Snapshot> {
        let path = self.snapshot_path(year);
        match Self::read_optional(&path).await? {
            Some(json) => {
                tracing::debug!("讀取年度 {} 快照: {}", year, path.display());
                parse_snapshot(&json, year)
            }
            None => {
                tracing::warn!("找不到年度 {} 的資料檔，視為空快照", year);
                Ok(Snapshot::empty(year))
            }
        }
    }

    async fn available_years(&self) -> Result<Vec<i32>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            RegError::Provider(format!("無法列出目錄 {}: {e}", self.root.display()))
        })?;

        let mut years = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RegError::Provider(e.to_string()))?
        {
            if let Some(year) = entry.file_name().to_str().and_then(year_from_file_name) {
                years.push(year);
            }
        }

        years.sort_unstable();
        Ok(years)
    }

    async fn law_count(&self, year: i32) -> Result<u64> {
        let path = self.laws_path(year);
        let Some(json) = Self::read_optional(&path).await? else {
            tracing::warn!("找不到年度 {} 的法案資料檔", year);
            return Ok(0);
        };

        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| RegError::InvalidDocument(e.to_string()))?;
        Ok(value.get("totalBills").and_then(|v| v.as_u64()).unwrap_or(0))
    }
}
