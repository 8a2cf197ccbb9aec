//! 變動引擎：以快取層記憶化所有年度分析

use regcode_cache::{CacheKey, CacheRegistry, CacheStats};
use regcode_core::{
    check_range, EngineConfig, RegError, Result, Snapshot, SnapshotProvider, AGENCIES_NAMESPACE,
    AGGREGATES_NAMESPACE, DIFFERENCES_NAMESPACE,
};
use serde::Serialize;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::aggregate::{AggregateCalculator, ChapterTotals, NewRulesCount, YearRuleTotal, YearRuleVolume};
use crate::diff::{DetailedChanges, DiffCalculator, DiffCounts, YearDiff};
use crate::listing::{AgencyRecord, AgencySummary, ChapterSummary, ListingCalculator, RuleNode};
use crate::stats::{AgencyStats, AgencyStatsCalculator};
use crate::timeline::{AgencyTimelineEntry, TimelineCalculator};

/// 相鄰年度的差異計數
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleDifference {
    pub previous_year: i32,
    pub year: i32,
    #[serde(flatten)]
    pub counts: DiffCounts,
    /// 較新年度簽署的法案數
    pub total_laws: u64,
}

/// 快取中的分析結果
#[derive(Debug, Clone)]
pub enum Analysis {
    Differences(Arc<Vec<YearDiff>>),
    SimpleDifferences(Arc<Vec<SimpleDifference>>),
    Detailed(Arc<DetailedChanges>),
    RuleTotals(Arc<Vec<YearRuleTotal>>),
    ChapterTotals(Arc<ChapterTotals>),
    NewRules(Arc<Vec<NewRulesCount>>),
    Timeline(Arc<Vec<AgencyTimelineEntry>>),
    RuleVolume(Arc<Vec<YearRuleVolume>>),
    AgencyStats(Arc<Vec<AgencyStats>>),
    Agencies(Arc<Vec<AgencySummary>>),
    Chapters(Arc<Vec<ChapterSummary>>),
    Rules(Arc<Vec<RuleNode>>),
    AllAgencies(Arc<Vec<AgencyRecord>>),
}

/// 可存入 [`Analysis`] 的結果型別
trait Cached: Sized + Send + Sync + 'static {
    fn into_analysis(value: Arc<Self>) -> Analysis;
    fn from_analysis(analysis: Analysis) -> Option<Arc<Self>>;
}

macro_rules! cached_analysis {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl Cached for $ty {
                fn into_analysis(value: Arc<Self>) -> Analysis {
                    Analysis::$variant(value)
                }

                fn from_analysis(analysis: Analysis) -> Option<Arc<Self>> {
                    match analysis {
                        Analysis::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

cached_analysis! {
    Differences => Vec<YearDiff>,
    SimpleDifferences => Vec<SimpleDifference>,
    Detailed => DetailedChanges,
    RuleTotals => Vec<YearRuleTotal>,
    ChapterTotals => ChapterTotals,
    NewRules => Vec<NewRulesCount>,
    Timeline => Vec<AgencyTimelineEntry>,
    RuleVolume => Vec<YearRuleVolume>,
    AgencyStats => Vec<AgencyStats>,
    Agencies => Vec<AgencySummary>,
    Chapters => Vec<ChapterSummary>,
    Rules => Vec<RuleNode>,
    AllAgencies => Vec<AgencyRecord>,
}

/// 法規變動引擎
///
/// 啟動時建立一次，之後以 `clone` 共享給每個請求；快取註冊表與資料提供者皆以 `Arc` 持有。
pub struct ChangeEngine<P> {
    fetcher: Fetcher<P>,
    cache: Arc<CacheRegistry<Analysis>>,
    config: Arc<EngineConfig>,
}

impl<P> Clone for ChangeEngine<P> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            cache: Arc::clone(&self.cache),
            config: Arc::clone(&self.config),
        }
    }
}

impl<P: SnapshotProvider> ChangeEngine<P> {
    /// 驗證設定並建立所有快取命名空間
    pub fn initialize(provider: Arc<P>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = CacheRegistry::from_configs(&config.namespaces)?;

        tracing::info!(
            "變動引擎初始化完成：命名空間 {} 個，基準年度 {}，同時讀取上限 {}",
            config.namespaces.len(),
            config.baseline_year,
            config.max_concurrent_fetches
        );

        let permits = config.max_concurrent_fetches.min(Semaphore::MAX_PERMITS);
        Ok(Self {
            fetcher: Fetcher {
                provider,
                limit: Arc::new(Semaphore::new(permits)),
            },
            cache: Arc::new(cache),
            config: Arc::new(config),
        })
    }

    /// 清空所有快取
    pub fn shutdown(&self) {
        self.cache.clear_all();
        tracing::info!("變動引擎已關閉，快取已清空");
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.fetcher.provider
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        self.cache.stats()
    }

    /// 相鄰年度差異（只列出有變動的機關）
    pub async fn differences(&self, start_year: i32, end_year: i32) -> Result<Arc<Vec<YearDiff>>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("differences").with_param(start_year).with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(DIFFERENCES_NAMESPACE, key, move || async move {
            let started = Instant::now();
            let snapshots = fetcher.range(start_year..=end_year).await?;
            let diffs: Vec<YearDiff> = snapshots
                .windows(2)
                .map(|pair| DiffCalculator::between(&pair[0], &pair[1]))
                .collect();

            tracing::info!(
                "差異計算完成：{}-{}，{} 組年度，耗時 {:?}",
                start_year,
                end_year,
                diffs.len(),
                started.elapsed()
            );
            Ok(diffs)
        })
        .await
    }

    /// 相鄰年度差異計數
    pub async fn simple_differences(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Arc<Vec<SimpleDifference>>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("simple_differences")
            .with_param(start_year)
            .with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(DIFFERENCES_NAMESPACE, key, move || async move {
            let snapshots = fetcher.range(start_year..=end_year).await?;
            let laws = fetcher.laws(start_year..=end_year).await?;

            let counts: Vec<SimpleDifference> = snapshots
                .windows(2)
                .zip(laws.iter().skip(1))
                .map(|(pair, &total_laws)| SimpleDifference {
                    previous_year: pair[0].year,
                    year: pair[1].year,
                    counts: DiffCalculator::between(&pair[0], &pair[1]).totals,
                    total_laws,
                })
                .collect();

            tracing::info!("差異計數完成：{}-{}，{} 組年度", start_year, end_year, counts.len());
            Ok(counts)
        })
        .await
    }

    /// 兩個任意年度間的新增/刪除明細
    ///
    /// 由 `year1` 比較到 `year2`，不要求先後：`year1` 較晚時，新增即為回溯到較早年度後才有的項目。
    pub async fn detailed_changes(&self, year1: i32, year2: i32) -> Result<Arc<DetailedChanges>> {
        let key = CacheKey::new("detailed_changes").with_param(year1).with_param(year2);
        let fetcher = self.fetcher.clone();

        self.cached(DIFFERENCES_NAMESPACE, key, move || async move {
            let (from, to) = tokio::try_join!(fetcher.snapshot(year1), fetcher.snapshot(year2))?;
            let changes = DiffCalculator::detailed(&from, &to);

            tracing::info!(
                "明細差異完成：{} → {}，新增條文 {} 條，刪除條文 {} 條",
                year1,
                year2,
                changes.added.rules.len(),
                changes.removed.rules.len()
            );
            Ok(changes)
        })
        .await
    }

    pub async fn total_rules_by_year(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Arc<Vec<YearRuleTotal>>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("total_rules_by_year")
            .with_param(start_year)
            .with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(AGGREGATES_NAMESPACE, key, move || async move {
            let snapshots = fetcher.range(start_year..=end_year).await?;
            Ok(snapshots.iter().map(AggregateCalculator::rule_total).collect::<Vec<_>>())
        })
        .await
    }

    pub async fn total_chapters_by_year(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Arc<ChapterTotals>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("total_chapters_by_year")
            .with_param(start_year)
            .with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(AGGREGATES_NAMESPACE, key, move || async move {
            let snapshots = fetcher.range(start_year..=end_year).await?;
            Ok(AggregateCalculator::chapter_totals(&snapshots))
        })
        .await
    }

    /// 每年新增條文數；範圍內第一年為 None
    pub async fn new_rules_count_by_year(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Arc<Vec<NewRulesCount>>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("new_rules_count_by_year")
            .with_param(start_year)
            .with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(AGGREGATES_NAMESPACE, key, move || async move {
            let snapshots = fetcher.range(start_year..=end_year).await?;
            let laws = fetcher.laws(start_year..=end_year).await?;
            Ok(AggregateCalculator::new_rules_by_year(&snapshots, &laws))
        })
        .await
    }

    /// 相鄰年度的機關出現/消失
    pub async fn agency_timeline(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Arc<Vec<AgencyTimelineEntry>>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("agency_timeline")
            .with_param(start_year)
            .with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(AGGREGATES_NAMESPACE, key, move || async move {
            let snapshots = fetcher.range(start_year..=end_year).await?;
            Ok(TimelineCalculator::timeline(&snapshots))
        })
        .await
    }

    pub async fn total_rule_volume_by_year(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> Result<Arc<Vec<YearRuleVolume>>> {
        self.check_span(start_year, end_year)?;
        let key = CacheKey::new("total_rule_volume_by_year")
            .with_param(start_year)
            .with_param(end_year);
        let fetcher = self.fetcher.clone();

        self.cached(AGGREGATES_NAMESPACE, key, move || async move {
            let snapshots = fetcher.range(start_year..=end_year).await?;
            Ok(snapshots.iter().map(AggregateCalculator::rule_volume).collect::<Vec<_>>())
        })
        .await
    }

    /// 各機關最新年度統計與基準年度以來的累計
    ///
    /// 最新年度取資料提供者回報的最大年度；提供者沒有任何年度時回傳空清單。
    pub async fn agency_stats(&self) -> Result<Arc<Vec<AgencyStats>>> {
        let baseline_year = self.config.baseline_year;
        let key = CacheKey::new("agency_stats").with_param(baseline_year);
        let fetcher = self.fetcher.clone();

        self.cached(AGGREGATES_NAMESPACE, key, move || async move {
            let years = fetcher.available_years().await?;
            let Some(&latest_year) = years.iter().max() else {
                tracing::warn!("資料提供者沒有任何年度資料");
                return Ok(Vec::new());
            };

            // 缺資料的年度為空快照，只需讀取有資料的年度
            let history_years: Vec<i32> = years
                .iter()
                .copied()
                .filter(|&year| year >= baseline_year && year <= latest_year)
                .collect();
            let history = fetcher.years(history_years).await?;

            let fetched;
            let latest = match history.last() {
                Some(snapshot) if snapshot.year == latest_year => snapshot,
                _ => {
                    fetched = fetcher.snapshot(latest_year).await?;
                    &fetched
                }
            };

            let stats = AgencyStatsCalculator::compute(&history, latest, baseline_year);
            tracing::info!(
                "機關統計完成：{} 個機關，最新年度 {}，基準年度 {}",
                stats.len(),
                latest_year,
                baseline_year
            );
            Ok(stats)
        })
        .await
    }

    pub async fn agencies_by_year(&self, year: i32) -> Result<Arc<Vec<AgencySummary>>> {
        let key = CacheKey::new("agencies_by_year").with_param(year);
        let fetcher = self.fetcher.clone();

        self.cached(AGENCIES_NAMESPACE, key, move || async move {
            let snapshot = fetcher.snapshot(year).await?;
            Ok(ListingCalculator::agencies(&snapshot))
        })
        .await
    }

    /// 機關於該年度的章節；機關當年無資料時回傳 NotFound（不快取）
    pub async fn chapters_for_agency(
        &self,
        agency_id: &str,
        year: i32,
    ) -> Result<Arc<Vec<ChapterSummary>>> {
        let key = CacheKey::new("chapters_for_agency")
            .with_param(agency_id)
            .with_param(year);
        let fetcher = self.fetcher.clone();
        let agency_id = agency_id.to_string();

        self.cached(AGENCIES_NAMESPACE, key, move || async move {
            let snapshot = fetcher.snapshot(year).await?;
            ListingCalculator::chapters(&snapshot, &agency_id)
        })
        .await
    }

    /// 章節的巢狀條文；機關或章節不存在時回傳 NotFound（不快取）
    pub async fn rules_for_chapter(
        &self,
        agency_id: &str,
        year: i32,
        chapter_id: &str,
    ) -> Result<Arc<Vec<RuleNode>>> {
        let key = CacheKey::new("rules_for_chapter")
            .with_param(agency_id)
            .with_param(year)
            .with_param(chapter_id);
        let fetcher = self.fetcher.clone();
        let agency_id = agency_id.to_string();
        let chapter_id = chapter_id.to_string();

        self.cached(AGENCIES_NAMESPACE, key, move || async move {
            let snapshot = fetcher.snapshot(year).await?;
            ListingCalculator::rules(&snapshot, &agency_id, &chapter_id)
        })
        .await
    }

    /// 所有有資料年度中出現過的機關
    pub async fn all_agencies(&self) -> Result<Arc<Vec<AgencyRecord>>> {
        let key = CacheKey::new("all_agencies");
        let fetcher = self.fetcher.clone();

        self.cached(AGENCIES_NAMESPACE, key, move || async move {
            let years = fetcher.available_years().await?;
            let snapshots = fetcher.years(years).await?;
            let records = ListingCalculator::all_agencies(&snapshots);

            tracing::info!("機關總表完成：{} 個機關，{} 個年度", records.len(), snapshots.len());
            Ok(records)
        })
        .await
    }

    /// 資料來源的機關年度代理鍵
    pub async fn agency_year_id(&self, agency_id: &str, year: i32) -> Result<u64> {
        tracing::debug!("查詢機關年度代理鍵：{} {}", agency_id, year);
        self.fetcher.agency_year_id(agency_id, year).await
    }

    /// 年度範圍須遞增且不超過設定的跨度
    fn check_span(&self, start_year: i32, end_year: i32) -> Result<()> {
        check_range(start_year, end_year)?;
        let span = i64::from(end_year) - i64::from(start_year) + 1;
        if span > i64::from(self.config.max_year_span) {
            tracing::warn!(
                "年度範圍 {}-{} 超過上限 {} 年",
                start_year,
                end_year,
                self.config.max_year_span
            );
            return Err(RegError::InvalidRange {
                start: start_year,
                end: end_year,
            });
        }
        Ok(())
    }

    async fn cached<T, F, Fut>(&self, namespace: &str, key: CacheKey, compute: F) -> Result<Arc<T>>
    where
        T: Cached,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let label = key.to_string();
        let analysis = self
            .cache
            .get_or_compute(namespace, key, move || async move {
                compute().await.map(|value| T::into_analysis(Arc::new(value)))
            })
            .await?;

        T::from_analysis(analysis)
            .ok_or_else(|| RegError::Configuration(format!("快取 {namespace} 中 {label} 的結果型別不符")))
    }
}

/// 資料提供者與全引擎共用的讀取配額
///
/// 每次向提供者讀取前先取得一個許可，任一時刻的讀取數不超過 `max_concurrent_fetches`。
struct Fetcher<P> {
    provider: Arc<P>,
    limit: Arc<Semaphore>,
}

impl<P> Clone for Fetcher<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            limit: Arc::clone(&self.limit),
        }
    }
}

impl<P: SnapshotProvider> Fetcher<P> {
    async fn permit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.limit)
            .acquire_owned()
            .await
            .map_err(|e| RegError::Provider(format!("讀取配額已關閉: {e}")))
    }

    async fn snapshot(&self, year: i32) -> Result<Snapshot> {
        let _permit = self.permit().await?;
        self.provider.get_snapshot(year).await
    }

    async fn available_years(&self) -> Result<Vec<i32>> {
        let _permit = self.permit().await?;
        self.provider.available_years().await
    }

    async fn agency_year_id(&self, agency_id: &str, year: i32) -> Result<u64> {
        let _permit = self.permit().await?;
        self.provider.get_agency_year_id(agency_id, year).await
    }

    /// 並行讀取範圍內每一年度的快照（依年度排序）
    async fn range(&self, years: RangeInclusive<i32>) -> Result<Vec<Snapshot>> {
        self.years(years).await
    }

    /// 並行讀取指定年度的快照，回傳順序與年度遞增順序一致
    async fn years(&self, years: impl IntoIterator<Item = i32>) -> Result<Vec<Snapshot>> {
        let mut tasks = JoinSet::new();
        for year in years {
            let fetcher = self.clone();
            tasks.spawn(async move { fetcher.snapshot(year).await });
        }

        let mut snapshots = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let snapshot = joined.map_err(|e| RegError::Provider(format!("快照讀取任務失敗: {e}")))??;
            snapshots.push(snapshot);
        }
        snapshots.sort_by_key(|snapshot| snapshot.year);

        tracing::debug!("讀取快照 {} 個", snapshots.len());
        Ok(snapshots)
    }

    async fn laws(&self, years: RangeInclusive<i32>) -> Result<Vec<u64>> {
        let mut laws = Vec::new();
        for year in years {
            let _permit = self.permit().await?;
            laws.push(self.provider.law_count(year).await?);
        }
        Ok(laws)
    }
}
