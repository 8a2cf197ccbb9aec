//! 有界 LRU 命名空間與單次計算（single-flight）
//!
//! 每個命名空間各自持有鎖，彼此不互相阻塞。同一鍵同時只會有一個計算在進行，
//! 其餘呼叫端等待同一結果。計算在背景任務中執行，呼叫端取消不會中止計算。

use parking_lot::Mutex;
use regcode_core::{RegError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::key::CacheKey;

/// 進行中計算的結果槽；None 表示尚未完成
type FlightSlot<V> = Option<Result<V>>;

/// 命名空間統計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub namespace: String,
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// 等待他人進行中計算的次數
    pub coalesced: u64,
}

impl CacheStats {
    /// 命中率（無查詢時為 0）
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot<V> {
    value: V,
    tick: u64,
}

/// LRU 狀態：`order` 以存取序號排列，最小者最久未用
struct LruState<V> {
    entries: HashMap<CacheKey, Slot<V>>,
    order: BTreeMap<u64, CacheKey>,
    tick: u64,
    /// 每次清空遞增；清空前開始的計算不得寫回
    generation: u64,
}

impl<V> LruState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
            generation: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// 更新存取順序
    fn touch(&mut self, key: &CacheKey) -> Option<&V> {
        let tick = self.next_tick();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        slot.tick = tick;
        self.order.insert(tick, key.clone());
        Some(&slot.value)
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.generation += 1;
    }
}

/// 有界 LRU 快取命名空間
pub struct Namespace<V> {
    name: String,
    max_size: usize,
    state: Mutex<LruState<V>>,
    flights: Mutex<HashMap<CacheKey, watch::Receiver<FlightSlot<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    coalesced: AtomicU64,
}

impl<V> Namespace<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// 創建命名空間；容量為 0 視為設定錯誤
    pub fn new(name: impl Into<String>, max_size: usize) -> Result<Self> {
        let name = name.into();
        if max_size == 0 {
            return Err(RegError::Configuration(format!(
                "命名空間 {name} 的容量必須大於 0"
            )));
        }

        Ok(Self {
            name,
            max_size,
            state: Mutex::new(LruState::new()),
            flights: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 查詢；命中時更新存取順序。未命中不是錯誤。
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let value = self.state.lock().touch(key).cloned();
        match &value {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("快取命中 {}: {}", self.name, key);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("快取未命中 {}: {}", self.name, key);
            }
        }
        value
    }

    /// 寫入或覆蓋；超出容量時先淘汰最久未用項目
    pub fn put(&self, key: CacheKey, value: V) {
        let mut state = self.state.lock();
        self.insert(&mut state, key, value);
    }

    /// 只在開始計算後未曾清空時寫入
    fn put_if_generation(&self, key: CacheKey, value: V, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        self.insert(&mut state, key, value);
        true
    }

    fn insert(&self, state: &mut LruState<V>, key: CacheKey, value: V) {
        let tick = state.next_tick();

        if let Some(slot) = state.entries.get_mut(&key) {
            let old_tick = slot.tick;
            slot.value = value;
            slot.tick = tick;
            state.order.remove(&old_tick);
            state.order.insert(tick, key);
            return;
        }

        while state.entries.len() >= self.max_size {
            match state.evict_oldest() {
                Some(evicted) => {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("快取淘汰 {}: {}", self.name, evicted);
                }
                None => break,
            }
        }

        state.order.insert(tick, key.clone());
        state.entries.insert(key, Slot { value, tick });
    }

    /// 是否存在（不影響存取順序）
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// 依存取順序列出鍵，最久未用者在前
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        self.state.lock().order.values().cloned().collect()
    }

    /// 清空項目；進行中的計算仍會完成並回傳給呼叫端，但結果不再寫入
    pub fn clear(&self) {
        self.state.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            namespace: self.name.clone(),
            capacity: self.max_size,
            len: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// 取得快取值，或執行 `compute` 並寫入
    ///
    /// 同一鍵同時只執行一次 `compute`；失敗結果不寫入快取。
    /// 必須在 tokio 執行環境中呼叫。
    pub async fn get_or_compute<F, Fut>(self: &Arc<Self>, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let mut receiver = {
            let mut flights = self.flights.lock();
            match flights.get(&key) {
                Some(receiver) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("等待進行中的計算 {}: {}", self.name, key);
                    receiver.clone()
                }
                None => {
                    // 計算可能在首次查詢後才完成
                    let (finished, generation) = {
                        let mut state = self.state.lock();
                        (state.touch(&key).cloned(), state.generation)
                    };
                    if let Some(value) = finished {
                        return Ok(value);
                    }

                    let (sender, receiver) = watch::channel(None);
                    flights.insert(key.clone(), receiver.clone());

                    tracing::debug!("開始計算 {}: {}", self.name, key);
                    let namespace = Arc::clone(self);
                    tokio::spawn(namespace.run_flight(key.clone(), generation, compute, sender));
                    receiver
                }
            }
        };

        let finished = receiver.wait_for(Option::is_some).await;
        let outcome = match finished {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };

        outcome.unwrap_or_else(|| {
            Err(RegError::Provider(format!(
                "計算意外中止 {}: {}",
                self.name, key
            )))
        })
    }

    async fn run_flight<F, Fut>(
        self: Arc<Self>,
        key: CacheKey,
        generation: u64,
        compute: F,
        sender: watch::Sender<FlightSlot<V>>,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let guard = FlightGuard {
            namespace: &self,
            key: &key,
        };

        let start_time = std::time::Instant::now();
        let outcome = compute().await;

        match &outcome {
            Ok(value) => {
                if self.put_if_generation(key.clone(), value.clone(), generation) {
                    tracing::debug!("計算完成 {}: {}，耗時 {:?}", self.name, key, start_time.elapsed());
                } else {
                    tracing::debug!("計算期間快取已清空，不寫入 {}: {}", self.name, key);
                }
            }
            Err(e) => {
                tracing::warn!("計算失敗 {}: {}: {}", self.name, key, e);
            }
        }

        // 先移除進行中標記再通知，新呼叫端會直接看到快取
        drop(guard);
        sender.send_replace(Some(outcome));
    }
}

/// 離開計算（含 panic）時移除進行中標記
struct FlightGuard<'a, V> {
    namespace: &'a Namespace<V>,
    key: &'a CacheKey,
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        self.namespace.flights.lock().remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(n: i64) -> CacheKey {
        CacheKey::new("op").with_param(n)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = Namespace::<u32>::new("empty", 0);
        assert!(matches!(result, Err(RegError::Configuration(_))));
    }

    #[test]
    fn test_miss_then_hit() {
        let ns = Namespace::new("test", 4).unwrap();
        assert_eq!(ns.get(&key(1)), None);

        ns.put(key(1), "one".to_string());
        assert_eq!(ns.get(&key(1)).as_deref(), Some("one"));

        let stats = ns.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[rstest]
    #[case(1, 0)]
    #[case(3, 1)]
    #[case(3, 5)]
    #[case(8, 8)]
    fn test_bounded_to_most_recent(#[case] max_size: usize, #[case] extra: usize) {
        let ns = Namespace::new("bounded", max_size).unwrap();
        let total = (max_size + extra) as i64;
        for n in 0..total {
            ns.put(key(n), n);
        }

        assert_eq!(ns.len(), max_size);
        let expected: Vec<CacheKey> = (total - max_size as i64..total).map(key).collect();
        assert_eq!(ns.keys_by_recency(), expected);
        assert_eq!(ns.stats().evictions, extra as u64);
    }

    #[test]
    fn test_lookup_refreshes_recency() {
        let ns = Namespace::new("lru", 2).unwrap();
        ns.put(key(1), 1);
        ns.put(key(2), 2);

        // 存取 1 後，2 成為最久未用
        assert_eq!(ns.get(&key(1)), Some(1));
        ns.put(key(3), 3);

        assert!(ns.contains(&key(1)));
        assert!(!ns.contains(&key(2)));
        assert!(ns.contains(&key(3)));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let ns = Namespace::new("overwrite", 2).unwrap();
        ns.put(key(1), 1);
        ns.put(key(2), 2);
        ns.put(key(1), 10);

        assert_eq!(ns.len(), 2);
        assert_eq!(ns.get(&key(1)), Some(10));
        assert_eq!(ns.keys_by_recency(), vec![key(2), key(1)]);
        assert_eq!(ns.stats().evictions, 0);
    }

    #[test]
    fn test_clear() {
        let ns = Namespace::new("clear", 4).unwrap();
        ns.put(key(1), 1);
        ns.clear();
        assert!(ns.is_empty());
        assert!(ns.keys_by_recency().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_compute_caches_value() {
        let ns = Arc::new(Namespace::new("compute", 4).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let value = ns
                .get_or_compute(key(7), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(49)
                })
                .await
                .unwrap();
            assert_eq!(value, 49);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_compute_not_cached() {
        let ns = Arc::new(Namespace::<u32>::new("failing", 4).unwrap());

        let first = ns
            .get_or_compute(key(1), || async { Err(RegError::Provider("timeout".to_string())) })
            .await;
        assert_eq!(first, Err(RegError::Provider("timeout".to_string())));
        assert!(!ns.contains(&key(1)));

        let retry = ns.get_or_compute(key(1), || async { Ok(5) }).await;
        assert_eq!(retry, Ok(5));
        assert!(ns.contains(&key(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalesced_waiters_share_failure() {
        let ns = Arc::new(Namespace::<u64>::new("shared-failure", 4).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ns = Arc::clone(&ns);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                ns.get_or_compute(key(1), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(RegError::Provider("unavailable".to_string()))
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                Err(RegError::Provider("unavailable".to_string()))
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!ns.contains(&key(1)));
        assert!(ns.stats().coalesced >= 1);

        let retry = ns.get_or_compute(key(1), || async { Ok(9) }).await;
        assert_eq!(retry, Ok(9));
        assert!(ns.contains(&key(1)));
    }

    #[tokio::test]
    async fn test_clear_during_flight_discards_result() {
        let ns = Arc::new(Namespace::new("cleared", 4).unwrap());

        let caller = {
            let ns = Arc::clone(&ns);
            tokio::spawn(async move {
                ns.get_or_compute(key(1), || async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(3u32)
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        ns.clear();

        // 呼叫端仍取得結果，但快取維持清空
        assert_eq!(caller.await.unwrap(), Ok(3));
        assert!(ns.is_empty());

        // 清空後開始的計算照常寫入
        let value = ns.get_or_compute(key(1), || async { Ok(4u32) }).await;
        assert_eq!(value, Ok(4));
        assert!(ns.contains(&key(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_coalesce() {
        let ns = Arc::new(Namespace::new("coalesce", 4).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ns = Arc::clone(&ns);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                ns.get_or_compute(key(1), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(42u64)
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_abort_computation() {
        let ns = Arc::new(Namespace::new("cancel", 4).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let ns = Arc::clone(&ns);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                ns.get_or_compute(key(1), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(1u8)
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        let calls_again = Arc::clone(&calls);
        let value = ns
            .get_or_compute(key(1), move || async move {
                calls_again.fetch_add(1, Ordering::SeqCst);
                Ok(2u8)
            })
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(ns.contains(&key(1)));
    }
}
