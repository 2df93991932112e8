// ==========================================
// 雏鸡订单分配系统 - 交付日期锁
// ==========================================
// 职责: 同一交付日期的分配/晋升/下单/取消串行执行，不同日期并行
// 红线: 多日期加锁必须按日期升序获取，避免死锁
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// 锁表超过该规模时清理空闲条目
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct DateLockRegistry {
    locks: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl DateLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, date: NaiveDate) -> EngineResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        if locks.len() > PRUNE_THRESHOLD {
            // 只剩注册表自身持有的条目视为空闲
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        Ok(locks
            .entry(date)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 持有单个日期锁执行闭包
    pub fn with_date<T>(&self, date: NaiveDate, f: impl FnOnce() -> T) -> EngineResult<T> {
        let lock = self.lock_for(date)?;
        let _guard = lock
            .lock()
            .map_err(|e| EngineError::LockError(format!("date={}: {}", date, e)))?;
        Ok(f())
    }

    /// 持有多个日期锁执行闭包（按日期升序加锁，自动去重）
    pub fn with_dates<T>(
        &self,
        dates: impl IntoIterator<Item = NaiveDate>,
        f: impl FnOnce() -> T,
    ) -> EngineResult<T> {
        let ordered: BTreeSet<NaiveDate> = dates.into_iter().collect();
        let locks = ordered
            .iter()
            .map(|d| self.lock_for(*d))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut guards: Vec<MutexGuard<()>> = Vec::with_capacity(locks.len());
        for lock in &locks {
            guards.push(
                lock.lock()
                    .map_err(|e| EngineError::LockError(e.to_string()))?,
            );
        }

        let result = f();
        drop(guards);
        Ok(result)
    }

    /// 当前登记的日期数
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_date_is_serialized() {
        let registry = Arc::new(DateLockRegistry::new());
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    registry
                        .with_date(date, || {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(10));
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_with_dates_dedups() {
        let registry = DateLockRegistry::new();
        let d = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let value = registry.with_dates(vec![d, d], || 7).unwrap();
        assert_eq!(value, 7);
        assert_eq!(registry.len(), 1);
    }
}
