//! # Regcode
//!
//! 法規年度變動分析：資料模型、快取層與變動引擎的統一入口

pub mod cli;

pub use regcode_cache;
pub use regcode_core;
pub use regcode_engine;

pub use regcode_cache::{CacheKey, CacheRegistry, CacheStats};
pub use regcode_core::{
    EngineConfig, JsonDirectoryProvider, MemoryProvider, RegError, Result, Snapshot,
    SnapshotProvider,
};
pub use regcode_engine::ChangeEngine;
