//! # Regcode Cache
//!
//! 命名空間化、容量有界的記憶化快取層（不含領域知識）

pub mod key;
pub mod namespace;
pub mod registry;

// Re-export 主要類型
pub use key::{CacheKey, KeyParam};
pub use namespace::{CacheStats, Namespace};
pub use registry::CacheRegistry;
