//! # Regcode Change Engine
//!
//! 年度快照差異與彙總計算，並透過快取層記憶化結果

pub mod aggregate;
pub mod diff;
pub mod engine;
pub mod listing;
pub mod stats;
pub mod timeline;

// Re-export 主要類型
pub use aggregate::{
    AggregateCalculator, ChapterTotals, NewRulesCount, YearChapterTotal, YearRuleTotal,
    YearRuleVolume,
};
pub use diff::{
    AgencyChapterRef, AgencyDiff, AgencyRef, AgencyRuleRef, AgencyStatus, ChangeSet, ChapterRef,
    DetailedChanges, DiffCalculator, DiffCounts, RuleRef, YearDiff,
};
pub use engine::{Analysis, ChangeEngine, SimpleDifference};
pub use listing::{AgencyRecord, AgencySummary, ChapterSummary, ListingCalculator, RuleNode};
pub use stats::{AgencyStats, AgencyStatsCalculator, AgencyYearStats, CumulativeStats};
pub use timeline::{AgencyTimelineEntry, TimelineCalculator};
