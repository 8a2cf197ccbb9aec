//! 機關出現/消失時間軸

use regcode_core::Snapshot;
use serde::Serialize;

use crate::diff::AgencyRef;

/// 相鄰年度的機關變動
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyTimelineEntry {
    pub previous_year: i32,
    pub year: i32,
    /// 較新年度才有的機關
    pub appeared: Vec<AgencyRef>,
    /// 較舊年度才有的機關
    pub disappeared: Vec<AgencyRef>,
}

impl AgencyTimelineEntry {
    pub fn has_changes(&self) -> bool {
        !self.appeared.is_empty() || !self.disappeared.is_empty()
    }
}

/// 時間軸計算器
pub struct TimelineCalculator;

impl TimelineCalculator {
    pub fn between(previous: &Snapshot, current: &Snapshot) -> AgencyTimelineEntry {
        AgencyTimelineEntry {
            previous_year: previous.year,
            year: current.year,
            appeared: Self::only_in(current, previous),
            disappeared: Self::only_in(previous, current),
        }
    }

    /// 依序計算每對相鄰年度
    pub fn timeline(snapshots: &[Snapshot]) -> Vec<AgencyTimelineEntry> {
        snapshots
            .windows(2)
            .map(|pair| Self::between(&pair[0], &pair[1]))
            .collect()
    }

    /// `left` 有、`right` 沒有的機關（依 agency_id 排序）
    fn only_in(left: &Snapshot, right: &Snapshot) -> Vec<AgencyRef> {
        left.agencies()
            .filter(|agency| right.agency(agency.agency_id()).is_none())
            .map(|agency| AgencyRef {
                agency_id: agency.agency.agency_id.clone(),
                agency_name: agency.agency.name.clone(),
            })
            .collect()
    }
}
