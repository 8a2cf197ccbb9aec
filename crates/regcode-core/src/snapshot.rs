//! 年度快照

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agency::AgencyYear;

/// 單一年度的完整法規樹：機關 → 章節 → 條文
///
/// 取得後即不可變，引擎只從中衍生檢視。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub year: i32,

    /// 機關年度（依 agency_id 排序）
    agencies: BTreeMap<String, AgencyYear>,
}

impl Snapshot {
    /// 空快照（該年度無資料）
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            agencies: BTreeMap::new(),
        }
    }

    /// 建構器模式：加入機關年度
    pub fn with_agency(mut self, agency_year: AgencyYear) -> Self {
        self.add_agency(agency_year);
        self
    }

    /// 加入機關年度；同 agency_id 者覆蓋
    pub fn add_agency(&mut self, mut agency_year: AgencyYear) -> Option<AgencyYear> {
        agency_year.year = self.year;
        self.agencies
            .insert(agency_year.agency_id().to_string(), agency_year)
    }

    pub fn agency(&self, agency_id: &str) -> Option<&AgencyYear> {
        self.agencies.get(agency_id)
    }

    pub fn agencies(&self) -> impl Iterator<Item = &AgencyYear> {
        self.agencies.values()
    }

    pub fn agency_ids(&self) -> impl Iterator<Item = &str> {
        self.agencies.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
    }

    pub fn agency_count(&self) -> usize {
        self.agencies.len()
    }

    pub fn total_chapters(&self) -> usize {
        self.agencies.values().map(AgencyYear::chapter_count).sum()
    }

    /// 條文總數（含子條文）
    pub fn total_rules(&self) -> usize {
        self.agencies.values().map(AgencyYear::rule_count).sum()
    }

    pub fn total_word_count(&self) -> u64 {
        self.agencies.values().map(AgencyYear::word_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agency::{Agency, Chapter};
    use crate::rule::{Rule, RuleTree};

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty(1999);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_rules(), 0);
        assert_eq!(snapshot.total_word_count(), 0);
    }

    #[test]
    fn test_add_agency_aligns_year() {
        let mut tree = RuleTree::new();
        let root = tree.add_root(Rule::new("1.1").with_word_count(12));
        tree.add_child(root, Rule::new("1.1(1)").with_word_count(8)).unwrap();

        let snapshot = Snapshot::empty(2021).with_agency(
            AgencyYear::new(Agency::new("B", "Board"), 1900)
                .with_chapter(Chapter::new("1", "General").with_rules(tree)),
        );

        let agency = snapshot.agency("B").unwrap();
        assert_eq!(agency.year, 2021);
        assert_eq!(snapshot.total_chapters(), 1);
        assert_eq!(snapshot.total_rules(), 2);
        assert_eq!(snapshot.total_word_count(), 20);
        assert_eq!(snapshot.agency_ids().collect::<Vec<_>>(), vec!["B"]);
    }
}
