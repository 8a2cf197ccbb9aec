//! 機關統計：最新年度與基準年度以來的累計

use regcode_core::{AgencyYear, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// 單一年度的機關統計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyYearStats {
    pub year: i32,
    pub chapters: usize,
    pub rules: usize,
    pub word_count: u64,
}

impl AgencyYearStats {
    fn from_agency_year(agency_year: &AgencyYear) -> Self {
        Self {
            year: agency_year.year,
            chapters: agency_year.chapter_count(),
            rules: agency_year.rule_count(),
            word_count: agency_year.word_count(),
        }
    }
}

/// 基準年度起的累計統計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CumulativeStats {
    pub baseline_year: i32,
    pub through_year: i32,
    /// 有資料的年度數
    pub years_present: usize,
    pub rules: usize,
    pub word_count: u64,
}

/// 機關統計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyStats {
    pub agency_id: String,
    pub agency_name: String,
    /// 最新年度統計；該機關最新年度無資料時為 None
    pub latest_year_stats: Option<AgencyYearStats>,
    pub cumulative_since_baseline: CumulativeStats,
}

/// 機關統計計算器
pub struct AgencyStatsCalculator;

impl AgencyStatsCalculator {
    /// 計算所有機關的統計
    ///
    /// `history` 為基準年度至最新年度的快照，範圍外的年度不計入累計。
    pub fn compute(history: &[Snapshot], latest: &Snapshot, baseline_year: i32) -> Vec<AgencyStats> {
        let counted: Vec<&Snapshot> = history
            .iter()
            .filter(|s| s.year >= baseline_year && s.year <= latest.year)
            .collect();

        // agency_id → 名稱（較新年度覆蓋）
        let mut agencies: BTreeMap<&str, &str> = BTreeMap::new();
        for snapshot in counted.iter().copied().chain(std::iter::once(latest)) {
            for agency_year in snapshot.agencies() {
                agencies.insert(agency_year.agency_id(), &agency_year.agency.name);
            }
        }

        agencies
            .into_iter()
            .map(|(agency_id, agency_name)| {
                let mut cumulative = CumulativeStats {
                    baseline_year,
                    through_year: latest.year,
                    years_present: 0,
                    rules: 0,
                    word_count: 0,
                };

                for agency_year in counted.iter().filter_map(|s| s.agency(agency_id)) {
                    cumulative.years_present += 1;
                    cumulative.rules += agency_year.rule_count();
                    cumulative.word_count += agency_year.word_count();
                }

                AgencyStats {
                    agency_id: agency_id.to_string(),
                    agency_name: agency_name.to_string(),
                    latest_year_stats: latest.agency(agency_id).map(AgencyYearStats::from_agency_year),
                    cumulative_since_baseline: cumulative,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regcode_core::{Agency, Chapter, Rule, RuleTree};

    fn snapshot(year: i32, agencies: &[(&str, u64)]) -> Snapshot {
        let mut snapshot = Snapshot::empty(year);
        for (id, words) in agencies {
            let mut tree = RuleTree::new();
            tree.add_root(Rule::new("1.1").with_word_count(*words));
            snapshot.add_agency(
                AgencyYear::new(Agency::new(*id, format!("Agency {id}")), year)
                    .with_chapter(Chapter::new("1", "General").with_rules(tree)),
            );
        }
        snapshot
    }

    #[test]
    fn test_latest_and_cumulative() {
        let history = vec![
            snapshot(2019, &[("A", 10)]),
            snapshot(2020, &[("A", 20), ("B", 5)]),
            snapshot(2021, &[("A", 30)]),
        ];
        let latest = history[2].clone();

        let stats = AgencyStatsCalculator::compute(&history, &latest, 2020);
        assert_eq!(stats.len(), 2);

        let a = &stats[0];
        assert_eq!(a.agency_id, "A");
        assert_eq!(a.latest_year_stats.as_ref().unwrap().word_count, 30);
        assert_eq!(a.cumulative_since_baseline.years_present, 2);
        assert_eq!(a.cumulative_since_baseline.word_count, 50);
        assert_eq!(a.cumulative_since_baseline.rules, 2);

        let b = &stats[1];
        assert_eq!(b.agency_id, "B");
        assert!(b.latest_year_stats.is_none());
        assert_eq!(b.cumulative_since_baseline.word_count, 5);
        assert_eq!(b.cumulative_since_baseline.through_year, 2021);
    }

    #[test]
    fn test_baseline_after_latest() {
        let latest = snapshot(2010, &[("A", 7)]);
        let stats = AgencyStatsCalculator::compute(&[], &latest, 2015);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].latest_year_stats.as_ref().unwrap().year, 2010);
        assert_eq!(stats[0].cumulative_since_baseline.years_present, 0);
    }

    #[test]
    fn test_empty_history() {
        let stats = AgencyStatsCalculator::compute(&[], &Snapshot::empty(2020), 1998);
        assert!(stats.is_empty());
    }
}
