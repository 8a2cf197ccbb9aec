//! 年度彙總：條文數、章節數、字數、新增條文數

use regcode_core::Snapshot;
use serde::Serialize;
use std::collections::HashSet;

/// 年度條文總數
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRuleTotal {
    pub year: i32,
    pub total_rules: usize,
}

/// 年度章節總數
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearChapterTotal {
    pub year: i32,
    pub total_chapters: usize,
}

/// 範圍內各年度章節數及總計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterTotals {
    pub years: Vec<YearChapterTotal>,
    pub total_chapters: usize,
}

/// 年度條文量（條文數 + 字數）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearRuleVolume {
    pub year: i32,
    pub total_rules: usize,
    pub total_word_count: u64,
}

/// 年度新增條文數；範圍內第一年沒有前一年基準，為 None
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRulesCount {
    pub year: i32,
    pub new_rules_count: Option<usize>,
    pub total_laws: u64,
}

/// 彙總計算器
pub struct AggregateCalculator;

impl AggregateCalculator {
    pub fn rule_total(snapshot: &Snapshot) -> YearRuleTotal {
        YearRuleTotal {
            year: snapshot.year,
            total_rules: snapshot.total_rules(),
        }
    }

    pub fn chapter_total(snapshot: &Snapshot) -> YearChapterTotal {
        YearChapterTotal {
            year: snapshot.year,
            total_chapters: snapshot.total_chapters(),
        }
    }

    pub fn chapter_totals(snapshots: &[Snapshot]) -> ChapterTotals {
        let years: Vec<YearChapterTotal> = snapshots.iter().map(Self::chapter_total).collect();
        let total_chapters = years.iter().map(|y| y.total_chapters).sum();
        ChapterTotals { years, total_chapters }
    }

    pub fn rule_volume(snapshot: &Snapshot) -> YearRuleVolume {
        YearRuleVolume {
            year: snapshot.year,
            total_rules: snapshot.total_rules(),
            total_word_count: snapshot.total_word_count(),
        }
    }

    /// 全年度條文編號集合（跨機關、章節攤平）
    pub fn rule_identifiers(snapshot: &Snapshot) -> HashSet<&str> {
        snapshot
            .agencies()
            .flat_map(|agency| agency.chapters())
            .flat_map(|chapter| chapter.rules.iter().map(|(_, rule)| rule.identifier.as_str()))
            .collect()
    }

    /// `current` 中有、`previous` 中沒有的條文編號數
    pub fn new_rules(previous: &Snapshot, current: &Snapshot) -> usize {
        let previous_ids = Self::rule_identifiers(previous);
        Self::rule_identifiers(current)
            .iter()
            .filter(|id| !previous_ids.contains(*id))
            .count()
    }

    /// 依序計算每年新增條文數，`laws` 與 `snapshots` 一一對應
    pub fn new_rules_by_year(snapshots: &[Snapshot], laws: &[u64]) -> Vec<NewRulesCount> {
        snapshots
            .iter()
            .enumerate()
            .map(|(i, snapshot)| NewRulesCount {
                year: snapshot.year,
                new_rules_count: i
                    .checked_sub(1)
                    .map(|prev| Self::new_rules(&snapshots[prev], snapshot)),
                total_laws: laws.get(i).copied().unwrap_or(0),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regcode_core::{Agency, AgencyYear, Chapter, Rule, RuleTree};
    use rstest::rstest;

    fn snapshot(year: i32, chapters: &[(&str, &[(&str, u64)])]) -> Snapshot {
        let mut agency_year = AgencyYear::new(Agency::new("A", "Agency A"), year);
        for (id, rules) in chapters {
            let mut tree = RuleTree::new();
            for (rule, words) in rules.iter() {
                tree.add_root(Rule::new(*rule).with_word_count(*words));
            }
            agency_year.add_chapter(Chapter::new(*id, "").with_rules(tree));
        }
        Snapshot::empty(year).with_agency(agency_year)
    }

    #[test]
    fn test_totals() {
        let s = snapshot(2020, &[("1", &[("1.1", 100), ("1.2", 50)]), ("2", &[("2.1", 25)])]);

        assert_eq!(AggregateCalculator::rule_total(&s), YearRuleTotal { year: 2020, total_rules: 3 });
        assert_eq!(AggregateCalculator::chapter_total(&s).total_chapters, 2);
        assert_eq!(
            AggregateCalculator::rule_volume(&s),
            YearRuleVolume { year: 2020, total_rules: 3, total_word_count: 175 }
        );
    }

    #[test]
    fn test_chapter_totals() {
        let snapshots = vec![
            snapshot(2019, &[("1", &[])]),
            snapshot(2020, &[("1", &[]), ("2", &[]), ("3", &[])]),
        ];

        let totals = AggregateCalculator::chapter_totals(&snapshots);
        assert_eq!(totals.years.len(), 2);
        assert_eq!(totals.years[1], YearChapterTotal { year: 2020, total_chapters: 3 });
        assert_eq!(totals.total_chapters, 4);
    }

    #[rstest]
    #[case(&[], &[], 0)]
    #[case(&[("1.1", 1)], &[("1.1", 1)], 0)]
    #[case(&[("1.1", 1)], &[("1.1", 1), ("1.2", 1)], 1)]
    #[case(&[("1.1", 1), ("1.2", 1)], &[("1.3", 1)], 1)]
    #[case(&[], &[("1.1", 1), ("1.2", 1)], 2)]
    fn test_new_rules(
        #[case] before: &[(&str, u64)],
        #[case] after: &[(&str, u64)],
        #[case] expected: usize,
    ) {
        let previous = snapshot(2019, &[("1", before)]);
        let current = snapshot(2020, &[("1", after)]);
        assert_eq!(AggregateCalculator::new_rules(&previous, &current), expected);
    }

    #[test]
    fn test_new_rules_by_year_first_year_is_none() {
        let snapshots = vec![
            snapshot(2019, &[("1", &[("1.1", 1)])]),
            snapshot(2020, &[("1", &[("1.1", 1), ("1.2", 1)])]),
            snapshot(2021, &[("1", &[("1.2", 1)])]),
        ];

        let counts = AggregateCalculator::new_rules_by_year(&snapshots, &[10, 20, 30]);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].new_rules_count, None);
        assert_eq!(counts[1].new_rules_count, Some(1));
        assert_eq!(counts[2].new_rules_count, Some(0));
        assert_eq!(counts[2].total_laws, 30);
    }
}
