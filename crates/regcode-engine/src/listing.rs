//! 機關與章節清單查詢

use regcode_core::{AgencyYear, RegError, Result, RuleTree, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// 年度機關摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencySummary {
    pub agency_id: String,
    pub agency_name: String,
    pub agency_number: Option<String>,
    pub agency_year_id: Option<u64>,
    /// 資料來源回報的字數，未回報時由條文加總
    pub total_word_count: u64,
}

impl AgencySummary {
    fn from_agency_year(agency_year: &AgencyYear) -> Self {
        Self {
            agency_id: agency_year.agency.agency_id.clone(),
            agency_name: agency_year.agency.name.clone(),
            agency_number: agency_year.agency.agency_number.clone(),
            agency_year_id: agency_year.agency_year_id,
            total_word_count: agency_year
                .reported_word_count
                .unwrap_or_else(|| agency_year.word_count()),
        }
    }
}

/// 章節摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterSummary {
    pub identifier: String,
    pub name: String,
    pub rule_count: usize,
    pub word_count: u64,
}

/// 跨年度的機關紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyRecord {
    pub agency_id: String,
    /// 以最新有資料年度的名稱為準
    pub agency_name: String,
    pub agency_number: Option<String>,
    /// 有資料的年度（遞增）
    pub years: Vec<i32>,
}

/// 巢狀條文（含子條文）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleNode {
    pub identifier: String,
    pub title: Option<String>,
    pub word_count: u64,
    pub subrules: Vec<RuleNode>,
}

/// 清單計算器
pub struct ListingCalculator;

impl ListingCalculator {
    /// 年度所有機關（依 agency_id 排序）
    pub fn agencies(snapshot: &Snapshot) -> Vec<AgencySummary> {
        snapshot.agencies().map(AgencySummary::from_agency_year).collect()
    }

    /// 所有年度出現過的機關（依 agency_id 排序）
    pub fn all_agencies(snapshots: &[Snapshot]) -> Vec<AgencyRecord> {
        let mut records: BTreeMap<&str, AgencyRecord> = BTreeMap::new();

        let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|snapshot| snapshot.year);

        for snapshot in ordered {
            for agency_year in snapshot.agencies() {
                let agency = &agency_year.agency;
                let record = records.entry(agency_year.agency_id()).or_insert_with(|| AgencyRecord {
                    agency_id: agency.agency_id.clone(),
                    agency_name: String::new(),
                    agency_number: None,
                    years: Vec::new(),
                });
                record.agency_name.clone_from(&agency.name);
                if agency.agency_number.is_some() {
                    record.agency_number.clone_from(&agency.agency_number);
                }
                record.years.push(snapshot.year);
            }
        }

        records.into_values().collect()
    }

    /// 機關於該年度的章節；機關當年無資料時回傳 NotFound
    pub fn chapters(snapshot: &Snapshot, agency_id: &str) -> Result<Vec<ChapterSummary>> {
        let agency_year = snapshot.agency(agency_id).ok_or_else(|| {
            RegError::NotFound(format!("機關 {agency_id} 年度 {}", snapshot.year))
        })?;

        Ok(agency_year
            .chapters()
            .map(|chapter| ChapterSummary {
                identifier: chapter.identifier.clone(),
                name: chapter.name.clone(),
                rule_count: chapter.rule_count(),
                word_count: chapter.word_count(),
            })
            .collect())
    }

    /// 章節的巢狀條文樹；機關或章節不存在時回傳 NotFound
    pub fn rules(snapshot: &Snapshot, agency_id: &str, chapter_id: &str) -> Result<Vec<RuleNode>> {
        let chapter = snapshot
            .agency(agency_id)
            .and_then(|agency_year| agency_year.chapter(chapter_id))
            .ok_or_else(|| {
                RegError::NotFound(format!(
                    "機關 {agency_id} 年度 {} 章節 {chapter_id}",
                    snapshot.year
                ))
            })?;

        Ok(Self::nest(&chapter.rules))
    }

    /// 由 arena 組出巢狀結構：先序的反向保證子節點先於父節點完成
    fn nest(tree: &RuleTree) -> Vec<RuleNode> {
        let order: Vec<_> = tree.iter().collect();
        let mut built: Vec<Option<RuleNode>> = (0..tree.len()).map(|_| None).collect();

        for (idx, rule) in order.into_iter().rev() {
            let subrules = rule
                .children
                .iter()
                .filter_map(|child| built.get_mut(child.index()).and_then(Option::take))
                .collect();

            if let Some(slot) = built.get_mut(idx.index()) {
                *slot = Some(RuleNode {
                    identifier: rule.identifier.clone(),
                    title: rule.title.clone(),
                    word_count: rule.word_count,
                    subrules,
                });
            }
        }

        tree.roots()
            .iter()
            .filter_map(|root| built.get_mut(root.index()).and_then(Option::take))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regcode_core::{Agency, Chapter, Rule, RuleTree};

    fn snapshot() -> Snapshot {
        let mut tree = RuleTree::new();
        let root = tree.add_root(Rule::new("1.1").with_word_count(40));
        tree.add_child(root, Rule::new("1.1.a").with_word_count(10)).unwrap();

        Snapshot::empty(2020)
            .with_agency(
                AgencyYear::new(
                    Agency::new("B", "Board").with_agency_number("B-01"),
                    2020,
                )
                .with_agency_year_id(7)
                .with_chapter(Chapter::new("1", "General").with_rules(tree)),
            )
            .with_agency(
                AgencyYear::new(Agency::new("A", "Authority"), 2020).with_reported_word_count(999),
            )
    }

    #[test]
    fn test_agencies_sorted_with_word_counts() {
        let agencies = ListingCalculator::agencies(&snapshot());

        assert_eq!(agencies.len(), 2);
        assert_eq!(agencies[0].agency_id, "A");
        assert_eq!(agencies[0].total_word_count, 999);
        assert_eq!(agencies[1].agency_number.as_deref(), Some("B-01"));
        assert_eq!(agencies[1].agency_year_id, Some(7));
        assert_eq!(agencies[1].total_word_count, 50);
    }

    #[test]
    fn test_chapters_for_agency() {
        let chapters = ListingCalculator::chapters(&snapshot(), "B").unwrap();
        assert_eq!(
            chapters,
            vec![ChapterSummary {
                identifier: "1".into(),
                name: "General".into(),
                rule_count: 2,
                word_count: 50,
            }]
        );
    }

    #[test]
    fn test_nested_rules() {
        let rules = ListingCalculator::rules(&snapshot(), "B", "1").unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].identifier, "1.1");
        assert_eq!(rules[0].word_count, 40);
        assert_eq!(rules[0].subrules.len(), 1);
        assert_eq!(rules[0].subrules[0].identifier, "1.1.a");
        assert!(rules[0].subrules[0].subrules.is_empty());
    }

    #[test]
    fn test_nested_rules_keep_order_and_depth() {
        let mut tree = RuleTree::new();
        let first = tree.add_root(Rule::new("2.1"));
        let a = tree.add_child(first, Rule::new("2.1.a")).unwrap();
        tree.add_child(a, Rule::new("2.1.a.i")).unwrap();
        tree.add_child(first, Rule::new("2.1.b")).unwrap();
        tree.add_root(Rule::new("2.2"));

        let snapshot = Snapshot::empty(2021).with_agency(
            AgencyYear::new(Agency::new("A", "Authority"), 2021)
                .with_chapter(Chapter::new("2", "Permits").with_rules(tree)),
        );

        let rules = ListingCalculator::rules(&snapshot, "A", "2").unwrap();
        let roots: Vec<&str> = rules.iter().map(|r| r.identifier.as_str()).collect();
        let children: Vec<&str> = rules[0].subrules.iter().map(|r| r.identifier.as_str()).collect();

        assert_eq!(roots, vec!["2.1", "2.2"]);
        assert_eq!(children, vec!["2.1.a", "2.1.b"]);
        assert_eq!(rules[0].subrules[0].subrules[0].identifier, "2.1.a.i");
    }

    #[test]
    fn test_rules_for_missing_chapter() {
        let err = ListingCalculator::rules(&snapshot(), "B", "99").unwrap_err();
        assert!(matches!(err, RegError::NotFound(_)));

        let err = ListingCalculator::rules(&snapshot(), "Z", "1").unwrap_err();
        assert!(matches!(err, RegError::NotFound(_)));
    }

    #[test]
    fn test_all_agencies_across_years() {
        let earlier = Snapshot::empty(2019)
            .with_agency(AgencyYear::new(Agency::new("B", "Old Board"), 2019))
            .with_agency(AgencyYear::new(Agency::new("C", "Commission"), 2019));

        let records = ListingCalculator::all_agencies(&[snapshot(), earlier]);
        let ids: Vec<&str> = records.iter().map(|r| r.agency_id.as_str()).collect();

        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(records[1].agency_name, "Board");
        assert_eq!(records[1].agency_number.as_deref(), Some("B-01"));
        assert_eq!(records[1].years, vec![2019, 2020]);
        assert_eq!(records[2].years, vec![2019]);
    }

    #[test]
    fn test_chapters_for_missing_agency() {
        let err = ListingCalculator::chapters(&snapshot(), "Z").unwrap_err();
        assert!(matches!(err, RegError::NotFound(_)));
        assert!(err.is_client_error());
    }
}
