//! 年度差異計算
//!
//! 以編號做集合差：章節依章節編號，條文依章節內攤平後的條文編號。
//! 編號變更一律視為一筆刪除加一筆新增，不追蹤改號。

use rayon::prelude::*;
use regcode_core::{AgencyYear, Chapter, Rule, Snapshot};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// 機關在兩個年度間的狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencyStatus {
    /// 僅出現在較新年度
    Added,
    /// 僅出現在較舊年度
    Removed,
    /// 兩個年度皆存在
    Present,
}

/// 機關參照
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AgencyRef {
    pub agency_id: String,
    pub agency_name: String,
}

/// 章節參照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRef {
    pub identifier: String,
    pub name: String,
}

/// 條文參照（章節編號 + 條文編號）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRef {
    pub chapter: String,
    pub identifier: String,
    pub title: Option<String>,
}

/// 單一機關的差異
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyDiff {
    pub agency_id: String,
    pub agency_name: String,
    pub status: AgencyStatus,
    pub chapters_added: Vec<ChapterRef>,
    pub chapters_removed: Vec<ChapterRef>,
    pub rules_added: Vec<RuleRef>,
    pub rules_removed: Vec<RuleRef>,
}

impl AgencyDiff {
    /// 無任何變動
    pub fn is_unchanged(&self) -> bool {
        self.status == AgencyStatus::Present
            && self.chapters_added.is_empty()
            && self.chapters_removed.is_empty()
            && self.rules_added.is_empty()
            && self.rules_removed.is_empty()
    }

    /// 章節淨增減
    pub fn chapter_difference(&self) -> i64 {
        self.chapters_added.len() as i64 - self.chapters_removed.len() as i64
    }

    /// 條文淨增減
    pub fn rule_difference(&self) -> i64 {
        self.rules_added.len() as i64 - self.rules_removed.len() as i64
    }
}

/// 差異計數
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub agencies_added: usize,
    pub agencies_removed: usize,
    pub chapters_added: usize,
    pub chapters_removed: usize,
    pub rules_added: usize,
    pub rules_removed: usize,
    pub chapter_difference: i64,
    pub rule_difference: i64,
}

impl DiffCounts {
    /// 彙總各機關差異
    pub fn from_diffs(diffs: &[AgencyDiff]) -> Self {
        let mut counts = Self::default();
        for diff in diffs {
            match diff.status {
                AgencyStatus::Added => counts.agencies_added += 1,
                AgencyStatus::Removed => counts.agencies_removed += 1,
                AgencyStatus::Present => {}
            }
            counts.chapters_added += diff.chapters_added.len();
            counts.chapters_removed += diff.chapters_removed.len();
            counts.rules_added += diff.rules_added.len();
            counts.rules_removed += diff.rules_removed.len();
            counts.chapter_difference += diff.chapter_difference();
            counts.rule_difference += diff.rule_difference();
        }
        counts
    }
}

/// 相鄰（或任意）兩年度的差異
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearDiff {
    pub previous_year: i32,
    pub year: i32,
    pub totals: DiffCounts,
    /// 有變動的機關（依 agency_id 排序）
    pub agencies: Vec<AgencyDiff>,
}

/// 指定兩年度的新增/刪除明細
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub agencies: Vec<AgencyRef>,
    pub chapters: Vec<AgencyChapterRef>,
    pub rules: Vec<AgencyRuleRef>,
}

/// 帶機關的章節參照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyChapterRef {
    pub agency_id: String,
    pub agency_name: String,
    #[serde(flatten)]
    pub chapter: ChapterRef,
}

/// 帶機關的條文參照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyRuleRef {
    pub agency_id: String,
    pub agency_name: String,
    #[serde(flatten)]
    pub rule: RuleRef,
}

/// 兩個任意年度之間的明細差異
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailedChanges {
    pub year1: i32,
    pub year2: i32,
    pub added: ChangeSet,
    pub removed: ChangeSet,
}

/// 差異計算器
pub struct DiffCalculator;

impl DiffCalculator {
    /// 比較兩個快照，回傳所有機關（含未變動者）的差異，依 agency_id 排序
    pub fn diff_agencies(previous: &Snapshot, current: &Snapshot) -> Vec<AgencyDiff> {
        let agency_ids: BTreeSet<&str> = previous.agency_ids().chain(current.agency_ids()).collect();
        let agency_ids: Vec<&str> = agency_ids.into_iter().collect();

        agency_ids
            .par_iter()
            .map(|id| Self::diff_agency(previous.agency(id), current.agency(id)))
            .collect()
    }

    /// 相鄰年度差異，只保留有變動的機關
    pub fn between(previous: &Snapshot, current: &Snapshot) -> YearDiff {
        let agencies: Vec<AgencyDiff> = Self::diff_agencies(previous, current)
            .into_iter()
            .filter(|diff| !diff.is_unchanged())
            .collect();

        tracing::debug!(
            "年度 {} → {} 有變動機關 {} 個",
            previous.year,
            current.year,
            agencies.len()
        );

        YearDiff {
            previous_year: previous.year,
            year: current.year,
            totals: DiffCounts::from_diffs(&agencies),
            agencies,
        }
    }

    /// 任意兩年度的新增/刪除明細
    pub fn detailed(year1: &Snapshot, year2: &Snapshot) -> DetailedChanges {
        let mut added = ChangeSet::default();
        let mut removed = ChangeSet::default();

        for diff in Self::diff_agencies(year1, year2) {
            let agency = AgencyRef {
                agency_id: diff.agency_id.clone(),
                agency_name: diff.agency_name.clone(),
            };

            match diff.status {
                AgencyStatus::Added => added.agencies.push(agency.clone()),
                AgencyStatus::Removed => removed.agencies.push(agency.clone()),
                AgencyStatus::Present => {}
            }

            added.chapters.extend(diff.chapters_added.into_iter().map(|chapter| AgencyChapterRef {
                agency_id: agency.agency_id.clone(),
                agency_name: agency.agency_name.clone(),
                chapter,
            }));
            removed.chapters.extend(diff.chapters_removed.into_iter().map(|chapter| AgencyChapterRef {
                agency_id: agency.agency_id.clone(),
                agency_name: agency.agency_name.clone(),
                chapter,
            }));
            added.rules.extend(diff.rules_added.into_iter().map(|rule| AgencyRuleRef {
                agency_id: agency.agency_id.clone(),
                agency_name: agency.agency_name.clone(),
                rule,
            }));
            removed.rules.extend(diff.rules_removed.into_iter().map(|rule| AgencyRuleRef {
                agency_id: agency.agency_id.clone(),
                agency_name: agency.agency_name.clone(),
                rule,
            }));
        }

        DetailedChanges {
            year1: year1.year,
            year2: year2.year,
            added,
            removed,
        }
    }

    /// 單一機關差異；缺席的年度視為空
    fn diff_agency(previous: Option<&AgencyYear>, current: Option<&AgencyYear>) -> AgencyDiff {
        let status = match (previous, current) {
            (None, Some(_)) => AgencyStatus::Added,
            (Some(_), None) => AgencyStatus::Removed,
            _ => AgencyStatus::Present,
        };

        // 名稱以較新年度為準
        let (agency_id, agency_name) = current
            .or(previous)
            .map(|a| (a.agency.agency_id.clone(), a.agency.name.clone()))
            .unwrap_or_default();

        let previous_chapters = Self::chapter_map(previous);
        let current_chapters = Self::chapter_map(current);

        let mut diff = AgencyDiff {
            agency_id,
            agency_name,
            status,
            chapters_added: Vec::new(),
            chapters_removed: Vec::new(),
            rules_added: Vec::new(),
            rules_removed: Vec::new(),
        };

        let labels: BTreeSet<&str> = previous_chapters
            .keys()
            .chain(current_chapters.keys())
            .copied()
            .collect();

        for label in labels {
            let before = previous_chapters.get(label).copied();
            let after = current_chapters.get(label).copied();

            match (before, after) {
                (None, Some(chapter)) => diff.chapters_added.push(Self::chapter_ref(chapter)),
                (Some(chapter), None) => diff.chapters_removed.push(Self::chapter_ref(chapter)),
                _ => {}
            }

            let before_rules = Self::rule_index(before);
            let after_rules = Self::rule_index(after);

            diff.rules_added.extend(
                after_rules
                    .iter()
                    .filter(|(id, _)| !before_rules.contains_key(*id))
                    .map(|(_, rule)| Self::rule_ref(label, rule)),
            );
            diff.rules_removed.extend(
                before_rules
                    .iter()
                    .filter(|(id, _)| !after_rules.contains_key(*id))
                    .map(|(_, rule)| Self::rule_ref(label, rule)),
            );
        }

        diff
    }

    fn chapter_map(agency: Option<&AgencyYear>) -> BTreeMap<&str, &Chapter> {
        agency
            .map(|a| a.chapters().map(|c| (c.identifier.as_str(), c)).collect())
            .unwrap_or_default()
    }

    /// 攤平條文樹：編號 → 條文（同編號保留先出現者）
    fn rule_index(chapter: Option<&Chapter>) -> BTreeMap<&str, &Rule> {
        let mut index = BTreeMap::new();
        if let Some(chapter) = chapter {
            for (_, rule) in chapter.rules.iter() {
                index.entry(rule.identifier.as_str()).or_insert(rule);
            }
        }
        index
    }

    fn chapter_ref(chapter: &Chapter) -> ChapterRef {
        ChapterRef {
            identifier: chapter.identifier.clone(),
            name: chapter.name.clone(),
        }
    }

    fn rule_ref(chapter: &str, rule: &Rule) -> RuleRef {
        RuleRef {
            chapter: chapter.to_string(),
            identifier: rule.identifier.clone(),
            title: rule.title.clone(),
        }
    }
}
