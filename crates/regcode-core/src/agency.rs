//! 機關、機關年度與章節模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rule::RuleTree;

/// 機關（跨年度以 `agency_id` 識別）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    /// 機關ID
    pub agency_id: String,

    /// 機關名稱
    pub name: String,

    /// 機關代號
    pub agency_number: Option<String>,
}

impl Agency {
    /// 創建新的機關
    pub fn new(agency_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agency_id: agency_id.into(),
            name: name.into(),
            agency_number: None,
        }
    }

    /// 建構器模式：設置機關代號
    pub fn with_agency_number(mut self, number: impl Into<String>) -> Self {
        self.agency_number = Some(number.into());
        self
    }
}

/// 章節
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 章節編號（如 "17"），同一機關年度內唯一
    pub identifier: String,

    /// 章節名稱
    pub name: String,

    /// 條文樹
    pub rules: RuleTree,
}

impl Chapter {
    /// 創建新的章節
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            rules: RuleTree::new(),
        }
    }

    /// 建構器模式：設置條文樹
    pub fn with_rules(mut self, rules: RuleTree) -> Self {
        self.rules = rules;
        self
    }

    /// 條文數（含子條文）
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn word_count(&self) -> u64 {
        self.rules.total_word_count()
    }
}

/// 機關年度快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyYear {
    pub agency: Agency,

    pub year: i32,

    /// 資料來源的代理鍵（跨年度不穩定，僅供查詢）
    pub agency_year_id: Option<u64>,

    /// 資料來源回報的總字數
    pub reported_word_count: Option<u64>,

    /// 章節（依編號排序）
    chapters: BTreeMap<String, Chapter>,
}

impl AgencyYear {
    /// 創建新的機關年度
    pub fn new(agency: Agency, year: i32) -> Self {
        Self {
            agency,
            year,
            agency_year_id: None,
            reported_word_count: None,
            chapters: BTreeMap::new(),
        }
    }

    /// 建構器模式：設置代理鍵
    pub fn with_agency_year_id(mut self, id: u64) -> Self {
        self.agency_year_id = Some(id);
        self
    }

    /// 建構器模式：設置回報字數
    pub fn with_reported_word_count(mut self, word_count: u64) -> Self {
        self.reported_word_count = Some(word_count);
        self
    }

    /// 建構器模式：加入章節
    pub fn with_chapter(mut self, chapter: Chapter) -> Self {
        self.add_chapter(chapter);
        self
    }

    /// 加入章節；同編號者覆蓋並回傳舊章節
    pub fn add_chapter(&mut self, chapter: Chapter) -> Option<Chapter> {
        self.chapters.insert(chapter.identifier.clone(), chapter)
    }

    pub fn agency_id(&self) -> &str {
        &self.agency.agency_id
    }

    pub fn chapter(&self, identifier: &str) -> Option<&Chapter> {
        self.chapters.get(identifier)
    }

    /// 依編號排序的章節
    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.values()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn rule_count(&self) -> usize {
        self.chapters.values().map(Chapter::rule_count).sum()
    }

    /// 條文字數合計
    pub fn word_count(&self) -> u64 {
        self.chapters.values().map(Chapter::word_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;

    fn chapter(identifier: &str, rules: &[(&str, u64)]) -> Chapter {
        let mut tree = RuleTree::new();
        for (id, words) in rules {
            tree.add_root(Rule::new(*id).with_word_count(*words));
        }
        Chapter::new(identifier, format!("Chapter {identifier}")).with_rules(tree)
    }

    #[test]
    fn test_chapters_ordered_by_label() {
        let agency_year = AgencyYear::new(Agency::new("441", "Human Services"), 2020)
            .with_chapter(chapter("3", &[]))
            .with_chapter(chapter("1", &[]))
            .with_chapter(chapter("2", &[]));

        let labels: Vec<&str> = agency_year.chapters().map(|c| c.identifier.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_add_chapter_replaces_same_identifier() {
        let mut agency_year = AgencyYear::new(Agency::new("441", "Human Services"), 2020);
        assert!(agency_year.add_chapter(chapter("1", &[("1.1", 5)])).is_none());

        let replaced = agency_year.add_chapter(chapter("1", &[("1.2", 7)]));
        assert!(replaced.is_some());
        assert_eq!(agency_year.chapter_count(), 1);
        assert_eq!(agency_year.word_count(), 7);
    }

    #[test]
    fn test_counts() {
        let agency_year = AgencyYear::new(
            Agency::new("441", "Human Services").with_agency_number("441"),
            2021,
        )
        .with_agency_year_id(77)
        .with_chapter(chapter("1", &[("1.1", 10), ("1.2", 20)]))
        .with_chapter(chapter("2", &[("2.1", 30)]));

        assert_eq!(agency_year.agency_id(), "441");
        assert_eq!(agency_year.agency_year_id, Some(77));
        assert_eq!(agency_year.chapter_count(), 2);
        assert_eq!(agency_year.rule_count(), 3);
        assert_eq!(agency_year.word_count(), 60);
        assert!(agency_year.chapter("2").is_some());
        assert!(agency_year.chapter("9").is_none());
    }
}
