//! 快照 JSON 文件格式（`nested_{year}.json`）

use serde::Deserialize;

use crate::agency::{Agency, AgencyYear, Chapter};
use crate::rule::{Rule, RuleIdx, RuleTree};
use crate::snapshot::Snapshot;
use crate::{RegError, Result};

/// 編號可能以字串或數字出現
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Number(i64),
}

impl Label {
    fn into_string(self) -> String {
        match self {
            Label::Text(s) => s,
            Label::Number(n) => n.to_string(),
        }
    }
}

/// 年度文件
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    agencies: Vec<AgencyDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgencyDocument {
    agency_id: Label,
    #[serde(default)]
    agency_name: String,
    agency_number: Option<Label>,
    agency_year_id: Option<u64>,
    total_word_count: Option<u64>,
    #[serde(default)]
    chapters: Vec<ChapterDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterDocument {
    chapter_id: Label,
    #[serde(default)]
    chapter_title: String,
    #[serde(default)]
    rules: Vec<RuleDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDocument {
    rule_number: Label,
    rule_title: Option<String>,
    #[serde(default)]
    word_count: u64,
    #[serde(default)]
    subrules: Vec<RuleDocument>,
}

impl SnapshotDocument {
    /// 解析 JSON 文字
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RegError::InvalidDocument(e.to_string()))
    }

    /// 轉換為快照
    pub fn into_snapshot(self, year: i32) -> Result<Snapshot> {
        let mut snapshot = Snapshot::empty(year);

        for agency_doc in self.agencies {
            let mut agency = Agency::new(agency_doc.agency_id.into_string(), agency_doc.agency_name);
            if let Some(number) = agency_doc.agency_number {
                agency = agency.with_agency_number(number.into_string());
            }

            let mut agency_year = AgencyYear::new(agency, year);
            agency_year.agency_year_id = agency_doc.agency_year_id;
            agency_year.reported_word_count = agency_doc.total_word_count;

            for chapter_doc in agency_doc.chapters {
                let rules = build_rule_tree(chapter_doc.rules)?;
                let chapter = Chapter::new(chapter_doc.chapter_id.into_string(), chapter_doc.chapter_title)
                    .with_rules(rules);

                if let Some(previous) = agency_year.add_chapter(chapter) {
                    tracing::warn!(
                        "機關 {} 年度 {} 章節編號重複: {}",
                        agency_year.agency_id(),
                        year,
                        previous.identifier
                    );
                }
            }

            if snapshot.add_agency(agency_year).is_some() {
                tracing::warn!("年度 {} 機關重複，保留最後一筆", year);
            }
        }

        Ok(snapshot)
    }
}

/// 以顯式堆疊建立條文樹，保持文件中的順序
fn build_rule_tree(rules: Vec<RuleDocument>) -> Result<RuleTree> {
    let mut tree = RuleTree::new();
    let mut pending: Vec<(Option<RuleIdx>, RuleDocument)> =
        rules.into_iter().rev().map(|r| (None, r)).collect();

    while let Some((parent, doc)) = pending.pop() {
        let mut rule = Rule::new(doc.rule_number.into_string()).with_word_count(doc.word_count);
        if let Some(title) = doc.rule_title {
            rule = rule.with_title(title);
        }

        let idx = match parent {
            Some(parent) => tree.add_child(parent, rule)?,
            None => tree.add_root(rule),
        };

        pending.extend(doc.subrules.into_iter().rev().map(|s| (Some(idx), s)));
    }

    Ok(tree)
}

/// 解析年度文件為快照
pub fn parse_snapshot(json: &str, year: i32) -> Result<Snapshot> {
    SnapshotDocument::from_json(json)?.into_snapshot(year)
}
