//! 條文樹（arena 結構）
//!
//! 條文與子條文組成任意深度的樹，以索引定址，避免遞迴擁有權結構。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{RegError, Result};

/// 條文節點索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleIdx(usize);

impl RuleIdx {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 條文（子條文同樣以 Rule 表示）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 條文編號（如 "8.1"），同層唯一
    pub identifier: String,

    /// 條文標題
    pub title: Option<String>,

    /// 字數
    pub word_count: u64,

    /// 父節點
    pub parent: Option<RuleIdx>,

    /// 子節點（依加入順序）
    pub children: Vec<RuleIdx>,
}

impl Rule {
    /// 創建新的條文
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            word_count: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// 建構器模式：設置標題
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// 建構器模式：設置字數
    pub fn with_word_count(mut self, word_count: u64) -> Self {
        self.word_count = word_count;
        self
    }

    pub fn is_subrule(&self) -> bool {
        self.parent.is_some()
    }
}

/// 單一章節下的條文樹
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTree {
    nodes: Vec<Rule>,
    roots: Vec<RuleIdx>,
}

impl RuleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入頂層條文
    pub fn add_root(&mut self, mut rule: Rule) -> RuleIdx {
        let idx = RuleIdx(self.nodes.len());
        rule.parent = None;
        rule.children.clear();
        self.nodes.push(rule);
        self.roots.push(idx);
        idx
    }

    /// 在 `parent` 下加入子條文
    pub fn add_child(&mut self, parent: RuleIdx, mut rule: Rule) -> Result<RuleIdx> {
        if parent.0 >= self.nodes.len() {
            return Err(RegError::InvalidDocument(format!(
                "父條文索引 {} 不存在",
                parent.0
            )));
        }

        let idx = RuleIdx(self.nodes.len());
        rule.parent = Some(parent);
        rule.children.clear();
        self.nodes.push(rule);
        self.nodes[parent.0].children.push(idx);
        Ok(idx)
    }

    pub fn get(&self, idx: RuleIdx) -> Option<&Rule> {
        self.nodes.get(idx.0)
    }

    pub fn roots(&self) -> &[RuleIdx] {
        &self.roots
    }

    /// 節點總數（含子條文）
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 深度優先（前序）走訪，使用顯式堆疊
    pub fn iter(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// 攤平成條文編號集合
    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.iter().map(|(_, rule)| rule.identifier.as_str()).collect()
    }

    /// 依編號查找（任一層）
    pub fn find(&self, identifier: &str) -> Option<RuleIdx> {
        self.iter()
            .find(|(_, rule)| rule.identifier == identifier)
            .map(|(idx, _)| idx)
    }

    /// 全部節點字數合計
    pub fn total_word_count(&self) -> u64 {
        self.nodes.iter().map(|r| r.word_count).sum()
    }

    /// 節點深度（頂層為 0）
    pub fn depth(&self, idx: RuleIdx) -> Option<usize> {
        let mut node = self.get(idx)?;
        let mut depth = 0;
        while let Some(parent) = node.parent {
            node = self.get(parent)?;
            depth += 1;
        }
        Some(depth)
    }
}

/// 條文樹前序迭代器
pub struct DepthFirst<'a> {
    tree: &'a RuleTree,
    stack: Vec<RuleIdx>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (RuleIdx, &'a Rule);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let rule = self.tree.get(idx)?;
        self.stack.extend(rule.children.iter().rev().copied());
        Some((idx, rule))
    }
}
