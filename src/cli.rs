//! 命令列介面：對 JSON 資料目錄執行引擎操作

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use regcode_core::{EngineConfig, JsonDirectoryProvider, SnapshotProvider};
use regcode_engine::ChangeEngine;

/// 法規年度變動報表
///
/// 讀取 `nested_{year}.json` 年度快照（與選用的 `laws/signed_bills_{year}.json`），
/// 輸出 JSON 格式的差異與彙總結果。
#[derive(Parser, Debug)]
#[command(name = "regcode", version, about, long_about = None)]
pub struct Cli {
    /// 輸出更多日誌，可重複（-v, -vv, -vvv）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// 引擎設定檔（JSON）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 年度快照資料目錄
    #[arg(long, global = true, default_value = ".")]
    pub data: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// 年份範圍 `start_year..=end_year`
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start_year: i32,
    pub end_year: i32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 相鄰年度差異（逐機關章節/條文增刪）
    Differences(YearRange),

    /// 相鄰年度差異計數
    SimpleDifferences(YearRange),

    /// 兩個任意年度間的新增/刪除明細（由 year1 比較到 year2）
    DetailedChanges { year1: i32, year2: i32 },

    /// 每年條文總數
    TotalRulesByYear(YearRange),

    /// 每年章節總數
    TotalChaptersByYear(YearRange),

    /// 每年新增條文數
    NewRulesCountByYear(YearRange),

    /// 機關出現/消失時間軸
    AgencyTimeline(YearRange),

    /// 每年條文數與字數
    TotalRuleVolumeByYear(YearRange),

    /// 各機關最新年度與累計統計
    AgencyStats,

    /// 年度機關清單
    Agencies { year: i32 },

    /// 機關年度章節清單
    Chapters { agency_id: String, year: i32 },

    /// 章節的巢狀條文
    Rules {
        agency_id: String,
        year: i32,
        chapter: String,
    },

    /// 所有年度出現過的機關
    AllAgencies,

    /// 機關年度代理鍵
    AgencyYearId { agency_id: String, year: i32 },

    /// 有資料的年度
    Years,
}

/// 依命令列參數建立引擎並執行一個操作
pub async fn run(cli: &Cli) -> anyhow::Result<Value> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("無法載入設定檔 {}", path.display()))?,
        None => EngineConfig::default(),
    };

    tracing::debug!(data = %cli.data.display(), "使用資料目錄");
    let provider = Arc::new(JsonDirectoryProvider::new(&cli.data));
    let engine = ChangeEngine::initialize(provider, config)?;

    let output = execute(&engine, &cli.command).await;
    engine.shutdown();
    output
}

async fn execute<P: SnapshotProvider>(engine: &ChangeEngine<P>, command: &Command) -> anyhow::Result<Value> {
    match command {
        Command::Differences(r) => to_json(&*engine.differences(r.start_year, r.end_year).await?),
        Command::SimpleDifferences(r) => {
            to_json(&*engine.simple_differences(r.start_year, r.end_year).await?)
        }
        Command::DetailedChanges { year1, year2 } => {
            to_json(&*engine.detailed_changes(*year1, *year2).await?)
        }
        Command::TotalRulesByYear(r) => {
            to_json(&*engine.total_rules_by_year(r.start_year, r.end_year).await?)
        }
        Command::TotalChaptersByYear(r) => {
            to_json(&*engine.total_chapters_by_year(r.start_year, r.end_year).await?)
        }
        Command::NewRulesCountByYear(r) => {
            to_json(&*engine.new_rules_count_by_year(r.start_year, r.end_year).await?)
        }
        Command::AgencyTimeline(r) => to_json(&*engine.agency_timeline(r.start_year, r.end_year).await?),
        Command::TotalRuleVolumeByYear(r) => {
            to_json(&*engine.total_rule_volume_by_year(r.start_year, r.end_year).await?)
        }
        Command::AgencyStats => to_json(&*engine.agency_stats().await?),
        Command::Agencies { year } => to_json(&*engine.agencies_by_year(*year).await?),
        Command::Chapters { agency_id, year } => {
            to_json(&*engine.chapters_for_agency(agency_id, *year).await?)
        }
        Command::Rules {
            agency_id,
            year,
            chapter,
        } => to_json(&*engine.rules_for_chapter(agency_id, *year, chapter).await?),
        Command::AllAgencies => to_json(&*engine.all_agencies().await?),
        Command::AgencyYearId { agency_id, year } => {
            to_json(&engine.agency_year_id(agency_id, *year).await?)
        }
        Command::Years => to_json(&engine.provider().available_years().await?),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<Value> {
    serde_json::to_value(value).context("無法序列化輸出")
}
