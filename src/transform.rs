use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One spreadsheet row as returned by the values API. Cells are addressed by
/// position only; there is no header lookup.
pub type RawSheetRow = Vec<Value>;

/// Column positions inside a weekly metrics tab. The sheet has no header row
/// in the fetched range, so these indices are the contract.
mod col {
    pub const INVESTMENT: usize = 0;
    pub const TRAFFIC_REVENUE: usize = 1;
    pub const TRAFFIC_ROAS: usize = 2;
    pub const ENROLLED_COUNT: usize = 3;
    pub const FORM_SUBMISSIONS: usize = 4;
    pub const FILL_RATE: usize = 5;
    pub const QUALIFIED_COUNT: usize = 6;
    pub const SCHEDULED_COUNT: usize = 7;
    pub const SCHEDULING_RATE: usize = 8;
    pub const CALLS_COMPLETED: usize = 9;
    pub const ATTENDANCE_RATE: usize = 10;
    pub const SALE_COUNT: usize = 11;
    pub const CONVERSION_RATE: usize = 12;
    pub const ASCENSION_RATE: usize = 13;
    pub const MONETIZATION_SALE_VALUE: usize = 14;
    pub const ENTRIES_COUNT: usize = 15;
    pub const FUNNEL_REVENUE: usize = 16;
    pub const FUNNEL_PROFIT: usize = 17;
}

/// One week's observations for one funnel. Every field degrades to 0 when the
/// underlying cell is blank, an error token or otherwise unparseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyMetric {
    pub investment: f64,
    pub traffic_revenue: f64,
    pub traffic_roas: f64,
    pub enrolled_count: f64,
    pub form_submissions: f64,
    pub fill_rate: f64,
    pub qualified_count: f64,
    pub scheduled_count: f64,
    pub scheduling_rate: f64,
    pub calls_completed: f64,
    pub attendance_rate: f64,
    pub sale_count: f64,
    pub conversion_rate: f64,
    pub ascension_rate: f64,
    pub monetization_sale_value: f64,
    pub entries_count: f64,
    pub funnel_revenue: f64,
    pub funnel_roas: f64,
    pub funnel_profit: f64,
}

fn cell(row: &RawSheetRow, index: usize) -> f64 {
    row.get(index).map(normalize).unwrap_or(0.0)
}

/// Maps one raw row into a typed weekly record. Pure and deterministic; a
/// short row reads missing trailing cells as empty.
pub fn transform_row(row: &RawSheetRow) -> WeeklyMetric {
    let investment = cell(row, col::INVESTMENT);
    let funnel_revenue = cell(row, col::FUNNEL_REVENUE);
    let funnel_roas = if investment > 0.0 {
        funnel_revenue / investment
    } else {
        0.0
    };

    WeeklyMetric {
        investment,
        traffic_revenue: cell(row, col::TRAFFIC_REVENUE),
        traffic_roas: cell(row, col::TRAFFIC_ROAS),
        enrolled_count: cell(row, col::ENROLLED_COUNT),
        form_submissions: cell(row, col::FORM_SUBMISSIONS),
        fill_rate: cell(row, col::FILL_RATE),
        qualified_count: cell(row, col::QUALIFIED_COUNT),
        scheduled_count: cell(row, col::SCHEDULED_COUNT),
        scheduling_rate: cell(row, col::SCHEDULING_RATE),
        calls_completed: cell(row, col::CALLS_COMPLETED),
        attendance_rate: cell(row, col::ATTENDANCE_RATE),
        sale_count: cell(row, col::SALE_COUNT),
        conversion_rate: cell(row, col::CONVERSION_RATE),
        ascension_rate: cell(row, col::ASCENSION_RATE),
        monetization_sale_value: cell(row, col::MONETIZATION_SALE_VALUE),
        entries_count: cell(row, col::ENTRIES_COUNT),
        funnel_revenue,
        funnel_roas,
        funnel_profit: cell(row, col::FUNNEL_PROFIT),
    }
}
