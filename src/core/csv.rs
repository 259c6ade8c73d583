use super::types::MonthPoint;

pub const CSV_FILENAME: &str = "neuroglympse_roi_projection.csv";

const CSV_HEADER: &str = "Month,RTM (Net),Reads (Net),G0552 (Net),G0552 Cost (-),Total (Net)";

/// Serialize the monthly series: one header row plus one row per month,
/// numeric cells fixed to 2 decimals. Cells are plain numbers or short month
/// labels, so no quoting is needed.
pub fn monthly_csv(months: &[MonthPoint]) -> String {
    let mut rows = Vec::with_capacity(months.len() + 1);
    rows.push(CSV_HEADER.to_string());
    for point in months {
        rows.push(format!(
            "{},{:.2},{:.2},{:.2},{:.2},{:.2}",
            point.month,
            point.rtm_net,
            point.reads_net,
            point.g0552_net,
            point.g0552_cost,
            point.total_net,
        ));
    }
    rows.join("\n")
}
