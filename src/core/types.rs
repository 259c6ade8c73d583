use serde::Serialize;

/// Funnel assumptions driving the projection. Rates are fractions (0.6 for
/// 60%); percent-form values are converted once at the API boundary.
#[derive(Debug, Clone)]
pub struct FunnelInputs {
    pub new_patients_per_month: f64,
    pub testing_rate: f64,
    pub read_rate: f64,
    pub reads_per_patient: f64,
    pub read_reimbursement: f64,
    pub rtm_enrollment_rate: f64,
    pub rtm_episode_total: f64,
    pub avg_months_monitored: f64,
    pub include_g0552: bool,
    pub g0552_eligible_rate: f64,
    pub g0552_reimbursement: f64,
    pub g0552_cost: f64,
    pub payer_mix_discount: f64,
    pub partner_share: f64,
    pub include_growth: bool,
    pub monthly_growth_rate: f64,
}

/// Per-code RTM pricing used instead of the flat episode total when the
/// advanced breakdown is active.
#[derive(Debug, Clone, Copy)]
pub struct RtmCodeBreakdown {
    pub init_98975: f64,
    pub monthly_98976: f64,
    pub per_visit_98980: f64,
    pub per_visit_98981: f64,
    pub visits_98980_per_month: f64,
    pub visits_98981_per_month: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPoint {
    pub month: String,
    pub new_patients: f64,
    pub rtm_net: f64,
    pub reads_net: f64,
    pub g0552_net: f64,
    /// One-time cost for the month, negated (expense sign for chart stacking).
    pub g0552_cost: f64,
    pub total_net: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub patients_per_year: f64,
    pub tested_patients_per_year: f64,
    pub rtm_patients_per_year: f64,
    pub read_count_per_year: f64,
    pub rtm_episode_value: f64,
    pub gross_rtm: f64,
    pub gross_reads: f64,
    pub gross_g0552: f64,
    pub gross_total: f64,
    pub partner_net: f64,
    pub one_time_cost: f64,
    pub partner_net_after_cost: f64,
    pub monthly_net_avg: f64,
    pub months: Vec<MonthPoint>,
}
