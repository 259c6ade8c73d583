use super::types::{Aggregates, FunnelInputs, MonthPoint, RtmCodeBreakdown};

const PROJECTION_MONTHS: usize = 12;

#[derive(Debug, Clone, Copy)]
struct ServiceCohorts {
    rtm_patients: f64,
    read_count: f64,
    g0552_patients: f64,
}

fn service_cohorts(inputs: &FunnelInputs, tested_patients: f64) -> ServiceCohorts {
    ServiceCohorts {
        rtm_patients: tested_patients * inputs.rtm_enrollment_rate,
        read_count: tested_patients * inputs.read_rate * inputs.reads_per_patient,
        g0552_patients: tested_patients * inputs.g0552_eligible_rate,
    }
}

/// Resolve the RTM revenue per patient episode: the per-code roll-up when the
/// advanced breakdown is active, the flat configured total otherwise.
pub fn rtm_episode_value(inputs: &FunnelInputs, breakdown: Option<&RtmCodeBreakdown>) -> f64 {
    match breakdown {
        Some(codes) => {
            let per_month = codes.monthly_98976
                + codes.per_visit_98980 * codes.visits_98980_per_month
                + codes.per_visit_98981 * codes.visits_98981_per_month;
            codes.init_98975 + per_month * inputs.avg_months_monitored
        }
        None => inputs.rtm_episode_total,
    }
}

/// Derive the full projection from the funnel assumptions. Total over its
/// input domain: every rate is trusted as given and a zero anywhere in the
/// funnel simply zeroes the downstream figures.
pub fn project(inputs: &FunnelInputs, breakdown: Option<&RtmCodeBreakdown>) -> Aggregates {
    let episode_value = rtm_episode_value(inputs, breakdown);
    let payer_factor = 1.0 - inputs.payer_mix_discount;
    let share = inputs.partner_share;

    let patients_per_year = inputs.new_patients_per_month * 12.0;
    let tested_patients_per_year = patients_per_year * inputs.testing_rate;
    let annual = service_cohorts(inputs, tested_patients_per_year);

    let gross_rtm = annual.rtm_patients * episode_value * payer_factor;
    let gross_reads = annual.read_count * inputs.read_reimbursement * payer_factor;
    let gross_g0552 = if inputs.include_g0552 {
        annual.g0552_patients * inputs.g0552_reimbursement * payer_factor
    } else {
        0.0
    };
    let gross_total = gross_rtm + gross_reads + gross_g0552;

    let partner_net = gross_total * share;
    let one_time_cost = if inputs.include_g0552 {
        annual.g0552_patients * inputs.g0552_cost
    } else {
        0.0
    };
    let partner_net_after_cost = partner_net - one_time_cost;
    let monthly_net_avg = partner_net_after_cost / 12.0;

    let mut months = Vec::with_capacity(PROJECTION_MONTHS);
    let mut monthly_adds = inputs.new_patients_per_month;
    for m in 1..=PROJECTION_MONTHS {
        let tested = monthly_adds * inputs.testing_rate;
        let cohort = service_cohorts(inputs, tested);

        let rtm_net = cohort.rtm_patients * episode_value * payer_factor * share;
        let reads_net = cohort.read_count * inputs.read_reimbursement * payer_factor * share;
        let g0552_net = if inputs.include_g0552 {
            cohort.g0552_patients * inputs.g0552_reimbursement * payer_factor * share
        } else {
            0.0
        };
        let month_cost = if inputs.include_g0552 {
            cohort.g0552_patients * inputs.g0552_cost
        } else {
            0.0
        };

        months.push(MonthPoint {
            month: format!("M{m}"),
            new_patients: monthly_adds,
            rtm_net,
            reads_net,
            g0552_net,
            g0552_cost: -month_cost,
            total_net: rtm_net + reads_net + g0552_net - month_cost,
        });

        // Growth compounds into the following month; month 1 always uses the
        // configured adds.
        if inputs.include_growth {
            monthly_adds *= 1.0 + inputs.monthly_growth_rate;
        }
    }

    Aggregates {
        patients_per_year,
        tested_patients_per_year,
        rtm_patients_per_year: annual.rtm_patients,
        read_count_per_year: annual.read_count,
        rtm_episode_value: episode_value,
        gross_rtm,
        gross_reads,
        gross_g0552,
        gross_total,
        partner_net,
        one_time_cost,
        partner_net_after_cost,
        monthly_net_avg,
        months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn sample_inputs() -> FunnelInputs {
        FunnelInputs {
            new_patients_per_month: 10.0,
            testing_rate: 1.0,
            read_rate: 0.60,
            reads_per_patient: 1.0,
            read_reimbursement: 1_980.0,
            rtm_enrollment_rate: 1.0,
            rtm_episode_total: 1_705.51,
            avg_months_monitored: 6.0,
            include_g0552: true,
            g0552_eligible_rate: 1.0,
            g0552_reimbursement: 7_350.0,
            g0552_cost: 1_000.0,
            payer_mix_discount: 0.10,
            partner_share: 0.50,
            include_growth: false,
            monthly_growth_rate: 0.05,
        }
    }

    fn sample_breakdown() -> RtmCodeBreakdown {
        RtmCodeBreakdown {
            init_98975: 75.0,
            monthly_98976: 55.0,
            per_visit_98980: 55.0,
            per_visit_98981: 45.0,
            visits_98980_per_month: 1.0,
            visits_98981_per_month: 1.0,
        }
    }

    #[test]
    fn worked_example_matches_hand_computed_totals() {
        let mut inputs = sample_inputs();
        inputs.payer_mix_discount = 0.0;

        let result = project(&inputs, None);

        // 120 RTM episodes + 72 reads + 120 one-time codes.
        assert_approx(result.patients_per_year, 120.0);
        assert_approx(result.tested_patients_per_year, 120.0);
        assert_approx(result.rtm_patients_per_year, 120.0);
        assert_approx(result.read_count_per_year, 72.0);
        assert_approx(result.gross_rtm, 204_661.2);
        assert_approx(result.gross_reads, 142_560.0);
        assert_approx(result.gross_g0552, 882_000.0);
        assert_approx(result.gross_total, 1_229_221.2);
        assert_approx(result.one_time_cost, 120_000.0);
        assert_approx(result.partner_net_after_cost, 494_610.6);
        assert_approx(result.monthly_net_avg, 494_610.6 / 12.0);
    }

    #[test]
    fn payer_discount_scales_every_gross_component() {
        let inputs = sample_inputs();
        let discounted = project(&inputs, None);

        let mut full = sample_inputs();
        full.payer_mix_discount = 0.0;
        let undiscounted = project(&full, None);

        assert_approx(discounted.gross_rtm, undiscounted.gross_rtm * 0.9);
        assert_approx(discounted.gross_reads, undiscounted.gross_reads * 0.9);
        assert_approx(discounted.gross_g0552, undiscounted.gross_g0552 * 0.9);
        // The one-time cost is not a reimbursement and takes no haircut.
        assert_approx(discounted.one_time_cost, undiscounted.one_time_cost);
    }

    #[test]
    fn disabling_g0552_zeroes_its_gross_and_cost_only() {
        let mut inputs = sample_inputs();
        inputs.include_g0552 = false;

        let result = project(&inputs, None);
        assert_approx(result.gross_g0552, 0.0);
        assert_approx(result.one_time_cost, 0.0);
        assert_approx(result.gross_total, result.gross_rtm + result.gross_reads);
        assert_approx(
            result.partner_net_after_cost,
            result.gross_total * inputs.partner_share,
        );

        for point in &result.months {
            assert_approx(point.g0552_net, 0.0);
            assert_approx(point.g0552_cost, 0.0);
        }
    }

    #[test]
    fn zero_testing_rate_collapses_downstream_to_zero() {
        let mut inputs = sample_inputs();
        inputs.testing_rate = 0.0;

        let result = project(&inputs, None);
        assert_approx(result.tested_patients_per_year, 0.0);
        assert_approx(result.gross_total, 0.0);
        assert_approx(result.partner_net_after_cost, 0.0);
        for point in &result.months {
            assert_approx(point.total_net, 0.0);
        }
    }

    #[test]
    fn growth_disabled_keeps_monthly_adds_constant() {
        let inputs = sample_inputs();
        let result = project(&inputs, None);

        assert_eq!(result.months.len(), 12);
        for point in &result.months {
            assert_approx(point.new_patients, inputs.new_patients_per_month);
        }
    }

    #[test]
    fn growth_compounds_from_month_two() {
        let mut inputs = sample_inputs();
        inputs.include_growth = true;
        inputs.monthly_growth_rate = 0.05;

        let result = project(&inputs, None);
        assert_approx(result.months[0].new_patients, 10.0);
        for k in 1..result.months.len() {
            assert_approx(
                result.months[k].new_patients,
                result.months[k - 1].new_patients * 1.05,
            );
        }
    }

    #[test]
    fn monthly_series_sums_to_annual_net_without_growth() {
        let inputs = sample_inputs();
        let result = project(&inputs, None);

        let series_net: f64 = result.months.iter().map(|p| p.total_net).sum();
        assert_approx_tol(series_net, result.partner_net_after_cost, 1e-6);
    }

    #[test]
    fn month_labels_run_m1_through_m12() {
        let result = project(&sample_inputs(), None);
        let labels: Vec<&str> = result.months.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(labels[0], "M1");
        assert_eq!(labels[11], "M12");
        assert_eq!(labels.len(), 12);
    }

    #[test]
    fn month_cost_entries_are_negated() {
        let result = project(&sample_inputs(), None);
        for point in &result.months {
            assert!(point.g0552_cost <= 0.0);
            assert_approx(
                point.total_net,
                point.rtm_net + point.reads_net + point.g0552_net + point.g0552_cost,
            );
        }
    }

    #[test]
    fn code_breakdown_rolls_up_to_episode_value() {
        let inputs = sample_inputs();
        let codes = sample_breakdown();

        // 75 + (55 + 55*1 + 45*1) * 6
        assert_approx(rtm_episode_value(&inputs, Some(&codes)), 1_005.0);
        assert_approx(rtm_episode_value(&inputs, None), 1_705.51);
    }

    #[test]
    fn code_breakdown_reproduces_simple_mode_when_totals_agree() {
        let codes = sample_breakdown();
        let mut inputs = sample_inputs();
        inputs.rtm_episode_total = 75.0 + (55.0 + 55.0 + 45.0) * inputs.avg_months_monitored;

        let simple = project(&inputs, None);
        let advanced = project(&inputs, Some(&codes));

        assert_approx(advanced.rtm_episode_value, simple.rtm_episode_value);
        assert_approx(advanced.gross_rtm, simple.gross_rtm);
        assert_approx(advanced.gross_total, simple.gross_total);
        assert_approx(
            advanced.partner_net_after_cost,
            simple.partner_net_after_cost,
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_gross_total_sums_service_components(
            patients in 0u32..500,
            testing_pct in 0u32..=100,
            read_pct in 0u32..=100,
            reads_per_patient in 0u32..5,
            read_fee in 0u32..10_000,
            rtm_pct in 0u32..=100,
            episode in 0u32..20_000,
            include_g0552 in proptest::bool::ANY,
            g0552_pct in 0u32..=100,
            g0552_fee in 0u32..20_000,
            g0552_cost in 0u32..5_000,
            discount_pct in 0u32..=50,
            share_pct in 0u32..=100
        ) {
            let inputs = FunnelInputs {
                new_patients_per_month: patients as f64,
                testing_rate: testing_pct as f64 / 100.0,
                read_rate: read_pct as f64 / 100.0,
                reads_per_patient: reads_per_patient as f64,
                read_reimbursement: read_fee as f64,
                rtm_enrollment_rate: rtm_pct as f64 / 100.0,
                rtm_episode_total: episode as f64,
                avg_months_monitored: 6.0,
                include_g0552,
                g0552_eligible_rate: g0552_pct as f64 / 100.0,
                g0552_reimbursement: g0552_fee as f64,
                g0552_cost: g0552_cost as f64,
                payer_mix_discount: discount_pct as f64 / 100.0,
                partner_share: share_pct as f64 / 100.0,
                include_growth: false,
                monthly_growth_rate: 0.0,
            };

            let result = project(&inputs, None);

            prop_assert!(result.gross_total.is_finite());
            prop_assert!(
                (result.gross_total - (result.gross_rtm + result.gross_reads + result.gross_g0552)).abs() <= 1e-6
            );
            prop_assert!(
                (result.partner_net_after_cost
                    - (result.gross_total * inputs.partner_share - result.one_time_cost)).abs() <= 1e-6
            );
            if !include_g0552 {
                prop_assert!(result.gross_g0552 == 0.0);
                prop_assert!(result.one_time_cost == 0.0);
            }
            prop_assert!(result.gross_rtm >= 0.0);
            prop_assert!(result.gross_reads >= 0.0);
            prop_assert!(result.gross_g0552 >= 0.0);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_monthly_series_is_finite_with_expense_sign_convention(
            patients in 0u32..200,
            testing_pct in 0u32..=100,
            growth_pct in 0u32..40,
            include_growth in proptest::bool::ANY,
            include_g0552 in proptest::bool::ANY
        ) {
            let inputs = FunnelInputs {
                new_patients_per_month: patients as f64,
                testing_rate: testing_pct as f64 / 100.0,
                read_rate: 0.6,
                reads_per_patient: 1.0,
                read_reimbursement: 1_980.0,
                rtm_enrollment_rate: 1.0,
                rtm_episode_total: 1_705.51,
                avg_months_monitored: 6.0,
                include_g0552,
                g0552_eligible_rate: 1.0,
                g0552_reimbursement: 7_350.0,
                g0552_cost: 1_000.0,
                payer_mix_discount: 0.10,
                partner_share: 0.50,
                include_growth,
                monthly_growth_rate: growth_pct as f64 / 100.0,
            };

            let result = project(&inputs, None);
            prop_assert!(result.months.len() == 12);

            for point in &result.months {
                prop_assert!(point.rtm_net.is_finite() && point.rtm_net >= 0.0);
                prop_assert!(point.reads_net.is_finite() && point.reads_net >= 0.0);
                prop_assert!(point.g0552_net.is_finite() && point.g0552_net >= 0.0);
                prop_assert!(point.g0552_cost.is_finite() && point.g0552_cost <= 0.0);
                prop_assert!(point.total_net.is_finite());
            }

            if !include_growth {
                for point in &result.months {
                    prop_assert!((point.new_patients - inputs.new_patients_per_month).abs() <= 1e-9);
                }
            } else {
                for k in 1..result.months.len() {
                    let expected = result.months[k - 1].new_patients * (1.0 + inputs.monthly_growth_rate);
                    prop_assert!((result.months[k].new_patients - expected).abs() <= 1e-6);
                }
            }
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_projection_is_deterministic(
            patients in 0u32..300,
            testing_pct in 0u32..=100,
            share_pct in 0u32..=100
        ) {
            let mut inputs = sample_inputs();
            inputs.new_patients_per_month = patients as f64;
            inputs.testing_rate = testing_pct as f64 / 100.0;
            inputs.partner_share = share_pct as f64 / 100.0;

            let a = project(&inputs, None);
            let b = project(&inputs, None);

            prop_assert!(a.gross_total == b.gross_total);
            prop_assert!(a.partner_net_after_cost == b.partner_net_after_cost);
            for (x, y) in a.months.iter().zip(b.months.iter()) {
                prop_assert!(x.total_net == y.total_net);
                prop_assert!(x.new_patients == y.new_patients);
            }
        }
    }
}
