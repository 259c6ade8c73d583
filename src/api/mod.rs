use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    Aggregates, CSV_FILENAME, FunnelInputs, RtmCodeBreakdown, monthly_csv, project,
};
use crate::gate::{Gate, GateError};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

/// Form-level state: the values a visitor can edit, percent-form exactly as
/// the page shows them. Converted to core fractions by `build_inputs`.
#[derive(Debug, Clone)]
struct ProjectionForm {
    new_patients_per_month: f64,
    testing_rate_pct: f64,
    neuro_read_rate_pct: f64,
    neuro_reads_per_patient: f64,
    neuro_read_reimbursement: f64,
    rtm_eligible_pct: f64,
    rtm_total_per_patient_episode: f64,
    avg_months_monitored: f64,
    include_g0552: bool,
    g0552_eligible_pct: f64,
    g0552_reimbursement_one_time: f64,
    g0552_cost: f64,
    payer_mix_discount_pct: f64,
    partner_share_pct: f64,
    include_growth: bool,
    monthly_growth_pct: f64,
    use_per_code_breakdown: bool,
    cpt_98975: f64,
    cpt_98976: f64,
    cpt_98980: f64,
    cpt_98981: f64,
    visits_98980_per_month: f64,
    visits_98981_per_month: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    new_patients_per_month: Option<f64>,
    testing_rate_pct: Option<f64>,
    neuro_read_rate_pct: Option<f64>,
    neuro_reads_per_patient: Option<f64>,
    neuro_read_reimbursement: Option<f64>,
    rtm_eligible_pct: Option<f64>,
    rtm_total_per_patient_episode: Option<f64>,
    avg_months_monitored: Option<f64>,
    include_g0552: Option<bool>,
    g0552_eligible_pct: Option<f64>,
    g0552_reimbursement_one_time: Option<f64>,
    g0552_cost: Option<f64>,
    payer_mix_discount_pct: Option<f64>,
    partner_share_pct: Option<f64>,
    include_growth: Option<bool>,
    monthly_growth_pct: Option<f64>,
    use_per_code_breakdown: Option<bool>,
    cpt98975: Option<f64>,
    cpt98976: Option<f64>,
    cpt98980: Option<f64>,
    cpt98981: Option<f64>,
    visits98980_per_month: Option<f64>,
    visits98981_per_month: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GatePayload {
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GateResponse {
    unlocked: bool,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    unlocked: bool,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Initial form state, matching what the page renders before any edit.
fn default_form() -> ProjectionForm {
    ProjectionForm {
        new_patients_per_month: 10.0,
        testing_rate_pct: 100.0,
        neuro_read_rate_pct: 60.0,
        neuro_reads_per_patient: 1.0,
        neuro_read_reimbursement: 1_980.0,
        rtm_eligible_pct: 100.0,
        rtm_total_per_patient_episode: 1_705.51,
        avg_months_monitored: 6.0,
        include_g0552: true,
        g0552_eligible_pct: 100.0,
        g0552_reimbursement_one_time: 7_350.0,
        g0552_cost: 1_000.0,
        payer_mix_discount_pct: 10.0,
        partner_share_pct: 50.0,
        include_growth: true,
        monthly_growth_pct: 5.0,
        use_per_code_breakdown: false,
        cpt_98975: 75.0,
        cpt_98976: 55.0,
        cpt_98980: 55.0,
        cpt_98981: 45.0,
        visits_98980_per_month: 1.0,
        visits_98981_per_month: 1.0,
    }
}

fn apply_payload(form: &mut ProjectionForm, payload: ProjectPayload) {
    if let Some(v) = payload.new_patients_per_month {
        form.new_patients_per_month = v;
    }
    if let Some(v) = payload.testing_rate_pct {
        form.testing_rate_pct = v;
    }
    if let Some(v) = payload.neuro_read_rate_pct {
        form.neuro_read_rate_pct = v;
    }
    if let Some(v) = payload.neuro_reads_per_patient {
        form.neuro_reads_per_patient = v;
    }
    if let Some(v) = payload.neuro_read_reimbursement {
        form.neuro_read_reimbursement = v;
    }
    if let Some(v) = payload.rtm_eligible_pct {
        form.rtm_eligible_pct = v;
    }
    if let Some(v) = payload.rtm_total_per_patient_episode {
        form.rtm_total_per_patient_episode = v;
    }
    if let Some(v) = payload.avg_months_monitored {
        form.avg_months_monitored = v;
    }
    if let Some(v) = payload.include_g0552 {
        form.include_g0552 = v;
    }
    if let Some(v) = payload.g0552_eligible_pct {
        form.g0552_eligible_pct = v;
    }
    if let Some(v) = payload.g0552_reimbursement_one_time {
        form.g0552_reimbursement_one_time = v;
    }
    if let Some(v) = payload.g0552_cost {
        form.g0552_cost = v;
    }
    if let Some(v) = payload.payer_mix_discount_pct {
        form.payer_mix_discount_pct = v;
    }
    if let Some(v) = payload.partner_share_pct {
        form.partner_share_pct = v;
    }
    if let Some(v) = payload.include_growth {
        form.include_growth = v;
    }
    if let Some(v) = payload.monthly_growth_pct {
        form.monthly_growth_pct = v;
    }
    if let Some(v) = payload.use_per_code_breakdown {
        form.use_per_code_breakdown = v;
    }
    if let Some(v) = payload.cpt98975 {
        form.cpt_98975 = v;
    }
    if let Some(v) = payload.cpt98976 {
        form.cpt_98976 = v;
    }
    if let Some(v) = payload.cpt98980 {
        form.cpt_98980 = v;
    }
    if let Some(v) = payload.cpt98981 {
        form.cpt_98981 = v;
    }
    if let Some(v) = payload.visits98980_per_month {
        form.visits_98980_per_month = v;
    }
    if let Some(v) = payload.visits98981_per_month {
        form.visits_98981_per_month = v;
    }
}

/// Convert the percent-form values to core fractions. Percentages are
/// trusted as given (no clamping); only non-finite values are rejected
/// because they would poison every derived figure.
fn build_inputs(
    form: &ProjectionForm,
) -> Result<(FunnelInputs, Option<RtmCodeBreakdown>), String> {
    for (name, value) in [
        ("newPatientsPerMonth", form.new_patients_per_month),
        ("testingRatePct", form.testing_rate_pct),
        ("neuroReadRatePct", form.neuro_read_rate_pct),
        ("neuroReadsPerPatient", form.neuro_reads_per_patient),
        ("neuroReadReimbursement", form.neuro_read_reimbursement),
        ("rtmEligiblePct", form.rtm_eligible_pct),
        (
            "rtmTotalPerPatientEpisode",
            form.rtm_total_per_patient_episode,
        ),
        ("avgMonthsMonitored", form.avg_months_monitored),
        ("g0552EligiblePct", form.g0552_eligible_pct),
        (
            "g0552ReimbursementOneTime",
            form.g0552_reimbursement_one_time,
        ),
        ("g0552Cost", form.g0552_cost),
        ("payerMixDiscountPct", form.payer_mix_discount_pct),
        ("partnerSharePct", form.partner_share_pct),
        ("monthlyGrowthPct", form.monthly_growth_pct),
        ("cpt98975", form.cpt_98975),
        ("cpt98976", form.cpt_98976),
        ("cpt98980", form.cpt_98980),
        ("cpt98981", form.cpt_98981),
        ("visits98980PerMonth", form.visits_98980_per_month),
        ("visits98981PerMonth", form.visits_98981_per_month),
    ] {
        if !value.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
    }

    let inputs = FunnelInputs {
        new_patients_per_month: form.new_patients_per_month,
        testing_rate: form.testing_rate_pct / 100.0,
        read_rate: form.neuro_read_rate_pct / 100.0,
        reads_per_patient: form.neuro_reads_per_patient,
        read_reimbursement: form.neuro_read_reimbursement,
        rtm_enrollment_rate: form.rtm_eligible_pct / 100.0,
        rtm_episode_total: form.rtm_total_per_patient_episode,
        avg_months_monitored: form.avg_months_monitored,
        include_g0552: form.include_g0552,
        g0552_eligible_rate: form.g0552_eligible_pct / 100.0,
        g0552_reimbursement: form.g0552_reimbursement_one_time,
        g0552_cost: form.g0552_cost,
        payer_mix_discount: form.payer_mix_discount_pct / 100.0,
        partner_share: form.partner_share_pct / 100.0,
        include_growth: form.include_growth,
        monthly_growth_rate: form.monthly_growth_pct / 100.0,
    };

    let breakdown = form.use_per_code_breakdown.then_some(RtmCodeBreakdown {
        init_98975: form.cpt_98975,
        monthly_98976: form.cpt_98976,
        per_visit_98980: form.cpt_98980,
        per_visit_98981: form.cpt_98981,
        visits_98980_per_month: form.visits_98980_per_month,
        visits_98981_per_month: form.visits_98981_per_month,
    });

    Ok((inputs, breakdown))
}

fn project_from_payload(payload: ProjectPayload) -> Result<Aggregates, String> {
    let mut form = default_form();
    apply_payload(&mut form, payload);
    let (inputs, breakdown) = build_inputs(&form)?;
    Ok(project(&inputs, breakdown.as_ref()))
}

pub async fn run_http_server(port: u16, gate: Gate) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/export.csv",
            get(export_get_handler).post(export_post_handler),
        )
        .route("/api/gate", post(gate_handler))
        .route("/api/session", get(session_handler))
        .fallback(not_found_handler)
        .with_state(Arc::new(gate));

    let listener = TcpListener::bind(addr).await?;
    info!("proforma HTTP server listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    match project_from_payload(payload) {
        Ok(aggregates) => json_response(StatusCode::OK, aggregates),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn export_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    export_handler_impl(payload)
}

async fn export_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    export_handler_impl(payload)
}

fn export_handler_impl(payload: ProjectPayload) -> Response {
    match project_from_payload(payload) {
        Ok(aggregates) => csv_response(monthly_csv(&aggregates.months)),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn gate_handler(
    State(gate): State<Arc<Gate>>,
    Json(payload): Json<GatePayload>,
) -> Response {
    match gate.submit(&payload.email) {
        Ok(email) => json_response(
            StatusCode::OK,
            GateResponse {
                unlocked: true,
                email,
            },
        ),
        Err(e @ GateError::InvalidEmail) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn session_handler(State(gate): State<Arc<Gate>>) -> Response {
    let email = gate.stored_email();
    json_response(
        StatusCode::OK,
        SessionResponse {
            unlocked: email.is_some(),
            email,
        },
    )
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn csv_response(body: String) -> Response {
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{CSV_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
