use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use super::super::AppState;
use crate::jobs::report::ReportJob;

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Queues a report job and returns immediately. The 202 carries the job id;
/// progress and delivery happen in the background runner.
pub async fn enqueue_report_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    let Some(report_type) = payload.get("report_type").and_then(Value::as_str) else {
        return bad_request("report_type is required");
    };
    let Some(recipient) = payload.get("recipient_email").and_then(Value::as_str) else {
        return bad_request("recipient_email is required");
    };
    if !recipient.contains('@') {
        return bad_request("recipient_email is not a valid address");
    }

    let parse_date = |field: &str| {
        payload
            .get(field)
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    };
    let Some(start_date) = parse_date("start_date") else {
        return bad_request("start_date must be a YYYY-MM-DD date");
    };
    let Some(end_date) = parse_date("end_date") else {
        return bad_request("end_date must be a YYYY-MM-DD date");
    };
    if end_date < start_date {
        return bad_request("end_date must not precede start_date");
    }

    let job = ReportJob {
        report_type: report_type.to_string(),
        start_date,
        end_date,
        recipient_email: recipient.to_string(),
    };
    let job_id = state.jobs.enqueue(job);
    info!("Report job {job_id} accepted ({report_type}, {start_date} to {end_date})");

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "success": true, "job_id": job_id })),
    )
        .into_response()
}
