use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::{Booking, BookingStatus};

/// A report request, submitted through `POST /api/reports` or the
/// `generate_report` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportJob {
    pub report_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub recipient_email: String,
}

/// Summary analytics derived from the gathered bookings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportAnalytics {
    pub total_bookings: u32,
    pub total_revenue: f64,
    pub avg_booking_value: f64,
    pub cancelled: u32,
    /// Room types by booking count, descending, ties broken by name.
    pub top_room_types: Vec<(String, u32)>,
}

pub fn compute_analytics(bookings: &[Booking]) -> ReportAnalytics {
    let mut analytics = ReportAnalytics::default();
    let mut by_room: std::collections::HashMap<String, u32> = std::collections::HashMap::new();

    for b in bookings {
        if b.status == BookingStatus::Cancelled {
            analytics.cancelled += 1;
            continue;
        }
        analytics.total_bookings += 1;
        analytics.total_revenue += b.amount;
        *by_room.entry(b.room_type.clone()).or_default() += 1;
    }

    if analytics.total_bookings > 0 {
        analytics.avg_booking_value =
            analytics.total_revenue / f64::from(analytics.total_bookings);
    }

    let mut ranked: Vec<(String, u32)> = by_room.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(3);
    analytics.top_room_types = ranked;
    analytics
}

/// Human-readable insight sentences from fixed heuristics. Sentences that
/// depend on a non-zero booking count are omitted when there were none.
pub fn build_insights(analytics: &ReportAnalytics) -> Vec<String> {
    let mut insights = Vec::new();

    if analytics.total_bookings == 0 {
        insights.push("No bookings were recorded in this period.".to_string());
    } else {
        insights.push(format!(
            "{} bookings brought in {:.2} in revenue.",
            analytics.total_bookings, analytics.total_revenue
        ));
        insights.push(format!(
            "The average booking was worth {:.2}.",
            analytics.avg_booking_value
        ));
        if let Some((room, count)) = analytics.top_room_types.first() {
            insights.push(format!(
                "The most requested room type was '{}' with {} bookings.",
                room, count
            ));
        }
    }

    if analytics.cancelled > 0 {
        insights.push(format!(
            "{} bookings were cancelled in this period.",
            analytics.cancelled
        ));
    }

    insights
}

/// Plain-text report document. Rendering a PDF or rich layout is the concern
/// of an external formatter; the pipeline contract only requires a document.
pub fn render_report(job: &ReportJob, analytics: &ReportAnalytics, insights: &[String]) -> String {
    let mut doc = String::new();
    doc.push_str(&format!(
        "{} report: {} to {}\n\n",
        job.report_type, job.start_date, job.end_date
    ));
    doc.push_str(&format!("Total bookings: {}\n", analytics.total_bookings));
    doc.push_str(&format!("Total revenue: {:.2}\n", analytics.total_revenue));
    doc.push_str(&format!(
        "Average booking value: {:.2}\n",
        analytics.avg_booking_value
    ));
    if !analytics.top_room_types.is_empty() {
        doc.push_str("Top room types:\n");
        for (room, count) in &analytics.top_room_types {
            doc.push_str(&format!("  - {}: {}\n", room, count));
        }
    }
    doc.push_str("\nInsights:\n");
    for insight in insights {
        doc.push_str(&format!("  * {}\n", insight));
    }
    doc
}
