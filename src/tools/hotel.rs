use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ToolDeclaration, ToolExecutor, ToolHandler, ToolRegistry, optional_str, require_str};
use crate::core::context::ContextBuilder;
use crate::jobs::JobRunner;
use crate::jobs::report::ReportJob;
use crate::store::{Booking, BookingStatus, HotelStore};

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{}', expected YYYY-MM-DD", raw))
}

fn date_arg(args: &Value, field: &str) -> Result<NaiveDate> {
    parse_date(require_str(args, field)?)
}

fn booking_json(b: &Booking) -> Value {
    // Guest email stays server-side; the model only needs operational fields.
    json!({
        "id": b.id,
        "guest_name": b.guest_name,
        "room_type": b.room_type,
        "status": b.status,
        "check_in": b.check_in.to_string(),
        "check_out": b.check_out.to_string(),
        "amount": b.amount,
    })
}

/// The fixed hotel tool catalog. Adding a tool here requires registering a
/// handler in `hotel_executor` as well; `ToolExecutor::verify` enforces the
/// pairing at startup.
pub fn hotel_registry() -> ToolRegistry {
    let object = |properties: Value, required: Vec<&str>| {
        json!({ "type": "object", "properties": properties, "required": required })
    };
    let date_prop = json!({ "type": "string", "description": "Date in YYYY-MM-DD format" });

    ToolRegistry::new(vec![
        ToolDeclaration::new(
            "get_today_snapshot",
            "Today's operational snapshot: arrivals, departures, occupancy, weekly totals",
            object(json!({}), vec![]),
        ),
        ToolDeclaration::new(
            "get_bookings",
            "List bookings, optionally filtered by check-in date range and/or status",
            object(
                json!({
                    "start_date": date_prop,
                    "end_date": date_prop,
                    "status": { "type": "string", "description": "pending | confirmed | checked_in | checked_out | cancelled" },
                }),
                vec![],
            ),
        ),
        ToolDeclaration::new(
            "get_guest_details",
            "Bookings for a guest, matched by name (case-insensitive substring)",
            object(
                json!({ "name": { "type": "string", "description": "Guest name to search for" } }),
                vec!["name"],
            ),
        ),
        ToolDeclaration::new(
            "get_room_availability",
            "Per-room-type availability on a date (defaults to today)",
            object(json!({ "date": date_prop }), vec![]),
        ),
        ToolDeclaration::new(
            "get_revenue",
            "Total revenue and booking count over a date range",
            object(
                json!({ "start_date": date_prop, "end_date": date_prop }),
                vec!["start_date", "end_date"],
            ),
        ),
        ToolDeclaration::new(
            "get_weekly_stats",
            "Booking count and revenue over the trailing seven days",
            object(json!({}), vec![]),
        ),
        ToolDeclaration::new(
            "update_booking_status",
            "Change the status of a booking",
            object(
                json!({
                    "booking_id": { "type": "string" },
                    "status": { "type": "string", "description": "pending | confirmed | checked_in | checked_out | cancelled" },
                }),
                vec!["booking_id", "status"],
            ),
        ),
        ToolDeclaration::new(
            "generate_report",
            "Queue a background report over a date range, delivered by email when ready",
            object(
                json!({
                    "report_type": { "type": "string", "description": "e.g. monthly, weekly, occupancy" },
                    "start_date": date_prop,
                    "end_date": date_prop,
                    "recipient_email": { "type": "string" },
                }),
                vec!["report_type", "start_date", "end_date", "recipient_email"],
            ),
        ),
    ])
}

/// Wires every catalog entry to its handler.
pub fn hotel_executor(store: Arc<dyn HotelStore>, jobs: Arc<JobRunner>) -> ToolExecutor {
    let mut executor = ToolExecutor::new(hotel_registry());
    executor.register(
        "get_today_snapshot",
        Arc::new(TodaySnapshot {
            context: ContextBuilder::new(Arc::clone(&store)),
        }),
    );
    executor.register("get_bookings", Arc::new(GetBookings { store: Arc::clone(&store) }));
    executor.register(
        "get_guest_details",
        Arc::new(GuestDetails { store: Arc::clone(&store) }),
    );
    executor.register(
        "get_room_availability",
        Arc::new(RoomAvailability { store: Arc::clone(&store) }),
    );
    executor.register("get_revenue", Arc::new(Revenue { store: Arc::clone(&store) }));
    executor.register(
        "get_weekly_stats",
        Arc::new(WeeklyStats { store: Arc::clone(&store) }),
    );
    executor.register(
        "update_booking_status",
        Arc::new(UpdateBookingStatus { store }),
    );
    executor.register("generate_report", Arc::new(GenerateReport { jobs }));
    executor
}

struct TodaySnapshot {
    context: ContextBuilder,
}

#[async_trait]
impl ToolHandler for TodaySnapshot {
    async fn run(&self, _args: &Value) -> Result<Value> {
        let snapshot = self.context.build().await?;
        Ok(serde_json::to_value(snapshot)?)
    }
}

struct GetBookings {
    store: Arc<dyn HotelStore>,
}

#[async_trait]
impl ToolHandler for GetBookings {
    async fn run(&self, args: &Value) -> Result<Value> {
        let status = match optional_str(args, "status") {
            Some(raw) => Some(BookingStatus::parse(raw)?),
            None => None,
        };

        let bookings = match (optional_str(args, "start_date"), optional_str(args, "end_date")) {
            (Some(start), Some(end)) => {
                self.store
                    .bookings_between(parse_date(start)?, parse_date(end)?)
                    .await?
            }
            (None, None) => self.store.all_bookings().await?,
            _ => return Err(anyhow!("start_date and end_date must be given together")),
        };

        let filtered: Vec<Value> = bookings
            .iter()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .map(booking_json)
            .collect();
        Ok(json!({ "count": filtered.len(), "bookings": filtered }))
    }
}

struct GuestDetails {
    store: Arc<dyn HotelStore>,
}

#[async_trait]
impl ToolHandler for GuestDetails {
    async fn run(&self, args: &Value) -> Result<Value> {
        let needle = require_str(args, "name")?.to_lowercase();
        let bookings = self.store.all_bookings().await?;
        let matches: Vec<Value> = bookings
            .iter()
            .filter(|b| b.guest_name.to_lowercase().contains(&needle))
            .map(booking_json)
            .collect();
        Ok(json!({ "count": matches.len(), "bookings": matches }))
    }
}

struct RoomAvailability {
    store: Arc<dyn HotelStore>,
}

#[async_trait]
impl ToolHandler for RoomAvailability {
    async fn run(&self, args: &Value) -> Result<Value> {
        let date = match optional_str(args, "date") {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };

        let rooms = self.store.room_counts().await?;
        let bookings = self.store.all_bookings().await?;

        let mut by_type: Vec<Value> = rooms
            .iter()
            .map(|(room_type, total)| {
                let occupied = bookings
                    .iter()
                    .filter(|b| {
                        b.room_type == *room_type
                            && b.check_in <= date
                            && b.check_out > date
                            && matches!(
                                b.status,
                                BookingStatus::Confirmed | BookingStatus::CheckedIn
                            )
                    })
                    .count() as u32;
                json!({
                    "room_type": room_type,
                    "total": total,
                    "occupied": occupied,
                    "available": total.saturating_sub(occupied),
                })
            })
            .collect();
        by_type.sort_by(|a, b| a["room_type"].as_str().cmp(&b["room_type"].as_str()));

        Ok(json!({ "date": date.to_string(), "rooms": by_type }))
    }
}

struct Revenue {
    store: Arc<dyn HotelStore>,
}

#[async_trait]
impl ToolHandler for Revenue {
    async fn run(&self, args: &Value) -> Result<Value> {
        let start = date_arg(args, "start_date")?;
        let end = date_arg(args, "end_date")?;
        let bookings = self.store.bookings_between(start, end).await?;
        let active: Vec<&Booking> = bookings
            .iter()
            .filter(|b| b.status != BookingStatus::Cancelled)
            .collect();
        let total: f64 = active.iter().map(|b| b.amount).sum();
        Ok(json!({
            "start_date": start.to_string(),
            "end_date": end.to_string(),
            "bookings": active.len(),
            "total_revenue": total,
        }))
    }
}

struct WeeklyStats {
    store: Arc<dyn HotelStore>,
}

#[async_trait]
impl ToolHandler for WeeklyStats {
    async fn run(&self, _args: &Value) -> Result<Value> {
        let today = Utc::now().date_naive();
        let bookings = self
            .store
            .bookings_between(today - Duration::days(6), today)
            .await?;
        let active: Vec<&Booking> = bookings
            .iter()
            .filter(|b| b.status != BookingStatus::Cancelled)
            .collect();
        let revenue: f64 = active.iter().map(|b| b.amount).sum();
        Ok(json!({ "weekly_bookings": active.len(), "weekly_revenue": revenue }))
    }
}

struct UpdateBookingStatus {
    store: Arc<dyn HotelStore>,
}

#[async_trait]
impl ToolHandler for UpdateBookingStatus {
    async fn run(&self, args: &Value) -> Result<Value> {
        let id = require_str(args, "booking_id")?;
        let status = BookingStatus::parse(require_str(args, "status")?)?;
        let updated = self.store.update_booking_status(id, status).await?;
        Ok(json!({ "updated": booking_json(&updated) }))
    }
}

struct GenerateReport {
    jobs: Arc<JobRunner>,
}

#[async_trait]
impl ToolHandler for GenerateReport {
    async fn run(&self, args: &Value) -> Result<Value> {
        let job = ReportJob {
            report_type: require_str(args, "report_type")?.to_string(),
            start_date: date_arg(args, "start_date")?,
            end_date: date_arg(args, "end_date")?,
            recipient_email: require_str(args, "recipient_email")?.to_string(),
        };
        if job.end_date < job.start_date {
            return Err(anyhow!("end_date precedes start_date"));
        }
        let recipient = job.recipient_email.clone();
        // Fire-and-forget: the chat response never waits on the job.
        let job_id = self.jobs.enqueue(job);
        Ok(json!({
            "queued": true,
            "job_id": job_id,
            "note": format!("Report will be emailed to {}", recipient),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::email::EmailDelivery;
    use crate::jobs::journal::StepJournal;
    use crate::jobs::{JobRunner, RetryPolicy};
    use crate::store::InMemoryStore;
    use tokio::sync::Mutex;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[derive(Default)]
    struct NullMailer {
        sent: Mutex<usize>,
    }

    #[async_trait]
    impl EmailDelivery for NullMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
            *self.sent.lock().await += 1;
            Ok(())
        }
    }

    fn executor() -> ToolExecutor {
        let store: Arc<dyn HotelStore> = Arc::new(InMemoryStore::seeded(date("2024-06-10")));
        let jobs = Arc::new(JobRunner::new(
            Arc::new(StepJournal::in_memory().unwrap()),
            Arc::clone(&store),
            Arc::new(NullMailer::default()),
            RetryPolicy {
                max_attempts: 1,
                base_delay: std::time::Duration::ZERO,
            },
        ));
        hotel_executor(store, jobs)
    }

    #[test]
    fn catalog_and_handlers_are_consistent() {
        executor().verify().unwrap();
    }

    #[tokio::test]
    async fn get_bookings_filters_by_status() {
        let executor = executor();
        let result = executor
            .execute("get_bookings", &json!({ "status": "checked_in" }))
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["count"], 2);
        for b in data["bookings"].as_array().unwrap() {
            assert_eq!(b["status"], "checked_in");
        }
    }

    #[tokio::test]
    async fn get_bookings_rejects_half_open_range() {
        let executor = executor();
        let result = executor
            .execute("get_bookings", &json!({ "start_date": "2024-06-01" }))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("together"));
    }

    #[tokio::test]
    async fn guest_details_matches_case_insensitively() {
        let executor = executor();
        let result = executor
            .execute("get_guest_details", &json!({ "name": "asha" }))
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["bookings"][0]["guest_name"], "Asha Rao");
    }

    #[tokio::test]
    async fn revenue_excludes_cancelled_bookings() {
        let executor = executor();
        let result = executor
            .execute(
                "get_revenue",
                &json!({ "start_date": "2024-06-04", "end_date": "2024-06-12" }),
            )
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        // Cancelled b-1005 (520.0) falls inside the range but is excluded:
        // 240 + 270 + 310 + 180 + 175 from the five active seed bookings.
        assert_eq!(data["bookings"], 5);
        assert_eq!(data["total_revenue"].as_f64().unwrap(), 1175.0);
    }

    #[tokio::test]
    async fn room_availability_reports_all_room_types() {
        let executor = executor();
        let result = executor
            .execute("get_room_availability", &json!({ "date": "2024-06-10" }))
            .await;
        assert!(result.success);
        let rooms = result.data.unwrap()["rooms"].as_array().unwrap().clone();
        assert_eq!(rooms.len(), 3);
        for room in &rooms {
            let total = room["total"].as_u64().unwrap();
            let available = room["available"].as_u64().unwrap();
            assert!(available <= total);
        }
    }

    #[tokio::test]
    async fn update_booking_status_round_trips() {
        let executor = executor();
        let result = executor
            .execute(
                "update_booking_status",
                &json!({ "booking_id": "b-1003", "status": "confirmed" }),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["updated"]["status"], "confirmed");
    }

    #[tokio::test]
    async fn update_booking_status_validates_status() {
        let executor = executor();
        let result = executor
            .execute(
                "update_booking_status",
                &json!({ "booking_id": "b-1003", "status": "vanished" }),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown booking status"));
    }

    #[tokio::test]
    async fn generate_report_queues_and_returns_job_id() {
        let executor = executor();
        let result = executor
            .execute(
                "generate_report",
                &json!({
                    "report_type": "monthly",
                    "start_date": "2024-06-01",
                    "end_date": "2024-06-30",
                    "recipient_email": "gm@example.com",
                }),
            )
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["queued"], true);
        assert!(!data["job_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_report_rejects_inverted_range() {
        let executor = executor();
        let result = executor
            .execute(
                "generate_report",
                &json!({
                    "report_type": "monthly",
                    "start_date": "2024-06-30",
                    "end_date": "2024-06-01",
                    "recipient_email": "gm@example.com",
                }),
            )
            .await;
        assert!(!result.success);
    }
}
