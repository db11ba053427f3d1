use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::{BookingStatus, HotelStore};

/// Freshly computed summary of current operational state, injected into
/// every conversation turn as ambient grounding. Never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub arrivals: u32,
    pub departures: u32,
    pub checked_in: u32,
    pub pending: u32,
    pub weekly_bookings: u32,
    pub weekly_revenue: f64,
}

impl ContextSnapshot {
    /// Deterministic textual rendering for the model's system prompt.
    pub fn to_prompt(&self) -> String {
        format!(
            "CURRENT HOTEL STATE:\n\
             - Arrivals today: {}\n\
             - Departures today: {}\n\
             - Guests checked in: {}\n\
             - Pending bookings: {}\n\
             - Bookings this week: {}\n\
             - Revenue this week: {:.2}\n",
            self.arrivals,
            self.departures,
            self.checked_in,
            self.pending,
            self.weekly_bookings,
            self.weekly_revenue,
        )
    }
}

#[derive(Clone)]
pub struct ContextBuilder {
    store: Arc<dyn HotelStore>,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn HotelStore>) -> Self {
        Self { store }
    }

    pub async fn build(&self) -> Result<ContextSnapshot> {
        self.build_for(Utc::now().date_naive()).await
    }

    pub async fn build_for(&self, today: NaiveDate) -> Result<ContextSnapshot> {
        let bookings = self.store.all_bookings().await?;
        let week_start = today - Duration::days(6);

        let mut snapshot = ContextSnapshot::default();
        for b in &bookings {
            if b.status == BookingStatus::Cancelled {
                continue;
            }
            if b.check_in == today {
                snapshot.arrivals += 1;
            }
            if b.check_out == today {
                snapshot.departures += 1;
            }
            if b.status == BookingStatus::CheckedIn {
                snapshot.checked_in += 1;
            }
            if b.status == BookingStatus::Pending {
                snapshot.pending += 1;
            }
            if b.check_in >= week_start && b.check_in <= today {
                snapshot.weekly_bookings += 1;
                snapshot.weekly_revenue += b.amount;
            }
        }
        Ok(snapshot)
    }
}
