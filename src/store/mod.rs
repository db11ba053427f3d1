use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "checked_in" => Ok(Self::CheckedIn),
            "checked_out" => Ok(Self::CheckedOut),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(anyhow!("Unknown booking status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub room_type: String,
    pub status: BookingStatus,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub amount: f64,
}

/// Boundary to the hotel data model. Persistence is an external collaborator;
/// the assistant only needs these few queries plus one status mutation.
#[async_trait]
pub trait HotelStore: Send + Sync {
    /// Cheap reachability probe used as the first step of background jobs.
    async fn ping(&self) -> Result<()>;

    async fn all_bookings(&self) -> Result<Vec<Booking>>;

    /// Bookings whose check-in date falls inside [start, end] inclusive.
    async fn bookings_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Booking>>;

    /// Total rooms per room type.
    async fn room_counts(&self) -> Result<HashMap<String, u32>>;

    /// Applies the status change and returns the updated record. The change
    /// is visible in the returned booking or it did not happen.
    async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<Booking>;
}

/// In-memory store backing tests and local development.
pub struct InMemoryStore {
    bookings: Mutex<Vec<Booking>>,
    rooms: HashMap<String, u32>,
}

impl InMemoryStore {
    pub fn new(bookings: Vec<Booking>, rooms: HashMap<String, u32>) -> Self {
        Self {
            bookings: Mutex::new(bookings),
            rooms,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), HashMap::new())
    }

    /// A small plausible dataset anchored on `today`, for demos and tests.
    pub fn seeded(today: NaiveDate) -> Self {
        let day = |offset: i64| today + chrono::Duration::days(offset);
        let booking = |id: &str,
                       guest: &str,
                       room: &str,
                       status: BookingStatus,
                       check_in: NaiveDate,
                       nights: i64,
                       amount: f64| Booking {
            id: id.to_string(),
            guest_name: guest.to_string(),
            guest_email: format!("{}@example.com", id),
            room_type: room.to_string(),
            status,
            check_in,
            check_out: check_in + chrono::Duration::days(nights),
            amount,
        };

        let bookings = vec![
            booking("b-1001", "Asha Rao", "deluxe", BookingStatus::Confirmed, day(0), 2, 240.0),
            booking("b-1002", "Jonas Weber", "standard", BookingStatus::CheckedIn, day(-1), 3, 270.0),
            booking("b-1003", "Mei Lin", "suite", BookingStatus::Pending, day(0), 1, 310.0),
            booking("b-1004", "Tomás Silva", "standard", BookingStatus::CheckedIn, day(-2), 2, 180.0),
            booking("b-1005", "Fatima Noor", "deluxe", BookingStatus::Cancelled, day(1), 4, 520.0),
            booking("b-1006", "Priya Nair", "standard", BookingStatus::Confirmed, day(-5), 2, 175.0),
            booking("b-1007", "Liam Doyle", "suite", BookingStatus::CheckedOut, day(-6), 3, 660.0),
        ];

        let rooms = HashMap::from([
            ("standard".to_string(), 20),
            ("deluxe".to_string(), 10),
            ("suite".to_string(), 4),
        ]);

        Self::new(bookings, rooms)
    }
}

#[async_trait]
impl HotelStore for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.bookings.lock().await.clone())
    }

    async fn bookings_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Booking>> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .iter()
            .filter(|b| b.check_in >= start && b.check_in <= end)
            .cloned()
            .collect())
    }

    async fn room_counts(&self) -> Result<HashMap<String, u32>> {
        Ok(self.rooms.clone())
    }

    async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<Booking> {
        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| anyhow!("Booking not found: {}", id))?;
        booking.status = status;
        Ok(booking.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn bookings_between_is_inclusive_on_check_in() {
        let store = InMemoryStore::seeded(date("2024-06-10"));
        let hits = store
            .bookings_between(date("2024-06-10"), date("2024-06-10"))
            .await
            .unwrap();
        assert!(hits.iter().all(|b| b.check_in == date("2024-06-10")));
        assert_eq!(hits.len(), 2); // b-1001 and b-1003
    }

    #[tokio::test]
    async fn update_status_returns_mutated_record() {
        let store = InMemoryStore::seeded(date("2024-06-10"));
        let updated = store
            .update_booking_status("b-1003", BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Confirmed);

        let all = store.all_bookings().await.unwrap();
        let stored = all.iter().find(|b| b.id == "b-1003").unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn update_status_on_missing_booking_errors() {
        let store = InMemoryStore::empty();
        let err = store
            .update_booking_status("nope", BookingStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn status_parse_rejects_unknown() {
        assert!(BookingStatus::parse("checked_in").is_ok());
        assert!(BookingStatus::parse("teleported").is_err());
    }
}
