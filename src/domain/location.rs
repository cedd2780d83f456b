use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_RETENTION_HOURS: i64 = 7 * 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub status: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLocationUpdate {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub status: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LocationInput {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub status: Option<String>,
}

impl LocationInput {
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LocationScope {
    Order(Uuid),
    Transporter(Uuid),
}

/// Oldest `recorded_at` still inside the retention window.
pub fn retention_cutoff(now: DateTime<Utc>, retention_hours: i64) -> DateTime<Utc> {
    now - Duration::hours(retention_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_seven_days() {
        let now = Utc::now();
        assert_eq!(
            now - retention_cutoff(now, DEFAULT_RETENTION_HOURS),
            Duration::days(7)
        );
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut input = LocationInput {
            latitude: 12.97,
            longitude: 77.59,
            accuracy: None,
            heading: None,
            speed: None,
            status: None,
        };
        assert!(input.has_valid_coordinates());
        input.latitude = 91.0;
        assert!(!input.has_valid_coordinates());
    }
}
