//! Appointments derived from accepted requests.

use super::{AppointmentId, ParseValueError, RequestId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Date and time agreed.
    Confirmed,
    /// The work took place.
    Completed,
    /// Called off.
    Cancelled,
}

impl AppointmentStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AppointmentStatus {
    type Error = ParseValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseValueError::new("appointment status", value)),
        }
    }
}

/// Scheduling record for a request; at most one exists per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    id: Option<AppointmentId>,
    request_id: RequestId,
    provider_id: UserId,
    client_id: UserId,
    scheduled_for: DateTime<Utc>,
    status: AppointmentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAppointmentData {
    /// Persisted identifier.
    pub id: AppointmentId,
    /// Request the appointment belongs to.
    pub request_id: RequestId,
    /// Provider performing the work.
    pub provider_id: UserId,
    /// Client receiving the work.
    pub client_id: UserId,
    /// Agreed date and time.
    pub scheduled_for: DateTime<Utc>,
    /// Appointment status.
    pub status: AppointmentStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Creates a confirmed appointment that has not been stored yet.
    #[must_use]
    pub fn confirmed(
        request_id: RequestId,
        provider_id: UserId,
        client_id: UserId,
        scheduled_for: DateTime<Utc>,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: None,
            request_id,
            provider_id,
            client_id,
            scheduled_for,
            status: AppointmentStatus::Confirmed,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs an appointment from persisted storage.
    #[must_use]
    pub const fn from_persisted(data: PersistedAppointmentData) -> Self {
        Self {
            id: Some(data.id),
            request_id: data.request_id,
            provider_id: data.provider_id,
            client_id: data.client_id,
            scheduled_for: data.scheduled_for,
            status: data.status,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the storage identifier; `None` until the appointment is stored.
    #[must_use]
    pub const fn id(&self) -> Option<AppointmentId> {
        self.id
    }

    /// Returns the owning request.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the provider.
    #[must_use]
    pub const fn provider_id(&self) -> UserId {
        self.provider_id
    }

    /// Returns the client.
    #[must_use]
    pub const fn client_id(&self) -> UserId {
        self.client_id
    }

    /// Returns the agreed date and time.
    #[must_use]
    pub const fn scheduled_for(&self) -> DateTime<Utc> {
        self.scheduled_for
    }

    /// Returns the appointment status.
    #[must_use]
    pub const fn status(&self) -> AppointmentStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Attaches the storage identifier after insertion.
    #[must_use]
    pub const fn with_id(mut self, id: AppointmentId) -> Self {
        self.id = Some(id);
        self
    }

    /// Re-confirms the appointment for a new time and provider.
    pub fn reconfirm(
        &mut self,
        provider_id: UserId,
        scheduled_for: DateTime<Utc>,
        clock: &impl Clock,
    ) {
        self.provider_id = provider_id;
        self.scheduled_for = scheduled_for;
        self.status = AppointmentStatus::Confirmed;
        self.updated_at = clock.utc();
    }

    /// Marks the appointment as completed.
    pub fn complete(&mut self, clock: &impl Clock) {
        self.status = AppointmentStatus::Completed;
        self.updated_at = clock.utc();
    }

    /// Marks the appointment as cancelled.
    pub fn cancel(&mut self, clock: &impl Clock) {
        self.status = AppointmentStatus::Cancelled;
        self.updated_at = clock.utc();
    }
}
