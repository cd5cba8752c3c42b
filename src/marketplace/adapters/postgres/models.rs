//! Diesel row models for marketplace persistence.

use super::schema::{appointments, notifications, proposals, service_requests};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for service requests.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = service_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RequestRow {
    /// Request identifier.
    pub id: i64,
    /// Owning client.
    pub client_id: i64,
    /// Assigned provider.
    pub provider_id: Option<i64>,
    /// Service category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Work location.
    pub location: Option<String>,
    /// Free-text budget.
    pub budget: Option<String>,
    /// Urgency level.
    pub urgency: String,
    /// Lifecycle status.
    pub status: String,
    /// Scheduled appointment time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for service requests; the id is assigned by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = service_requests)]
pub struct NewRequestRow {
    /// Owning client.
    pub client_id: i64,
    /// Directly booked provider.
    pub provider_id: Option<i64>,
    /// Service category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Work location.
    pub location: Option<String>,
    /// Free-text budget.
    pub budget: Option<String>,
    /// Urgency level.
    pub urgency: String,
    /// Lifecycle status.
    pub status: String,
    /// Scheduled appointment time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Columns a unit of work may change on a request.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = service_requests)]
#[diesel(treat_none_as_null = true)]
pub struct RequestChangeset {
    /// Assigned provider.
    pub provider_id: Option<i64>,
    /// Lifecycle status.
    pub status: String,
    /// Scheduled appointment time.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for proposals.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = proposals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProposalRow {
    /// Proposal identifier.
    pub id: i64,
    /// Parent request.
    pub request_id: i64,
    /// Submitting provider.
    pub provider_id: i64,
    /// Offered price.
    pub proposed_price: BigDecimal,
    /// Free-text message.
    pub message: Option<String>,
    /// Proposal status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for proposals.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = proposals)]
pub struct NewProposalRow {
    /// Parent request.
    pub request_id: i64,
    /// Submitting provider.
    pub provider_id: i64,
    /// Offered price.
    pub proposed_price: BigDecimal,
    /// Free-text message.
    pub message: Option<String>,
    /// Proposal status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for appointments.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AppointmentRow {
    /// Appointment identifier.
    pub id: i64,
    /// Owning request.
    pub request_id: i64,
    /// Provider.
    pub provider_id: i64,
    /// Client.
    pub client_id: i64,
    /// Agreed time.
    pub scheduled_for: DateTime<Utc>,
    /// Appointment status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Upsert model for appointments keyed by request.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = appointments)]
pub struct NewAppointmentRow {
    /// Owning request.
    pub request_id: i64,
    /// Provider.
    pub provider_id: i64,
    /// Client.
    pub client_id: i64,
    /// Agreed time.
    pub scheduled_for: DateTime<Utc>,
    /// Appointment status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for notifications.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRow {
    /// Notification identifier.
    pub id: i64,
    /// Recipient user.
    pub recipient_id: i64,
    /// Delivery channels.
    pub channels: Vec<String>,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Metadata object.
    pub metadata: Value,
    /// Read timestamp.
    pub read_at: Option<DateTime<Utc>>,
    /// Outbox delivery state.
    pub delivery_state: String,
    /// Delivery attempts made.
    pub attempts: i32,
    /// Latest delivery error.
    pub last_error: Option<String>,
    /// Idempotency key.
    pub delivery_key: uuid::Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for outbox notifications.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotificationRow {
    /// Recipient user.
    pub recipient_id: i64,
    /// Delivery channels.
    pub channels: Vec<String>,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Metadata object.
    pub metadata: Value,
    /// Outbox delivery state.
    pub delivery_state: String,
    /// Delivery attempts made.
    pub attempts: i32,
    /// Idempotency key.
    pub delivery_key: uuid::Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Delivery bookkeeping written by the relay.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = notifications)]
#[diesel(treat_none_as_null = true)]
pub struct DeliveryChangeset {
    /// Outbox delivery state.
    pub delivery_state: String,
    /// Delivery attempts made.
    pub attempts: i32,
    /// Latest delivery error.
    pub last_error: Option<String>,
}
