//! Domain model for the service marketplace.
//!
//! Requests, proposals, appointments, and outbox notifications live here
//! together with the request state machine and the authorization rules. The
//! domain performs no I/O; repositories load a [`RequestWorkspace`] and
//! persist whatever it records.

pub mod access;
mod actor;
mod appointment;
mod error;
mod ids;
mod notification;
mod proposal;
mod request;
mod workspace;

pub use access::{AccessDecision, ProposalVisibility};
pub use actor::{Actor, Role};
pub use appointment::{Appointment, AppointmentStatus, PersistedAppointmentData};
pub use error::{MarketplaceDomainError, ParseValueError};
pub use ids::{AppointmentId, NotificationId, ProposalId, RequestId, UserId};
pub use notification::{
    DEFAULT_CHANNELS, DeliveryState, NewNotification, Notification, NotificationChannel,
    NotificationKind, PersistedNotificationData,
};
pub use proposal::{
    NewProposal, PersistedProposalData, Proposal, ProposalAction, ProposalStatus, ProposedPrice,
};
pub use request::{
    NewServiceRequest, PersistedRequestData, RequestStatus, ServiceRequest, Urgency,
};
pub use workspace::{RequestWorkspace, WorkspaceChanges};
