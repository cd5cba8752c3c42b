//! Conversions between domain values and Diesel rows.

use super::models::{
    AppointmentRow, NewAppointmentRow, NewNotificationRow, NewProposalRow, NewRequestRow,
    NotificationRow, ProposalRow, RequestChangeset, RequestRow,
};
use crate::marketplace::{
    domain::{
        Appointment, AppointmentId, AppointmentStatus, DeliveryState, NewNotification,
        NewProposal, NewServiceRequest, Notification, NotificationChannel, NotificationId,
        PersistedAppointmentData, PersistedNotificationData, PersistedProposalData,
        PersistedRequestData, Proposal, ProposalId, ProposalStatus, ProposedPrice, RequestId,
        RequestStatus, ServiceRequest, Urgency, UserId,
    },
    ports::{MarketplaceRepositoryError, MarketplaceRepositoryResult},
};
use serde_json::{Map, Value};

pub(super) fn to_new_request_row(request: &NewServiceRequest) -> NewRequestRow {
    NewRequestRow {
        client_id: request.client_id().value(),
        provider_id: request.provider_id().map(UserId::value),
        category: request.category().to_owned(),
        description: request.description().to_owned(),
        location: request.location().map(str::to_owned),
        budget: request.budget().map(str::to_owned),
        urgency: request.urgency().as_str().to_owned(),
        status: RequestStatus::Pending.as_str().to_owned(),
        scheduled_at: request.scheduled_at(),
        created_at: request.created_at(),
        updated_at: request.created_at(),
    }
}

pub(super) fn to_request_changeset(request: &ServiceRequest) -> RequestChangeset {
    RequestChangeset {
        provider_id: request.provider_id().map(UserId::value),
        status: request.status().as_str().to_owned(),
        scheduled_at: request.scheduled_at(),
        updated_at: request.updated_at(),
    }
}

pub(super) fn row_to_request(row: RequestRow) -> MarketplaceRepositoryResult<ServiceRequest> {
    let urgency =
        Urgency::try_from(row.urgency.as_str()).map_err(MarketplaceRepositoryError::persistence)?;
    let status = RequestStatus::try_from(row.status.as_str())
        .map_err(MarketplaceRepositoryError::persistence)?;

    Ok(ServiceRequest::from_persisted(PersistedRequestData {
        id: RequestId::new(row.id),
        client_id: UserId::new(row.client_id),
        provider_id: row.provider_id.map(UserId::new),
        category: row.category,
        description: row.description,
        location: row.location,
        budget: row.budget,
        urgency,
        status,
        scheduled_at: row.scheduled_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn to_new_proposal_row(proposal: &NewProposal) -> NewProposalRow {
    NewProposalRow {
        request_id: proposal.request_id().value(),
        provider_id: proposal.provider_id().value(),
        proposed_price: proposal.price().amount().clone(),
        message: proposal.message().map(str::to_owned),
        status: ProposalStatus::Pending.as_str().to_owned(),
        created_at: proposal.created_at(),
        updated_at: proposal.created_at(),
    }
}

pub(super) fn row_to_proposal(row: ProposalRow) -> MarketplaceRepositoryResult<Proposal> {
    let price =
        ProposedPrice::new(row.proposed_price).map_err(MarketplaceRepositoryError::persistence)?;
    let status = ProposalStatus::try_from(row.status.as_str())
        .map_err(MarketplaceRepositoryError::persistence)?;

    Ok(Proposal::from_persisted(PersistedProposalData {
        id: ProposalId::new(row.id),
        request_id: RequestId::new(row.request_id),
        provider_id: UserId::new(row.provider_id),
        price,
        message: row.message,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn to_new_appointment_row(appointment: &Appointment) -> NewAppointmentRow {
    NewAppointmentRow {
        request_id: appointment.request_id().value(),
        provider_id: appointment.provider_id().value(),
        client_id: appointment.client_id().value(),
        scheduled_for: appointment.scheduled_for(),
        status: appointment.status().as_str().to_owned(),
        created_at: appointment.created_at(),
        updated_at: appointment.updated_at(),
    }
}

pub(super) fn row_to_appointment(row: AppointmentRow) -> MarketplaceRepositoryResult<Appointment> {
    let status = AppointmentStatus::try_from(row.status.as_str())
        .map_err(MarketplaceRepositoryError::persistence)?;

    Ok(Appointment::from_persisted(PersistedAppointmentData {
        id: AppointmentId::new(row.id),
        request_id: RequestId::new(row.request_id),
        provider_id: UserId::new(row.provider_id),
        client_id: UserId::new(row.client_id),
        scheduled_for: row.scheduled_for,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub(super) fn to_new_notification_row(notification: &NewNotification) -> NewNotificationRow {
    NewNotificationRow {
        recipient_id: notification.recipient().value(),
        channels: notification
            .channels()
            .iter()
            .map(|channel| channel.as_str().to_owned())
            .collect(),
        title: notification.title().to_owned(),
        body: notification.body().to_owned(),
        metadata: Value::Object(notification.metadata().clone()),
        delivery_state: DeliveryState::Pending.as_str().to_owned(),
        attempts: 0,
        delivery_key: notification.delivery_key(),
        created_at: notification.created_at(),
    }
}

pub(super) fn row_to_notification(
    row: NotificationRow,
) -> MarketplaceRepositoryResult<Notification> {
    let channels = row
        .channels
        .iter()
        .map(|channel| NotificationChannel::try_from(channel.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(MarketplaceRepositoryError::persistence)?;
    let delivery_state = DeliveryState::try_from(row.delivery_state.as_str())
        .map_err(MarketplaceRepositoryError::persistence)?;
    let attempts = u32::try_from(row.attempts).map_err(MarketplaceRepositoryError::persistence)?;
    let metadata = match row.metadata {
        Value::Object(entries) => entries,
        Value::Null => Map::new(),
        other => {
            return Err(MarketplaceRepositoryError::persistence(std::io::Error::other(
                format!("notification metadata must be a JSON object, got {other}"),
            )));
        }
    };

    Ok(Notification::from_persisted(PersistedNotificationData {
        id: NotificationId::new(row.id),
        recipient: UserId::new(row.recipient_id),
        channels,
        title: row.title,
        body: row.body,
        metadata,
        read_at: row.read_at,
        delivery_state,
        attempts,
        last_error: row.last_error,
        delivery_key: row.delivery_key,
        created_at: row.created_at,
    }))
}
