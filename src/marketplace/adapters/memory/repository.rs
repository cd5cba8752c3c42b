//! In-memory marketplace store for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::marketplace::{
    domain::{
        Appointment, AppointmentId, DeliveryState, NewServiceRequest, Notification,
        NotificationId, Proposal, ProposalId, RequestId, RequestWorkspace, ServiceRequest, UserId,
        WorkspaceChanges,
    },
    ports::{
        MarketplaceRepository, MarketplaceRepositoryError, MarketplaceRepositoryResult,
        NotificationOutbox,
    },
};

/// Thread-safe in-memory marketplace store.
///
/// A unit of work holds the write lock from loading the workspace until its
/// changes are applied, so concurrent workflows on any request are fully
/// serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketplace {
    state: Arc<RwLock<InMemoryState>>,
    fail_next_commit: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    requests: BTreeMap<RequestId, ServiceRequest>,
    proposals: BTreeMap<ProposalId, Proposal>,
    appointments: BTreeMap<RequestId, Appointment>,
    notifications: BTreeMap<NotificationId, Notification>,
    last_id: i64,
}

impl InMemoryState {
    const fn next_id(&mut self) -> i64 {
        self.last_id = self.last_id.saturating_add(1);
        self.last_id
    }

    fn apply(&mut self, changes: WorkspaceChanges) {
        let WorkspaceChanges {
            request,
            proposals,
            new_proposals,
            withdrawn_proposals,
            appointment,
            notifications,
        } = changes;

        if let Some(updated) = request {
            self.requests.insert(updated.id(), updated);
        }
        for proposal in proposals {
            self.proposals.insert(proposal.id(), proposal);
        }
        for new_proposal in new_proposals {
            let id = ProposalId::new(self.next_id());
            self.proposals.insert(id, new_proposal.into_persisted(id));
        }
        for id in withdrawn_proposals {
            self.proposals.remove(&id);
        }
        if let Some(upserted) = appointment {
            let stored = match upserted.id() {
                Some(_) => upserted,
                None => upserted.with_id(AppointmentId::new(self.next_id())),
            };
            self.appointments.insert(stored.request_id(), stored);
        }
        for notification in notifications {
            let id = NotificationId::new(self.next_id());
            self.notifications
                .insert(id, notification.into_persisted(id));
        }
    }
}

impl InMemoryMarketplace {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next unit of work fail after its closure succeeded, as a
    /// failed database commit would.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns every stored notification, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceRepositoryError::Persistence`] when the state lock
    /// is poisoned.
    pub fn all_notifications(&self) -> MarketplaceRepositoryResult<Vec<Notification>> {
        Ok(self.read()?.notifications.values().cloned().collect())
    }

    /// Returns every stored appointment for a request.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceRepositoryError::Persistence`] when the state lock
    /// is poisoned.
    pub fn appointments_for(&self, request_id: RequestId) -> MarketplaceRepositoryResult<Vec<Appointment>> {
        Ok(self
            .read()?
            .appointments
            .values()
            .filter(|appointment| appointment.request_id() == request_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> MarketplaceRepositoryResult<RwLockReadGuard<'_, InMemoryState>> {
        self.state
            .read()
            .map_err(|err| MarketplaceRepositoryError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> MarketplaceRepositoryResult<RwLockWriteGuard<'_, InMemoryState>> {
        self.state
            .write()
            .map_err(|err| MarketplaceRepositoryError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl MarketplaceRepository for InMemoryMarketplace {
    async fn insert_request(
        &self,
        request: NewServiceRequest,
    ) -> MarketplaceRepositoryResult<ServiceRequest> {
        let mut state = self.write()?;
        let id = RequestId::new(state.next_id());
        let stored = request.into_persisted(id);
        state.requests.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_request(
        &self,
        id: RequestId,
    ) -> MarketplaceRepositoryResult<Option<ServiceRequest>> {
        Ok(self.read()?.requests.get(&id).cloned())
    }

    async fn delete_request(&self, id: RequestId) -> MarketplaceRepositoryResult<()> {
        let mut state = self.write()?;
        if state.requests.remove(&id).is_none() {
            return Err(MarketplaceRepositoryError::RequestNotFound(id));
        }
        state.proposals.retain(|_, proposal| proposal.request_id() != id);
        state.appointments.remove(&id);
        Ok(())
    }

    async fn find_proposal(&self, id: ProposalId) -> MarketplaceRepositoryResult<Option<Proposal>> {
        Ok(self.read()?.proposals.get(&id).cloned())
    }

    async fn list_proposals(
        &self,
        request_id: RequestId,
    ) -> MarketplaceRepositoryResult<Vec<Proposal>> {
        Ok(self
            .read()?
            .proposals
            .values()
            .filter(|proposal| proposal.request_id() == request_id)
            .cloned()
            .collect())
    }

    async fn find_appointment(
        &self,
        request_id: RequestId,
    ) -> MarketplaceRepositoryResult<Option<Appointment>> {
        Ok(self.read()?.appointments.get(&request_id).cloned())
    }

    async fn with_request_locked<T, E, F>(&self, request_id: RequestId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut RequestWorkspace) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<MarketplaceRepositoryError> + Send + 'static,
    {
        let mut state = self.write()?;
        let request = state
            .requests
            .get(&request_id)
            .cloned()
            .ok_or(MarketplaceRepositoryError::RequestNotFound(request_id))?;
        let proposals = state
            .proposals
            .values()
            .filter(|proposal| proposal.request_id() == request_id)
            .cloned()
            .collect();
        let appointment = state.appointments.get(&request_id).cloned();

        let mut workspace = RequestWorkspace::new(request, proposals, appointment);
        let outcome = work(&mut workspace)?;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(MarketplaceRepositoryError::persistence(std::io::Error::other(
                "simulated commit failure",
            ))
            .into());
        }
        state.apply(workspace.into_changes());
        Ok(outcome)
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryMarketplace {
    async fn list_notifications(
        &self,
        recipient: UserId,
        unread_only: bool,
    ) -> MarketplaceRepositoryResult<Vec<Notification>> {
        Ok(self
            .read()?
            .notifications
            .values()
            .rev()
            .filter(|notification| notification.recipient() == recipient)
            .filter(|notification| !unread_only || !notification.is_read())
            .cloned()
            .collect())
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        recipient: UserId,
        read_at: DateTime<Utc>,
    ) -> MarketplaceRepositoryResult<Notification> {
        let mut state = self.write()?;
        let notification = state
            .notifications
            .get_mut(&id)
            .filter(|candidate| candidate.recipient() == recipient)
            .ok_or(MarketplaceRepositoryError::NotificationNotFound(id))?;
        notification.mark_read_at(read_at);
        Ok(notification.clone())
    }

    async fn pending_notifications(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> MarketplaceRepositoryResult<Vec<Notification>> {
        Ok(self
            .read()?
            .notifications
            .values()
            .filter(|notification| notification.delivery_state() == DeliveryState::Pending)
            .filter(|notification| notification.attempts() < max_attempts)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_delivery(&self, notification: &Notification) -> MarketplaceRepositoryResult<()> {
        let mut state = self.write()?;
        let id = notification.id();
        let stored = state
            .notifications
            .get_mut(&id)
            .ok_or(MarketplaceRepositoryError::NotificationNotFound(id))?;
        stored.apply_delivery(notification);
        Ok(())
    }
}
