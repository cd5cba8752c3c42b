//! `PostgreSQL` repository implementation for requests and proposals.

use super::{
    conversions::{
        row_to_appointment, row_to_proposal, row_to_request, to_new_appointment_row,
        to_new_notification_row, to_new_proposal_row, to_new_request_row, to_request_changeset,
    },
    models::{AppointmentRow, NewNotificationRow, ProposalRow, RequestRow},
    schema::{appointments, notifications, proposals, service_requests},
};
use crate::marketplace::{
    domain::{
        Appointment, NewProposal, NewServiceRequest, Proposal, ProposalId, RequestId,
        RequestWorkspace, ServiceRequest, WorkspaceChanges,
    },
    ports::{MarketplaceRepository, MarketplaceRepositoryError, MarketplaceRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;

/// `PostgreSQL` connection pool type used by marketplace adapters.
pub type MarketplacePgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed marketplace store.
#[derive(Debug, Clone)]
pub struct PostgresMarketplace {
    pool: MarketplacePgPool,
}

impl PostgresMarketplace {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: MarketplacePgPool) -> Self {
        Self { pool }
    }

    pub(super) async fn run_blocking<F, T>(&self, f: F) -> MarketplaceRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> MarketplaceRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(MarketplaceRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(MarketplaceRepositoryError::persistence)?
    }
}

/// Error carried out of a Diesel transaction closure.
enum TxError<E> {
    Work(E),
    Diesel(DieselError),
}

impl<E> From<DieselError> for TxError<E> {
    fn from(err: DieselError) -> Self {
        Self::Diesel(err)
    }
}

impl<E> TxError<E>
where
    E: From<MarketplaceRepositoryError>,
{
    fn repository(err: MarketplaceRepositoryError) -> Self {
        Self::Work(E::from(err))
    }

    fn into_inner(self) -> E {
        match self {
            Self::Work(err) => err,
            Self::Diesel(err) => E::from(MarketplaceRepositoryError::persistence(err)),
        }
    }
}

#[async_trait]
impl MarketplaceRepository for PostgresMarketplace {
    async fn insert_request(
        &self,
        request: NewServiceRequest,
    ) -> MarketplaceRepositoryResult<ServiceRequest> {
        let new_row = to_new_request_row(&request);
        self.run_blocking(move |connection| {
            let row = diesel::insert_into(service_requests::table)
                .values(&new_row)
                .returning(RequestRow::as_returning())
                .get_result::<RequestRow>(connection)
                .map_err(MarketplaceRepositoryError::persistence)?;
            row_to_request(row)
        })
        .await
    }

    async fn find_request(
        &self,
        id: RequestId,
    ) -> MarketplaceRepositoryResult<Option<ServiceRequest>> {
        self.run_blocking(move |connection| {
            let row = service_requests::table
                .find(id.value())
                .select(RequestRow::as_select())
                .first::<RequestRow>(connection)
                .optional()
                .map_err(MarketplaceRepositoryError::persistence)?;
            row.map(row_to_request).transpose()
        })
        .await
    }

    async fn delete_request(&self, id: RequestId) -> MarketplaceRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(service_requests::table.find(id.value()))
                .execute(connection)
                .map_err(MarketplaceRepositoryError::persistence)?;
            if deleted == 0 {
                return Err(MarketplaceRepositoryError::RequestNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_proposal(&self, id: ProposalId) -> MarketplaceRepositoryResult<Option<Proposal>> {
        self.run_blocking(move |connection| {
            let row = proposals::table
                .find(id.value())
                .select(ProposalRow::as_select())
                .first::<ProposalRow>(connection)
                .optional()
                .map_err(MarketplaceRepositoryError::persistence)?;
            row.map(row_to_proposal).transpose()
        })
        .await
    }

    async fn list_proposals(
        &self,
        request_id: RequestId,
    ) -> MarketplaceRepositoryResult<Vec<Proposal>> {
        self.run_blocking(move |connection| load_proposals(connection, request_id))
            .await
    }

    async fn find_appointment(
        &self,
        request_id: RequestId,
    ) -> MarketplaceRepositoryResult<Option<Appointment>> {
        self.run_blocking(move |connection| load_appointment(connection, request_id))
            .await
    }

    async fn with_request_locked<T, E, F>(&self, request_id: RequestId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut RequestWorkspace) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<MarketplaceRepositoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut pooled = pool
                .get()
                .map_err(|err| E::from(MarketplaceRepositoryError::persistence(err)))?;
            let connection: &mut PgConnection = &mut pooled;
            connection
                .transaction::<T, TxError<E>, _>(|tx| run_unit_of_work(tx, request_id, work))
                .map_err(TxError::into_inner)
        })
        .await
        .map_err(|err| E::from(MarketplaceRepositoryError::persistence(err)))?
    }
}

fn run_unit_of_work<T, E, F>(
    connection: &mut PgConnection,
    request_id: RequestId,
    work: F,
) -> Result<T, TxError<E>>
where
    F: FnOnce(&mut RequestWorkspace) -> Result<T, E>,
    E: From<MarketplaceRepositoryError>,
{
    // The row lock serializes every workflow touching this request until the
    // surrounding transaction ends.
    let request_row = service_requests::table
        .find(request_id.value())
        .select(RequestRow::as_select())
        .for_update()
        .get_result::<RequestRow>(connection)
        .optional()?
        .ok_or_else(|| {
            TxError::repository(MarketplaceRepositoryError::RequestNotFound(request_id))
        })?;
    let request = row_to_request(request_row).map_err(TxError::repository)?;
    let proposals = load_proposals(connection, request_id).map_err(TxError::repository)?;
    let appointment = load_appointment(connection, request_id).map_err(TxError::repository)?;

    let mut workspace = RequestWorkspace::new(request, proposals, appointment);
    let outcome = work(&mut workspace).map_err(TxError::Work)?;
    persist_changes(connection, workspace.into_changes()).map_err(TxError::repository)?;
    Ok(outcome)
}

fn load_proposals(
    connection: &mut PgConnection,
    request_id: RequestId,
) -> MarketplaceRepositoryResult<Vec<Proposal>> {
    proposals::table
        .filter(proposals::request_id.eq(request_id.value()))
        .order(proposals::id.asc())
        .select(ProposalRow::as_select())
        .load::<ProposalRow>(connection)
        .map_err(MarketplaceRepositoryError::persistence)?
        .into_iter()
        .map(row_to_proposal)
        .collect()
}

fn load_appointment(
    connection: &mut PgConnection,
    request_id: RequestId,
) -> MarketplaceRepositoryResult<Option<Appointment>> {
    let row = appointments::table
        .filter(appointments::request_id.eq(request_id.value()))
        .select(AppointmentRow::as_select())
        .first::<AppointmentRow>(connection)
        .optional()
        .map_err(MarketplaceRepositoryError::persistence)?;
    row.map(row_to_appointment).transpose()
}

fn persist_changes(
    connection: &mut PgConnection,
    changes: WorkspaceChanges,
) -> MarketplaceRepositoryResult<()> {
    let WorkspaceChanges {
        request,
        proposals: changed_proposals,
        new_proposals,
        withdrawn_proposals,
        appointment,
        notifications: outbox,
    } = changes;

    if let Some(updated) = request {
        diesel::update(service_requests::table.find(updated.id().value()))
            .set(&to_request_changeset(&updated))
            .execute(connection)
            .map_err(MarketplaceRepositoryError::persistence)?;
    }

    for proposal in &changed_proposals {
        diesel::update(proposals::table.find(proposal.id().value()))
            .set((
                proposals::status.eq(proposal.status().as_str()),
                proposals::updated_at.eq(proposal.updated_at()),
            ))
            .execute(connection)
            .map_err(MarketplaceRepositoryError::persistence)?;
    }

    for proposal_id in &withdrawn_proposals {
        diesel::delete(proposals::table.find(proposal_id.value()))
            .execute(connection)
            .map_err(MarketplaceRepositoryError::persistence)?;
    }

    for new_proposal in &new_proposals {
        insert_proposal(connection, new_proposal)?;
    }

    if let Some(upserted) = appointment {
        diesel::insert_into(appointments::table)
            .values(&to_new_appointment_row(&upserted))
            .on_conflict(appointments::request_id)
            .do_update()
            .set((
                appointments::provider_id.eq(excluded(appointments::provider_id)),
                appointments::scheduled_for.eq(excluded(appointments::scheduled_for)),
                appointments::status.eq(excluded(appointments::status)),
                appointments::updated_at.eq(excluded(appointments::updated_at)),
            ))
            .execute(connection)
            .map_err(MarketplaceRepositoryError::persistence)?;
    }

    if !outbox.is_empty() {
        let rows: Vec<NewNotificationRow> = outbox.iter().map(to_new_notification_row).collect();
        diesel::insert_into(notifications::table)
            .values(&rows)
            .execute(connection)
            .map_err(MarketplaceRepositoryError::persistence)?;
    }

    Ok(())
}

fn insert_proposal(
    connection: &mut PgConnection,
    proposal: &NewProposal,
) -> MarketplaceRepositoryResult<()> {
    diesel::insert_into(proposals::table)
        .values(&to_new_proposal_row(proposal))
        .execute(connection)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                MarketplaceRepositoryError::DuplicateProposal {
                    request_id: proposal.request_id(),
                    provider_id: proposal.provider_id(),
                }
            }
            _ => MarketplaceRepositoryError::persistence(err),
        })?;
    Ok(())
}
