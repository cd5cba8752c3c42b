//! Application services for the marketplace.

mod error;
mod inbox;
mod proposals;
mod relay;
mod request_status;
mod requests;
mod resolution;
mod templates;

pub use error::{WorkflowError, WorkflowResult};
pub use inbox::InboxService;
pub use proposals::ProposalService;
pub use relay::{NotificationRelay, RelayReport, RelaySettings};
pub use request_status::{RequestStatusService, SETTABLE_STATUSES, StatusUpdate};
pub use requests::{RequestDraft, RequestService, RequestView};
pub use resolution::{ProposalResolution, ProposalResolutionService};
pub use templates::{MessageTemplate, NotificationTemplates};

use crate::marketplace::ports::MarketplaceStore;
use mockable::Clock;
use std::sync::Arc;

/// Every marketplace service over one store and clock.
pub struct Marketplace<R, C>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    /// Request management.
    pub requests: RequestService<R, C>,
    /// Provider bids.
    pub proposals: ProposalService<R, C>,
    /// Proposal resolution by clients.
    pub resolution: ProposalResolutionService<R, C>,
    /// Request status workflow.
    pub status: RequestStatusService<R, C>,
    /// Notification inbox.
    pub inbox: InboxService<R, C>,
}

impl<R, C> Marketplace<R, C>
where
    R: MarketplaceStore,
    C: Clock + Send + Sync + 'static,
{
    /// Wires every service to `store` and `clock`.
    #[must_use]
    pub fn new(store: Arc<R>, clock: Arc<C>, templates: NotificationTemplates) -> Self {
        let shared_templates = Arc::new(templates);
        Self {
            requests: RequestService::new(Arc::clone(&store), Arc::clone(&clock)),
            proposals: ProposalService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&shared_templates),
            ),
            resolution: ProposalResolutionService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&shared_templates),
            ),
            status: RequestStatusService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                shared_templates,
            ),
            inbox: InboxService::new(store, clock),
        }
    }
}
