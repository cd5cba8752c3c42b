//! Notification title and body templates.

use super::error::{WorkflowError, WorkflowResult};
use crate::marketplace::domain::{
    DEFAULT_CHANNELS, NewNotification, NotificationKind, UserId,
};
use minijinja::Environment;
use mockable::Clock;
use serde_json::{Map, Value};

/// Title and body template pair rendered with `minijinja`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    title: String,
    body: String,
}

impl MessageTemplate {
    /// Creates a template pair.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Templates for every notification the marketplace emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplates {
    proposal_received: MessageTemplate,
    proposal_accepted: MessageTemplate,
    proposal_rejected: MessageTemplate,
    request_status_changed: MessageTemplate,
}

impl Default for NotificationTemplates {
    fn default() -> Self {
        Self {
            proposal_received: MessageTemplate::new(
                "New proposal for your {{ category }} request",
                "A provider offered {{ price }} for request #{{ request_id }}.",
            ),
            proposal_accepted: MessageTemplate::new(
                "Your proposal was accepted",
                "The client accepted your proposal of {{ price }} for request #{{ request_id }} ({{ category }}).",
            ),
            proposal_rejected: MessageTemplate::new(
                "Your proposal was declined",
                "The client declined your proposal for request #{{ request_id }} ({{ category }}).",
            ),
            request_status_changed: MessageTemplate::new(
                "Request #{{ request_id }} is now {{ status }}",
                "Your {{ category }} request moved to {{ status }}.",
            ),
        }
    }
}

impl NotificationTemplates {
    /// Replaces the template used for `kind`.
    #[must_use]
    pub fn with_template(mut self, kind: NotificationKind, template: MessageTemplate) -> Self {
        *self.slot_mut(kind) = template;
        self
    }

    /// Renders a notification of `kind` for `recipient`.
    ///
    /// Every context entry is also stored as notification metadata, next to
    /// a `kind` entry naming the event.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Template`] when rendering fails and
    /// [`WorkflowError::Domain`] when the rendered title is empty.
    pub fn compose(
        &self,
        kind: NotificationKind,
        recipient: UserId,
        context: Map<String, Value>,
        clock: &impl Clock,
    ) -> WorkflowResult<NewNotification> {
        let template = self.slot(kind);
        let environment = Environment::new();
        let title = environment
            .render_str(&template.title, &context)
            .map_err(|err| WorkflowError::Template(err.to_string()))?;
        let body = environment
            .render_str(&template.body, &context)
            .map_err(|err| WorkflowError::Template(err.to_string()))?;

        let mut notification = NewNotification::new(recipient, DEFAULT_CHANNELS, title, body, clock)?
            .with_metadata("kind", kind.as_str());
        for (key, value) in context {
            notification = notification.with_metadata(key, value);
        }
        Ok(notification)
    }

    const fn slot(&self, kind: NotificationKind) -> &MessageTemplate {
        match kind {
            NotificationKind::ProposalReceived => &self.proposal_received,
            NotificationKind::ProposalAccepted => &self.proposal_accepted,
            NotificationKind::ProposalRejected => &self.proposal_rejected,
            NotificationKind::RequestStatusChanged => &self.request_status_changed,
        }
    }

    const fn slot_mut(&mut self, kind: NotificationKind) -> &mut MessageTemplate {
        match kind {
            NotificationKind::ProposalReceived => &mut self.proposal_received,
            NotificationKind::ProposalAccepted => &mut self.proposal_accepted,
            NotificationKind::ProposalRejected => &mut self.proposal_rejected,
            NotificationKind::RequestStatusChanged => &mut self.request_status_changed,
        }
    }
}
