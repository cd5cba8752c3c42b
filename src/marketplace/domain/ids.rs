//! Identifier types for the marketplace domain.
//!
//! Identifiers are assigned by the database as 64-bit serial values; the
//! newtypes keep request, proposal, and user identifiers from being mixed up
//! at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a persisted identifier value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying numeric value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// Identifier of a registered user (client, provider, or admin).
    UserId
);

integer_id!(
    /// Identifier of a client service request.
    RequestId
);

integer_id!(
    /// Identifier of a provider proposal.
    ProposalId
);

integer_id!(
    /// Identifier of a scheduled appointment.
    AppointmentId
);

integer_id!(
    /// Identifier of a notification record.
    NotificationId
);
