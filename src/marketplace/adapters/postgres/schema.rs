//! Diesel schema for marketplace persistence.

diesel::table! {
    /// Client service requests.
    service_requests (id) {
        /// Serial request identifier.
        id -> Int8,
        /// Owning client.
        client_id -> Int8,
        /// Assigned provider.
        provider_id -> Nullable<Int8>,
        /// Service category.
        #[max_length = 100]
        category -> Varchar,
        /// Free-text description.
        description -> Text,
        /// Work location.
        #[max_length = 255]
        location -> Nullable<Varchar>,
        /// Free-text budget.
        #[max_length = 100]
        budget -> Nullable<Varchar>,
        /// Urgency level.
        #[max_length = 20]
        urgency -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Scheduled appointment time.
        scheduled_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Provider proposals against requests.
    proposals (id) {
        /// Serial proposal identifier.
        id -> Int8,
        /// Parent request.
        request_id -> Int8,
        /// Submitting provider.
        provider_id -> Int8,
        /// Offered price.
        proposed_price -> Numeric,
        /// Free-text message.
        message -> Nullable<Text>,
        /// Proposal status.
        #[max_length = 20]
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Appointments, at most one per request.
    appointments (id) {
        /// Serial appointment identifier.
        id -> Int8,
        /// Owning request.
        request_id -> Int8,
        /// Provider performing the work.
        provider_id -> Int8,
        /// Client receiving the work.
        client_id -> Int8,
        /// Agreed time.
        scheduled_for -> Timestamptz,
        /// Appointment status.
        #[max_length = 20]
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Notification inbox and delivery outbox.
    notifications (id) {
        /// Serial notification identifier.
        id -> Int8,
        /// Recipient user.
        recipient_id -> Int8,
        /// Requested delivery channels.
        channels -> Array<Text>,
        /// Title.
        #[max_length = 255]
        title -> Varchar,
        /// Body.
        body -> Text,
        /// Metadata object.
        metadata -> Jsonb,
        /// Read timestamp.
        read_at -> Nullable<Timestamptz>,
        /// Outbox delivery state.
        #[max_length = 20]
        delivery_state -> Varchar,
        /// Delivery attempts made.
        attempts -> Int4,
        /// Latest delivery error.
        last_error -> Nullable<Text>,
        /// Idempotency key sent to the notification service.
        delivery_key -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(proposals -> service_requests (request_id));
diesel::joinable!(appointments -> service_requests (request_id));

diesel::allow_tables_to_appear_in_same_query!(
    service_requests,
    proposals,
    appointments,
    notifications,
);
