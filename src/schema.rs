// Table definition for the relational backend. The table is created
// idempotently by `PgTaskStore::new`, not by migration files.

diesel::table! {
    tracked_task (id) {
        id -> Uuid,
        owner_name -> Text,
        progress -> Int4,
        error -> Nullable<Text>,
        result -> Nullable<Jsonb>,
        started_at -> Timestamptz,
        ended_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}
