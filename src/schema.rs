diesel::table! {
    tasks (id) {
        id -> Int4,
        // `type` is a Rust keyword; exposed as `kind` in queries.
        #[sql_name = "type"]
        kind -> Int4,
        value -> Int4,
        state -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
