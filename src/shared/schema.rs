diesel::table! {
    clients (id) {
        id -> Int4,
        full_name -> Varchar,
        phone -> Varchar,
        email -> Varchar,
        password_hash -> Text,
        tariff -> Nullable<Varchar>,
        services -> Nullable<Jsonb>,
        balance -> Numeric,
        debt -> Numeric,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Int4,
        client_id -> Nullable<Int4>,
        client_phone -> Varchar,
        subject -> Nullable<Varchar>,
        body -> Text,
        channel -> Varchar,
        category -> Nullable<Varchar>,
        priority -> Varchar,
        status -> Varchar,
        ai_response -> Nullable<Text>,
        assigned_to -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    payments (id) {
        id -> Int4,
        client_id -> Int4,
        amount -> Numeric,
        service -> Nullable<Varchar>,
        status -> Varchar,
        paid_at -> Timestamptz,
    }
}

diesel::table! {
    comments (id) {
        id -> Int4,
        ticket_id -> Int4,
        author -> Varchar,
        body -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    templates (id) {
        id -> Int4,
        name -> Varchar,
        category -> Varchar,
        body -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    ai_logs (id) {
        id -> Int4,
        ticket_id -> Int4,
        action -> Varchar,
        request_payload -> Nullable<Jsonb>,
        response_payload -> Nullable<Jsonb>,
        confidence -> Nullable<Numeric>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(tickets -> clients (client_id));
diesel::joinable!(payments -> clients (client_id));
diesel::joinable!(comments -> tickets (ticket_id));
diesel::joinable!(ai_logs -> tickets (ticket_id));

diesel::allow_tables_to_appear_in_same_query!(
    clients, tickets, payments, comments, templates, ai_logs,
);
