diesel::table! {
    inputs (id) {
        id -> Uuid,
        name -> Varchar,
        price -> Numeric,
        quantity -> Int4,
        input_type -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_inputs (id) {
        id -> Uuid,
        order_id -> Uuid,
        input_id -> Uuid,
        quantity -> Int4,
        unit_price -> Numeric,
        total_price -> Numeric,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_status_history (id) {
        id -> Uuid,
        order_id -> Uuid,
        status -> Varchar,
        started_at -> Timestamptz,
        ended_at -> Nullable<Timestamptz>,
        duration_minutes -> Nullable<Int8>,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        customer_id -> Uuid,
        vehicle_id -> Uuid,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(order_inputs -> inputs (input_id));
diesel::joinable!(order_inputs -> orders (order_id));
diesel::joinable!(order_status_history -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    inputs,
    order_inputs,
    order_status_history,
    orders,
);
