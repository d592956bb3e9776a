table! {
    categories (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        slug -> Varchar,
        is_published -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    comments (id) {
        id -> Int4,
        text -> Text,
        author -> Varchar,
        post -> Int4,
        created_at -> Timestamp,
    }
}

table! {
    groups (id) {
        id -> Varchar,
        permissions -> Array<crate::user::PermissionMapping>,
    }
}

table! {
    locations (id) {
        id -> Int4,
        name -> Varchar,
        is_published -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    posts (id) {
        id -> Int4,
        title -> Varchar,
        text -> Text,
        pub_date -> Timestamp,
        image -> Nullable<Varchar>,
        author -> Varchar,
        location -> Nullable<Int4>,
        category -> Nullable<Int4>,
        is_published -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    sessions (id) {
        id -> Varchar,
        user -> Varchar,
        expires -> Timestamp,
    }
}

table! {
    users (id) {
        id -> Varchar,
        hash -> Varchar,
        salt -> Bytea,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        group -> Varchar,
    }
}

joinable!(comments -> posts (post));
joinable!(comments -> users (author));
joinable!(posts -> categories (category));
joinable!(posts -> locations (location));
joinable!(posts -> users (author));
joinable!(sessions -> users (user));
joinable!(users -> groups (group));

allow_tables_to_appear_in_same_query!(
    categories, comments, groups, locations, posts, sessions, users,
);
