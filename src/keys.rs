//! Cache key builders.
//!
//! Keys are derived from request parameters so that every distinct query
//! gets its own entry, e.g. one entry per message-board page.

/// Key for one page of a paginated resource: `"{resource}:page:{page}"`.
pub fn resource_page(resource: &str, page: u64) -> String {
    format!("{resource}:page:{page}")
}

/// Key for the total row count of a paginated resource.
pub fn resource_count(resource: &str) -> String {
    format!("{resource}:count")
}

/// Key for one page of the home page message board.
pub fn index_messages(page: u64) -> String {
    resource_page("index:messages", page)
}

/// Key for a signed-in user's profile as returned by the auth provider.
pub fn user_info(user_id: &str) -> String {
    format!("user:{user_id}:info")
}
