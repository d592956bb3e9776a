//! JSON API for reading and moderating posts.
use chrono::Utc;
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};
use hyper::{Body, Response};

use crate::{
    category,
    config::Settings,
    db::DbConnection,
    document::post::{visible_post, PostPath},
    error::BlogError,
    guard,
    handler::json,
    location, page,
    post::{self, Moderation, Scope, Visibility},
    user::{Permission, Session},
};

/// Lists public posts, a page at a time.
pub fn list(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let per_page = Settings::borrow_from(state).posts_per_page;

    let page = post::list(
        connection,
        Scope::everything(),
        Visibility::Public,
        Utc::now().naive_utc(),
        page::requested(state),
        per_page,
    )?
    .ok_or(BlogError::NotFound)?;
    json(state, &page)
}

/// Query string of a post search. Every filter is optional.
#[derive(Debug, Deserialize, StateData, StaticResponseExtender)]
pub struct SearchQuery {
    /// Part of the title
    pub q: Option<String>,
    pub author: Option<String>,
    pub category: Option<i32>,
    pub location: Option<i32>,
    pub page: Option<i64>,
}

impl SearchQuery {
    fn scope(&self) -> Scope<'_> {
        Scope {
            author: self.author.as_deref(),
            category: self.category,
            location: self.location,
            title: self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()),
        }
    }
}

/// Searches all posts, hidden ones included, for moderators.
pub fn search(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ModeratePosts,
        connection,
    )?;
    let query = SearchQuery::borrow_from(state);
    let per_page = Settings::borrow_from(state).posts_per_page;

    let page = post::list(
        connection,
        query.scope(),
        Visibility::All,
        Utc::now().naive_utc(),
        query.page.unwrap_or(1),
        per_page,
    )?
    .ok_or(BlogError::NotFound)?;
    json(state, &page)
}

/// A single post, if the requesting user may see it.
pub fn view(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let id = PostPath::borrow_from(state).post_id;
    let session = Session::try_borrow_from(state);

    let post = visible_post(connection, id, session)?;
    let listing = post::listings(connection, vec![post])?
        .pop()
        .ok_or(BlogError::NotFound)?;
    json(state, &listing)
}

/// Publishes, hides or refiles any user's post.
pub fn moderate(state: &State, body: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ModeratePosts,
        connection,
    )?;
    let id = PostPath::borrow_from(state).post_id;
    let moderation: Moderation = serde_json::from_slice(&body)?;

    if let Some(Some(id)) = moderation.category {
        category::get(connection, id)?
            .ok_or_else(|| BlogError::BadRequest(format!("no category with id {}", id)))?;
    }
    if let Some(Some(id)) = moderation.location {
        location::get(connection, id)?
            .ok_or_else(|| BlogError::BadRequest(format!("no location with id {}", id)))?;
    }

    if post::moderate(connection, id, &moderation)? == 0 {
        return Err(BlogError::NotFound.into());
    }
    log::info!(
        "Moderator '{}' set post {} to published={}",
        session.user,
        id,
        moderation.is_published
    );
    json(state, &post::get(connection, id)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filters() {
        let query: SearchQuery =
            serde_urlencoded::from_str("q=+train+&author=anna&location=2").unwrap();
        let scope = query.scope();
        assert_eq!(scope.title, Some("train"));
        assert_eq!(scope.author, Some("anna"));
        assert_eq!(scope.location, Some(2));
        assert_eq!(scope.category, None);

        let query: SearchQuery = serde_urlencoded::from_str("q=").unwrap();
        assert_eq!(query.scope().title, None);
        assert_eq!(query.page, None);
    }
}
