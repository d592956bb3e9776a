//! JSON API for managing categories and locations.
use gotham::{
    helpers::http::response::create_empty_response,
    state::{FromState, State},
};
use gotham_derive::{StateData, StaticResponseExtender};
use hyper::{Body, Response, StatusCode};

use crate::{
    category::{self, CategoryChanges, NewCategory},
    db::{self, DbConnection},
    error::BlogError,
    guard,
    handler::json,
    location::{self, LocationChanges, NewLocation},
    user::{Permission, Session},
};

#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct IdPath {
    pub id: i32,
}

fn found(changed: usize) -> Result<(), BlogError> {
    if changed == 0 {
        Err(BlogError::NotFound)
    } else {
        Ok(())
    }
}

/// All categories, published or not.
pub fn list(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageCategories,
        connection,
    )?;

    json(state, &category::list(connection)?)
}

pub fn create(state: &State, post: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageCategories,
        connection,
    )?;

    let new: NewCategory = serde_json::from_slice(&post)?;
    new.validate().map_err(BlogError::BadRequest)?;

    match category::create(connection, &new) {
        Ok(created) => {
            log::info!("User '{}' created category '{}'", session.user, created.slug);
            json(state, &created)
        }
        Err(ref e) if db::is_unique_violation(e) => Err(BlogError::BadRequest(format!(
            "slug '{}' is already taken",
            new.slug
        ))
        .into()),
        Err(e) => Err(e.into()),
    }
}

pub fn edit(state: &State, post: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageCategories,
        connection,
    )?;
    let id = IdPath::borrow_from(state).id;

    let changes: CategoryChanges = serde_json::from_slice(&post)?;
    changes.validate().map_err(BlogError::BadRequest)?;

    match category::edit(connection, id, &changes) {
        Ok(changed) => found(changed)?,
        Err(ref e) if db::is_unique_violation(e) => {
            return Err(BlogError::BadRequest(format!(
                "slug '{}' is already taken",
                changes.slug
            ))
            .into())
        }
        Err(e) => return Err(e.into()),
    }
    Ok(create_empty_response(state, StatusCode::OK))
}

/// Deletes a category. Its posts stay, without a category.
pub fn delete(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageCategories,
        connection,
    )?;
    let id = IdPath::borrow_from(state).id;

    found(category::delete(connection, id)?)?;
    log::info!("User '{}' deleted category {}", session.user, id);
    Ok(create_empty_response(state, StatusCode::OK))
}

/// All locations, published or not.
pub fn list_locations(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageLocations,
        connection,
    )?;

    json(state, &location::list(connection)?)
}

pub fn create_location(state: &State, post: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageLocations,
        connection,
    )?;

    let new: NewLocation = serde_json::from_slice(&post)?;
    new.validate().map_err(BlogError::BadRequest)?;

    let created = location::create(connection, &new)?;
    log::info!("User '{}' created location '{}'", session.user, created.name);
    json(state, &created)
}

pub fn edit_location(state: &State, post: Vec<u8>) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageLocations,
        connection,
    )?;
    let id = IdPath::borrow_from(state).id;

    let changes: LocationChanges = serde_json::from_slice(&post)?;
    changes.validate().map_err(BlogError::BadRequest)?;

    found(location::edit(connection, id, &changes)?)?;
    Ok(create_empty_response(state, StatusCode::OK))
}

/// Deletes a location. Its posts stay, without a location.
pub fn delete_location(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::require_permission(
        Session::try_borrow_from(state),
        Permission::ManageLocations,
        connection,
    )?;
    let id = IdPath::borrow_from(state).id;

    found(location::delete(connection, id)?)?;
    log::info!("User '{}' deleted location {}", session.user, id);
    Ok(create_empty_response(state, StatusCode::OK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_changed_is_not_found() {
        assert_eq!(found(0), Err(BlogError::NotFound));
        assert_eq!(found(1), Ok(()));
    }
}
