//! Profile pages and profile editing

use askama::Template;
use chrono::Utc;
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};

use super::{DocumentResult, TemplateExt};
use crate::{
    config::Settings,
    db::DbConnection,
    error::BlogError,
    form::{self, FormErrors},
    guard,
    handler::redirect,
    page::{self, Page},
    post::{self, PostListing, Scope, Visibility},
    user::{self, Session, User, UserProfile},
};

#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct UserPath {
    pub username: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate<'a> {
    session: Option<&'a Session>,
    profile: User,
    is_owner: bool,
    page: Page<PostListing>,
}

/// A user's page with their posts. Owners also see their hidden and scheduled posts.
pub fn view(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let session = Session::try_borrow_from(state);
    let username = &UserPath::borrow_from(state).username;
    let per_page = Settings::borrow_from(state).posts_per_page;

    let profile = user::get(connection, username)?;
    let viewer = session.map(|session| session.user.as_str());
    let page = post::list(
        connection,
        Scope::author(&profile.id),
        Visibility::of_profile(&profile.id, viewer),
        Utc::now().naive_utc(),
        page::requested(state),
        per_page,
    )?
    .ok_or(BlogError::NotFound)?;

    let template = ProfileTemplate {
        session,
        is_owner: guard::is_owner(session, &profile.id),
        profile,
        page,
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "user-edit.html")]
struct ProfileEditTemplate<'a> {
    session: Option<&'a Session>,
    form: UserProfile,
    errors: FormErrors,
}

/// Form for editing your profile
pub fn edit(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::login_required(Session::try_borrow_from(state))?;

    let user = session.user(connection)?;
    let template = ProfileEditTemplate {
        session: Some(session),
        form: UserProfile::of(&user),
        errors: FormErrors::new(),
    };
    Ok(template.to_response(state))
}

/// Saves profile changes and shows the profile under its possibly new name.
pub fn edit_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::login_required(Session::try_borrow_from(state))?;
    let submitted: UserProfile = serde_urlencoded::from_bytes(&post)?;

    let checked = match form::validate_profile(&submitted) {
        Ok(ref profile)
            if profile.username != session.user && user::exists(connection, &profile.username)? =>
        {
            let mut errors = FormErrors::new();
            errors.add("username", "A user with that username already exists.");
            Err(errors)
        }
        checked => checked,
    };
    let profile = match checked {
        Ok(profile) => profile,
        Err(errors) => {
            let template = ProfileEditTemplate {
                session: Some(session),
                form: submitted,
                errors,
            };
            return Ok(template.to_response(state));
        }
    };

    user::edit_profile(connection, &session.user, &profile)?;
    if profile.username != session.user {
        log::info!("User '{}' renamed to '{}'", session.user, profile.username);
    }
    Ok(redirect(state, format!("/profile/{}", profile.username)))
}
