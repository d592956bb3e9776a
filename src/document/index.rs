//! The front page, category pages, static pages and logging in and out.
use askama::Template;
use chrono::Utc;
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};
use hyper::header;

use super::{DocumentResult, TemplateExt};
use crate::{
    category::{self, Category},
    config::Settings,
    db::DbConnection,
    error::BlogError,
    handler::redirect,
    page::{self, Page},
    post::{self, PostListing, Scope, Visibility},
    user::{self, Login, NewUser, Session, UserProfile},
};

#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct CategoryPath {
    pub category_slug: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct Index<'a> {
    session: Option<&'a Session>,
    page: Page<PostListing>,
}

/// Lists the public posts, newest first.
pub fn handler(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let per_page = Settings::borrow_from(state).posts_per_page;
    let number = page::requested(state);

    let page = post::list(
        connection,
        Scope::everything(),
        Visibility::Public,
        Utc::now().naive_utc(),
        number,
        per_page,
    )?
    .ok_or(BlogError::NotFound)?;

    let template = Index {
        session: Session::try_borrow_from(state),
        page,
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate<'a> {
    session: Option<&'a Session>,
    category: Category,
    page: Page<PostListing>,
}

/// Lists the public posts of a published category.
pub fn category(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let slug = &CategoryPath::borrow_from(state).category_slug;
    let per_page = Settings::borrow_from(state).posts_per_page;
    let number = page::requested(state);

    let category = category::published_by_slug(connection, slug)?;
    let page = post::list(
        connection,
        Scope::category(category.id),
        Visibility::Public,
        Utc::now().naive_utc(),
        number,
        per_page,
    )?
    .ok_or(BlogError::NotFound)?;

    let template = CategoryTemplate {
        session: Session::try_borrow_from(state),
        category,
        page,
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate<'a> {
    session: Option<&'a Session>,
}

pub fn about(state: &State) -> DocumentResult {
    let template = AboutTemplate {
        session: Session::try_borrow_from(state),
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "rules.html")]
pub struct RulesTemplate<'a> {
    session: Option<&'a Session>,
}

pub fn rules(state: &State) -> DocumentResult {
    let template = RulesTemplate {
        session: Session::try_borrow_from(state),
    };
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate<'a> {
    session: Option<&'a Session>,
    user: String,
    error: String,
}

pub fn login(state: &State) -> DocumentResult {
    Ok(LoginTemplate {
        session: Session::try_borrow_from(state),
        user: String::new(),
        error: String::new(),
    }
    .to_response(state))
}

pub fn login_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let credentials: Login = serde_urlencoded::from_bytes(&post)?;

    match credentials.login(connection)? {
        Some(session) => {
            let cookie = user::session_cookie(Settings::borrow_from(state), &session.id);
            let mut response = redirect(state, format!("/profile/{}", session.user));
            response
                .headers_mut()
                .append(header::SET_COOKIE, cookie.to_string().parse()?);
            Ok(response)
        }
        None => Ok(LoginTemplate {
            session: None,
            user: credentials.user,
            error: String::from("Wrong username or password"),
        }
        .to_response(state)),
    }
}

pub fn logout(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;

    if let Some(session) = Session::try_borrow_from(state) {
        user::logout(connection, &session.id)?;
        log::info!("User '{}' logged out", session.user);
    }

    // Delete session cookie with Max-Age=0
    let mut response = redirect(state, "/");
    response.headers_mut().append(
        header::SET_COOKIE,
        user::expired_session_cookie().to_string().parse()?,
    );
    Ok(response)
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate<'a> {
    session: Option<&'a Session>,
    form: UserProfile,
    error: String,
}

pub fn signup(state: &State) -> DocumentResult {
    Ok(SignupTemplate {
        session: Session::try_borrow_from(state),
        form: UserProfile::default(),
        error: String::new(),
    }
    .to_response(state))
}

pub fn signup_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let new_user: NewUser = serde_urlencoded::from_bytes(&post)?;
    let connection = &DbConnection::from_state(state)?;

    let problem = match new_user.validate() {
        Err(message) => Some(message),
        Ok(()) if user::exists(connection, &new_user.id)? => {
            Some(String::from("A user with that username already exists"))
        }
        Ok(()) => None,
    };
    if let Some(error) = problem {
        let template = SignupTemplate {
            session: None,
            form: new_user.profile(),
            error,
        };
        return Ok(template.to_response(state));
    }

    user::create(connection, new_user.clone())?;
    let credentials: Login = new_user.into();
    let session = credentials
        .login(connection)?
        .ok_or_else(|| failure::err_msg("Failed to log in the new user"))?;

    let cookie = user::session_cookie(Settings::borrow_from(state), &session.id);
    let mut response = redirect(state, format!("/profile/{}", session.user));
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie.to_string().parse()?);
    Ok(response)
}
