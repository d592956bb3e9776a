//! A personal blog with categories, locations, comments and author profiles.
//!
//! It has the following address scheme:
//! * `/` - The newest public posts
//! * `/posts` - Post pages
//!     * `/<id>` - A post with its comments
//!     * `/create` - Write a post
//!     * `/<id>/edit` - Edit your post
//!     * `/<id>/delete` - Delete your post
//!     * `/<id>/comment` - Comment on a post
//!     * `/<id>/edit_comment/<comment id>` - Edit your comment
//!     * `/<id>/delete_comment/<comment id>` - Delete your comment
//! * `/category/<slug>` - Public posts of a category
//! * `/profile/<username>` - A user's posts
//! * `/edit/profile` - Edit your profile
//! * `/login`, `/logout`, `/signup` - Account handling
//! * `/pages/about`, `/pages/rules` - Static pages
//! * `/api` - JSON interface
//!     * `/posts` - Post handling
//!         * `/list` - List public posts
//!         * `/view/<id>` - Gets the post with `id`
//!         * `/search` - Find any post by title, author, category or location
//!         * `/moderate/<id>` - Publish, hide or refile a post
//!     * `/categories`, `/locations` - Category and location handling
//!         * `/list` - List all
//!         * `/create` - Create one
//!         * `/edit/<id>` - Edit the one with `id`
//!         * `/delete/<id>` - Delete the one with `id`
//!     * `/users` - User handling
//!         * `/create` - Create a user
//!         * `/login` - Get a session
//! * `/feed.rss` - RSS feed
//! * `/static/*` - Style sheets
//! * `/media/*` - Post images

#![allow(clippy::new_without_default)]

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;
#[macro_use]
extern crate serde;

pub mod category;
pub mod comment;
pub mod config;
pub mod date_format;
pub mod db;
pub mod document;
pub mod error;
pub mod form;
pub mod guard;
pub mod handler;
pub mod location;
pub mod page;
pub mod post;
pub mod schema;
pub mod upload;
pub mod user;

use gotham::{
    middleware::cookie::CookieParser,
    middleware::logger::RequestLogger,
    middleware::state::StateMiddleware,
    pipeline::new_pipeline,
    pipeline::single::single_pipeline,
    router::builder::{build_router, DefineSingleRoute, DrawRoutes},
    router::response::extender::ResponseExtender,
    router::Router,
    state::State,
};
use http::status::StatusCode;
use hyper::{Body, Response};

use std::{borrow::Cow, path::Path};

use crate::{
    config::Settings,
    db::DbConnection,
    document::{comment::CommentPath, index::CategoryPath, post::PostPath, user::UserPath},
    handler::categories::IdPath,
    page::PageQuery,
    user::SessionMiddleware,
};

/// Response extender for 404 errors
pub struct NotFound;

impl ResponseExtender<Body> for NotFound {
    fn extend(&self, state: &mut State, res: &mut Response<Body>) {
        handler::not_found(state, res);
    }
}

/// Builds the request router
fn router(settings: Settings, connection: DbConnection) -> Router {
    // The directory static assets are served from. Is:
    // /usr/share/blogicum if it exists (debian package), otherwise
    // STATIC_DIR compile-time environment variable if defined, otherwise
    // local directory 'static'
    let assets_dir: Cow<str> = if Path::new("/usr/share/blogicum").is_dir() {
        "/usr/share/blogicum".into()
    } else if let Some(compile_env) = option_env!("STATIC_DIR") {
        compile_env.into()
    } else {
        "static".into()
    };
    let media_dir = settings.media_dir.clone();

    // Build pipeline
    let (chain, pipelines) = single_pipeline(
        new_pipeline()
            .add(RequestLogger::new(log::Level::Info))
            .add(StateMiddleware::new(connection))
            .add(StateMiddleware::new(settings))
            .add(CookieParser)
            .add(SessionMiddleware)
            .build(),
    );

    build_router(chain, pipelines, |route| {
        use crate::document::{comment, index, post, user};

        route
            .get("/")
            .with_query_string_extractor::<PageQuery>()
            .to(handler!(index::handler));

        route.scope("/posts", |route| {
            route.get("/create").to(handler!(post::create));
            route.post("/create").to(body_handler!(post::create_post));

            route
                .get("/:post_id")
                .with_path_extractor::<PostPath>()
                .to(handler!(post::view));
            route
                .get("/:post_id/edit")
                .with_path_extractor::<PostPath>()
                .to(handler!(post::edit));
            route
                .post("/:post_id/edit")
                .with_path_extractor::<PostPath>()
                .to(body_handler!(post::edit_post));
            route
                .get("/:post_id/delete")
                .with_path_extractor::<PostPath>()
                .to(handler!(post::delete));
            route
                .post("/:post_id/delete")
                .with_path_extractor::<PostPath>()
                .to(body_handler!(post::delete_post));

            route
                .post("/:post_id/comment")
                .with_path_extractor::<PostPath>()
                .to(body_handler!(comment::add_post));
            route
                .get("/:post_id/edit_comment/:comment_id")
                .with_path_extractor::<CommentPath>()
                .to(handler!(comment::edit));
            route
                .post("/:post_id/edit_comment/:comment_id")
                .with_path_extractor::<CommentPath>()
                .to(body_handler!(comment::edit_post));
            route
                .get("/:post_id/delete_comment/:comment_id")
                .with_path_extractor::<CommentPath>()
                .to(handler!(comment::delete));
            route
                .post("/:post_id/delete_comment/:comment_id")
                .with_path_extractor::<CommentPath>()
                .to(body_handler!(comment::delete_post));
        });

        route
            .get("/category/:category_slug")
            .with_path_extractor::<CategoryPath>()
            .with_query_string_extractor::<PageQuery>()
            .to(handler!(index::category));

        route
            .get("/profile/:username")
            .with_path_extractor::<UserPath>()
            .with_query_string_extractor::<PageQuery>()
            .to(handler!(user::view));
        route.get("/edit/profile").to(handler!(user::edit));
        route
            .post("/edit/profile")
            .to(body_handler!(user::edit_post));

        route.get("/login").to(handler!(index::login));
        route.post("/login").to(body_handler!(index::login_post));

        route.get("/logout").to(handler!(index::logout));

        route.get("/signup").to(handler!(index::signup));
        route.post("/signup").to(body_handler!(index::signup_post));

        route.get("/pages/about").to(handler!(index::about));
        route.get("/pages/rules").to(handler!(index::rules));

        route.scope("/api", |route| {
            route.scope("/posts", |route| {
                use crate::handler::posts;

                route
                    .get("/list")
                    .with_query_string_extractor::<PageQuery>()
                    .to(handler!(posts::list));
                route
                    .get("/view/:post_id")
                    .with_path_extractor::<PostPath>()
                    .to(handler!(posts::view));
                route
                    .get("/search")
                    .with_query_string_extractor::<posts::SearchQuery>()
                    .to(handler!(posts::search));
                route
                    .post("/moderate/:post_id")
                    .with_path_extractor::<PostPath>()
                    .to(body_handler!(posts::moderate));
            });

            route.scope("/categories", |route| {
                use crate::handler::categories;

                route.get("/list").to(handler!(categories::list));
                route.post("/create").to(body_handler!(categories::create));
                route
                    .post("/edit/:id")
                    .with_path_extractor::<IdPath>()
                    .to(body_handler!(categories::edit));
                route
                    .post("/delete/:id")
                    .with_path_extractor::<IdPath>()
                    .to(handler!(categories::delete));
            });

            route.scope("/locations", |route| {
                use crate::handler::categories;

                route.get("/list").to(handler!(categories::list_locations));
                route
                    .post("/create")
                    .to(body_handler!(categories::create_location));
                route
                    .post("/edit/:id")
                    .with_path_extractor::<IdPath>()
                    .to(body_handler!(categories::edit_location));
                route
                    .post("/delete/:id")
                    .with_path_extractor::<IdPath>()
                    .to(handler!(categories::delete_location));
            });

            route.scope("/users", |route| {
                use crate::handler::users;

                route.post("/create").to(body_handler!(users::create));
                route.post("/login").to(body_handler!(users::login));
            });
        });

        route.get("/static/*").to_dir(&*assets_dir);
        route.get("/media/*").to_dir(media_dir);

        route.get("/feed.rss").to(handler!(handler::rss::rss));

        // Error responders
        route.add_response_extender(StatusCode::NOT_FOUND, NotFound);
    })
}

fn main() -> Result<(), failure::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Read settings
    let settings = Settings::load()?;
    let connection = DbConnection::from_url(&settings.database_url)?;
    let address = settings.host_address.clone();

    log::info!("Running at {}", address);
    gotham::start(address, router(settings, connection));
    Ok(())
}
