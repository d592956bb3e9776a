//! Handler for serving an rss feed
use chrono::{DateTime, NaiveDateTime, Utc};
use gotham::{
    helpers::http::response::create_response,
    state::{FromState, State},
};
use hyper::{Body, Response, StatusCode};
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};

use crate::{
    config::Settings,
    db::DbConnection,
    post::{self, PostListing, Scope, Visibility},
};

/// Builds the feed item of a post, linking to it below `site_url`.
fn item(listing: PostListing, site_url: &str) -> Result<Item, failure::Error> {
    let post = listing.post;
    let link = format!("{}/posts/{}", site_url.trim_end_matches('/'), post.id);
    let guid = GuidBuilder::default()
        .value(link.clone())
        .permalink(true)
        .build()
        .map_err(failure::err_msg)?;
    let category = match listing.category {
        Some(category) => vec![rss::CategoryBuilder::default()
            .name(category.title)
            .build()
            .map_err(failure::err_msg)?],
        None => Vec::new(),
    };

    ItemBuilder::default()
        .title(post.title.clone())
        .link(link)
        .guid(guid)
        .author(post.author.clone())
        .categories(category)
        .pub_date(date_format(post.pub_date))
        .description(post.preview().to_owned())
        .content(post.formatted_text())
        .build()
        .map_err(failure::err_msg)
}

/// Encodes a date in [RFC822](https://www.w3.org/Protocols/rfc822/#z28) format.
fn date_format(date: NaiveDateTime) -> String {
    DateTime::<Utc>::from_utc(date, Utc)
        .format("%a, %d %b %Y %H:%M:%S %z")
        .to_string()
}

/// Serves an RSS encoded feed of the newest public posts
pub fn rss(state: &State) -> Result<Response<Body>, failure::Error> {
    let connection = &DbConnection::from_state(state)?;
    let settings = Settings::borrow_from(state);

    let listings = post::list(
        connection,
        Scope::everything(),
        Visibility::Public,
        Utc::now().naive_utc(),
        1,
        settings.posts_per_page,
    )?
    .map(|page| page.items)
    .unwrap_or_default();
    let last_change = listings
        .first()
        .map(|listing| date_format(listing.post.pub_date));
    let items = listings
        .into_iter()
        .map(|listing| item(listing, &settings.site_url))
        .collect::<Result<Vec<Item>, _>>()?;

    let mut buf = Vec::new();
    let channel = ChannelBuilder::default()
        .title(env!("CARGO_PKG_NAME"))
        .link(settings.site_url.clone())
        .description(env!("CARGO_PKG_DESCRIPTION"))
        .last_build_date(last_change.clone())
        .pub_date(last_change)
        .items(items)
        .build()
        .map_err(failure::err_msg)?;
    channel.pretty_write_to(&mut buf, b' ', 4)?;

    let media_type: mime::Mime = "application/rss+xml".parse()?;
    Ok(create_response(state, StatusCode::OK, media_type, buf))
}
