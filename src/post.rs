//! Posts and the rules deciding who gets to see them.
//!
//! A post is public when it is published, filed under a published category and its publishing
//! date has passed. Its author sees it regardless.
use chrono::NaiveDateTime;
use diesel::{pg::Pg, prelude::*, result::Error as DieselError};

use std::collections::HashMap;

use crate::{
    category::Category,
    comment,
    db::Connection,
    location::Location,
    page::{Page, Window},
    schema::{categories, locations, posts},
};

const PREVIEW_LEN: usize = 300;

#[derive(Clone, Debug, Serialize, Deserialize, Queryable, Identifiable)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub text: String,
    /// The time the post becomes public. May lie in the future.
    #[serde(with = "crate::date_format")]
    pub pub_date: NaiveDateTime,
    /// Path of the post's image, relative to the media directory
    pub image: Option<String>,
    /// Username of the post's author
    pub author: String,
    pub location: Option<i32>,
    pub category: Option<i32>,
    pub is_published: bool,
    #[serde(with = "crate::date_format")]
    pub created_at: NaiveDateTime,
}

impl Post {
    /// Whether anyone may see the post. `category` must be the post's category.
    pub fn is_public(&self, category: Option<&Category>, now: NaiveDateTime) -> bool {
        let category_published = match (self.category, category) {
            (Some(id), Some(category)) => category.id == id && category.is_published,
            _ => false,
        };
        self.is_published && category_published && self.pub_date < now
    }

    /// Whether `viewer` may see the post.
    pub fn visible_to(
        &self,
        category: Option<&Category>,
        viewer: Option<&str>,
        now: NaiveDateTime,
    ) -> bool {
        viewer == Some(self.author.as_str()) || self.is_public(category, now)
    }

    /// Used when displaying a preview of the post's text in a list of posts.
    pub fn preview(&self) -> &str {
        let len = self.text.len();
        if len < PREVIEW_LEN {
            return &self.text;
        }
        // Get the last whitespace character before PREVIEW_LEN.
        let end = self
            .text
            .match_indices(char::is_whitespace)
            .map(|(i, _)| i)
            .take_while(|i| *i < PREVIEW_LEN)
            .last()
            .unwrap_or(len);
        &self.text[..end]
    }

    /// The publishing date as shown to readers.
    pub fn published_at(&self) -> String {
        self.pub_date.format("%d %B %Y, %H:%M").to_string()
    }

    pub fn formatted_text(&self) -> String {
        crate::config::render_markdown(&self.text)
    }

    pub fn image_url(&self) -> Option<String> {
        self.image.as_ref().map(|image| format!("/media/{}", image))
    }
}

/// A post as shown in listings.
#[derive(Clone, Debug, Serialize)]
pub struct PostListing {
    pub post: Post,
    pub category: Option<Category>,
    pub location: Option<Location>,
    pub comment_count: i64,
}

impl PostListing {
    /// The post's location if readers may see it.
    pub fn shown_location(&self) -> Option<&Location> {
        self.location.as_ref().filter(|location| location.is_published)
    }

    pub fn filed_under(&self) -> Option<&Category> {
        self.category.as_ref()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable)]
#[table_name = "posts"]
pub struct NewPost {
    pub title: String,
    pub text: String,
    #[serde(with = "crate::date_format")]
    pub pub_date: NaiveDateTime,
    pub image: Option<String>,
    pub author: String,
    pub location: Option<i32>,
    pub category: Option<i32>,
    pub is_published: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, AsChangeset)]
#[table_name = "posts"]
#[changeset_options(treat_none_as_null = "true")]
pub struct PostChanges {
    pub title: String,
    pub text: String,
    #[serde(with = "crate::date_format")]
    pub pub_date: NaiveDateTime,
    pub image: Option<String>,
    pub location: Option<i32>,
    pub category: Option<i32>,
    pub is_published: bool,
}

impl NewPost {
    pub fn changes(&self) -> PostChanges {
        PostChanges {
            title: self.title.clone(),
            text: self.text.clone(),
            pub_date: self.pub_date,
            image: self.image.clone(),
            location: self.location,
            category: self.category,
            is_published: self.is_published,
        }
    }
}

/// Changes a moderator can make to any post.
///
/// A category or location left out keeps its current value, `null` clears it.
#[derive(Clone, Debug, Serialize, Deserialize, AsChangeset)]
#[table_name = "posts"]
pub struct Moderation {
    pub is_published: bool,
    #[serde(default, deserialize_with = "crate::form::present")]
    pub category: Option<Option<i32>>,
    #[serde(default, deserialize_with = "crate::form::present")]
    pub location: Option<Option<i32>>,
}

/// Which posts of a listing are shown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Visibility {
    /// Only public posts
    Public,
    /// Everything, for an author looking at their own posts
    All,
}

impl Visibility {
    /// Visibility of the posts on `owner`'s profile page.
    pub fn of_profile(owner: &str, viewer: Option<&str>) -> Self {
        if viewer == Some(owner) {
            Visibility::All
        } else {
            Visibility::Public
        }
    }
}

/// Restricts a listing to a subset of all posts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Scope<'a> {
    pub author: Option<&'a str>,
    pub category: Option<i32>,
    pub location: Option<i32>,
    /// Part of the title, matched ignoring case
    pub title: Option<&'a str>,
}

impl<'a> Scope<'a> {
    pub fn everything() -> Self {
        Scope::default()
    }

    pub fn author(author: &'a str) -> Self {
        Scope {
            author: Some(author),
            ..Scope::default()
        }
    }

    pub fn category(category: i32) -> Self {
        Scope {
            category: Some(category),
            ..Scope::default()
        }
    }
}

/// A `LIKE` pattern matching titles that contain `part`.
fn containing(part: &str) -> String {
    let escaped = part
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Gets one page of the posts in `scope`, newest first, each with its comment count.
///
/// Returns `None` if the page doesn't exist.
pub fn list(
    connection: &Connection,
    scope: Scope,
    visibility: Visibility,
    now: NaiveDateTime,
    number: i64,
    per_page: i64,
) -> Result<Option<Page<PostListing>>, DieselError> {
    let query = || {
        let mut query = posts::table
            .left_join(categories::table)
            .select(posts::all_columns)
            .into_boxed::<Pg>();
        if let Some(author) = scope.author {
            query = query.filter(posts::author.eq(author));
        }
        if let Some(category) = scope.category {
            query = query.filter(posts::category.eq(category));
        }
        if let Some(location) = scope.location {
            query = query.filter(posts::location.eq(location));
        }
        if let Some(title) = scope.title {
            query = query.filter(posts::title.ilike(containing(title)));
        }
        if visibility == Visibility::Public {
            query = query
                .filter(posts::is_published.eq(true))
                .filter(categories::is_published.eq(true))
                .filter(posts::pub_date.lt(now));
        }
        query
    };

    let total: i64 = query().count().get_result(connection)?;
    let window = match Window::new(number, per_page, total) {
        Some(window) => window,
        None => return Ok(None),
    };
    let posts: Vec<Post> = query()
        .order((posts::pub_date.desc(), posts::id.desc()))
        .limit(window.limit)
        .offset(window.offset)
        .load(connection)?;

    let listings = listings(connection, posts)?;
    Ok(Some(window.page(listings, total)))
}

/// Attaches categories, locations and comment counts to posts.
pub fn listings(connection: &Connection, posts: Vec<Post>) -> Result<Vec<PostListing>, DieselError> {
    let ids: Vec<i32> = posts.iter().map(|post| post.id).collect();
    let category_ids: Vec<i32> = posts.iter().filter_map(|post| post.category).collect();
    let location_ids: Vec<i32> = posts.iter().filter_map(|post| post.location).collect();

    let categories: HashMap<i32, Category> = categories::table
        .filter(categories::id.eq_any(category_ids))
        .load::<Category>(connection)?
        .into_iter()
        .map(|category| (category.id, category))
        .collect();
    let locations: HashMap<i32, Location> = locations::table
        .filter(locations::id.eq_any(location_ids))
        .load::<Location>(connection)?
        .into_iter()
        .map(|location| (location.id, location))
        .collect();
    let counts = comment::count_by_post(connection, &ids)?;

    Ok(posts
        .into_iter()
        .map(|post| PostListing {
            category: post.category.and_then(|id| categories.get(&id).cloned()),
            location: post.location.and_then(|id| locations.get(&id).cloned()),
            comment_count: counts.get(&post.id).copied().unwrap_or(0),
            post,
        })
        .collect())
}

pub fn get(connection: &Connection, id: i32) -> Result<Post, DieselError> {
    use crate::schema::posts::dsl;

    dsl::posts.find(id).first(connection)
}

pub fn submit(connection: &Connection, post: &NewPost) -> Result<Post, DieselError> {
    diesel::insert_into(posts::table)
        .values(post)
        .get_result(connection)
}

pub fn edit(connection: &Connection, id: i32, changes: &PostChanges) -> Result<usize, DieselError> {
    use crate::schema::posts::dsl;

    diesel::update(dsl::posts.find(id))
        .set(changes)
        .execute(connection)
}

pub fn moderate(
    connection: &Connection,
    id: i32,
    moderation: &Moderation,
) -> Result<usize, DieselError> {
    use crate::schema::posts::dsl;

    diesel::update(dsl::posts.find(id))
        .set(moderation)
        .execute(connection)
}

/// Deletes a post along with its comments.
pub fn delete(connection: &Connection, id: i32) -> Result<usize, DieselError> {
    use crate::schema::posts::dsl;

    diesel::delete(dsl::posts.find(id)).execute(connection)
}
