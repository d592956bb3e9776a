//! HTML form input and its validation.
//!
//! Forms are decoded leniently into strings, then validated into the model types. Problems are
//! collected per field so the form can be shown again with the user's input and the errors.
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::{
    date_format,
    post::{NewPost, Post},
    user::{self, UserProfile},
};

const MAX_TITLE_LEN: usize = 256;
const MAX_COMMENT_LEN: usize = 256;

/// Validation errors of a form, by field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for `field`. The first error recorded for a field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    /// The error message for `field`, empty if there is none.
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Turns the errors into a result holding `value` if there are none.
    pub fn result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Default for fields that are on unless turned off.
pub fn yes() -> bool {
    true
}

/// Decodes an HTML checkbox. Browsers leave unchecked boxes out of the form entirely.
pub fn checkbox<'d, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'d>,
{
    let value = String::deserialize(deserializer)?;
    Ok(!matches!(value.as_str(), "" | "0" | "false" | "off"))
}

/// Decodes a field that may be missing, `null` or set. Used with `#[serde(default)]`, so that a
/// missing field stays `None` while `null` becomes `Some(None)`.
pub fn present<'d, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'d>,
    D: Deserializer<'d>,
{
    T::deserialize(deserializer).map(Some)
}

/// Input of the post create and edit form.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    /// Path of the post's current image, relative to the media directory. Set by the server,
    /// new images arrive as uploads.
    #[serde(default)]
    pub image: String,
    /// Removes the current image
    #[serde(default, deserialize_with = "checkbox")]
    pub image_clear: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_published: bool,
}

impl PostForm {
    /// An empty form for a new post, published as of now.
    pub fn blank() -> Self {
        PostForm {
            pub_date: date_format::format(&Utc::now().naive_utc()),
            is_published: true,
            ..PostForm::default()
        }
    }

    /// A form filled in with an existing post.
    pub fn of(post: &Post) -> Self {
        PostForm {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: date_format::format(&post.pub_date),
            location: post.location.map(|id| id.to_string()).unwrap_or_default(),
            category: post.category.map(|id| id.to_string()).unwrap_or_default(),
            image: post.image.clone().unwrap_or_default(),
            image_clear: false,
            is_published: post.is_published,
        }
    }

    /// Validates the form into a post by `author`. Whether the chosen category and location exist
    /// is left to the caller.
    pub fn validate(&self, author: &str) -> Result<NewPost, FormErrors> {
        let mut errors = FormErrors::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.add("title", "This field is required.");
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.add(
                "title",
                format!("Ensure this value has at most {} characters.", MAX_TITLE_LEN),
            );
        }
        if self.text.trim().is_empty() {
            errors.add("text", "This field is required.");
        }
        let pub_date = if self.pub_date.trim().is_empty() {
            errors.add("pub_date", "This field is required.");
            None
        } else {
            let parsed = date_format::parse(&self.pub_date);
            if parsed.is_none() {
                errors.add("pub_date", "Enter a valid date and time.");
            }
            parsed
        };
        let category = choice(&self.category, "category", &mut errors);
        let location = choice(&self.location, "location", &mut errors);
        let image = match self.image.trim() {
            "" => None,
            image if is_media_path(image) => Some(image.to_owned()),
            _ => {
                errors.add("image", "Enter a path inside the media directory.");
                None
            }
        };

        let pub_date: NaiveDateTime = match pub_date {
            Some(date) => date,
            None => return Err(errors),
        };
        errors.result(NewPost {
            title: title.to_owned(),
            text: self.text.clone(),
            pub_date,
            image,
            author: author.to_owned(),
            location,
            category,
            is_published: self.is_published,
        })
    }
}

/// Parses the id picked in a select. An empty value picks nothing.
fn choice(value: &str, field: &'static str, errors: &mut FormErrors) -> Option<i32> {
    match value.trim() {
        "" => None,
        value => match value.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add(field, "Select a valid choice.");
                None
            }
        },
    }
}

/// Whether `path` is a plain relative path that stays inside the media directory.
fn is_media_path(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
}

/// Input of the comment form.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", "This field is required.");
        } else if text.chars().count() > MAX_COMMENT_LEN {
            errors.add(
                "text",
                format!("Ensure this value has at most {} characters.", MAX_COMMENT_LEN),
            );
        }
        errors.result(text.to_owned())
    }
}

/// Validates profile changes. Whether a new username is free is left to the caller.
pub fn validate_profile(profile: &UserProfile) -> Result<UserProfile, FormErrors> {
    let mut errors = FormErrors::new();
    let cleaned = UserProfile {
        username: profile.username.trim().to_owned(),
        email: profile.email.trim().to_owned(),
        first_name: profile.first_name.trim().to_owned(),
        last_name: profile.last_name.trim().to_owned(),
    };
    if let Err(message) = user::validate_username(&cleaned.username) {
        errors.add("username", message);
    }
    if let Err(message) = user::validate_email(&cleaned.email) {
        errors.add("email", message);
    }
    if cleaned.first_name.chars().count() > 150 {
        errors.add("first_name", "Ensure this value has at most 150 characters.");
    }
    if cleaned.last_name.chars().count() > 150 {
        errors.add("last_name", "Ensure this value has at most 150 characters.");
    }
    errors.result(cleaned)
}
