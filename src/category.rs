use chrono::NaiveDateTime;
use diesel::{pg::Pg, prelude::*, result::Error as DieselError};

use crate::{db::Connection, schema::categories};

#[derive(Clone, Debug, Serialize, Deserialize, Queryable, Identifiable)]
#[table_name = "categories"]
pub struct Category {
    pub id: i32,
    pub title: String,
    pub description: String,
    /// Unique identifier used in the category's url
    pub slug: String,
    /// Whether the category and its posts are shown to the public
    pub is_published: bool,
    #[serde(with = "crate::date_format")]
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable)]
#[table_name = "categories"]
pub struct NewCategory {
    pub title: String,
    pub description: String,
    pub slug: String,
    #[serde(default = "crate::form::yes")]
    pub is_published: bool,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), String> {
        validate(&self.title, &self.slug)
    }
}

/// Changes to an existing category. Leaving out `is_published` keeps the category's current
/// visibility.
#[derive(Clone, Debug, Serialize, Deserialize, AsChangeset)]
#[table_name = "categories"]
pub struct CategoryChanges {
    pub title: String,
    pub description: String,
    pub slug: String,
    #[serde(default)]
    pub is_published: Option<bool>,
}

impl CategoryChanges {
    pub fn validate(&self) -> Result<(), String> {
        validate(&self.title, &self.slug)
    }
}

fn validate(title: &str, slug: &str) -> Result<(), String> {
    if title.trim().is_empty() || title.chars().count() > 256 {
        return Err(String::from("title must be between 1 and 256 characters"));
    }
    if slug.is_empty() || !slug.chars().all(is_slug_char) {
        return Err(String::from(
            "slug may only contain latin letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// All categories, newest title first.
pub fn list(connection: &Connection) -> Result<Vec<Category>, DieselError> {
    use crate::schema::categories::dsl;

    dsl::categories.order(dsl::title.desc()).load(connection)
}

/// The categories a post may be filed under: the published ones, plus `current` even if it was
/// unpublished after the post was filed under it.
pub fn choices(
    connection: &Connection,
    current: Option<i32>,
) -> Result<Vec<Category>, DieselError> {
    use crate::schema::categories::dsl;

    let mut query = dsl::categories
        .filter(dsl::is_published.eq(true))
        .into_boxed::<Pg>();
    if let Some(id) = current {
        query = query.or_filter(dsl::id.eq(id));
    }
    query.order(dsl::title.desc()).load(connection)
}

pub fn get(connection: &Connection, id: i32) -> Result<Option<Category>, DieselError> {
    use crate::schema::categories::dsl;

    dsl::categories.find(id).first(connection).optional()
}

/// Gets a category by slug if it's published.
pub fn published_by_slug(connection: &Connection, slug: &str) -> Result<Category, DieselError> {
    use crate::schema::categories::dsl;

    dsl::categories
        .filter(dsl::slug.eq(slug))
        .filter(dsl::is_published.eq(true))
        .first(connection)
}

pub fn create(connection: &Connection, new: &NewCategory) -> Result<Category, DieselError> {
    diesel::insert_into(categories::table)
        .values(new)
        .get_result(connection)
}

pub fn edit(
    connection: &Connection,
    id: i32,
    changes: &CategoryChanges,
) -> Result<usize, DieselError> {
    use crate::schema::categories::dsl;

    diesel::update(dsl::categories.find(id))
        .set(changes)
        .execute(connection)
}

/// Deletes a category. Its posts are kept without a category.
pub fn delete(connection: &Connection, id: i32) -> Result<usize, DieselError> {
    use crate::schema::categories::dsl;

    diesel::delete(dsl::categories.find(id)).execute(connection)
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn new_category(slug: &str, is_published: bool) -> NewCategory {
        NewCategory {
            title: format!("Category {}", slug),
            description: String::from("Things worth writing about"),
            slug: slug.to_owned(),
            is_published,
        }
    }

    #[test]
    fn slug_validation() {
        assert!(new_category("travel_2020-summer", true).validate().is_ok());
        assert!(new_category("", true).validate().is_err());
        assert!(new_category("путешествия", true).validate().is_err());
        assert!(new_category("with space", true).validate().is_err());
    }

    #[test]
    fn title_validation() {
        let mut category = new_category("ok", true);
        category.title = "x".repeat(257);
        assert!(category.validate().is_err());
        category.title = String::from("   ");
        assert!(category.validate().is_err());
    }

    #[test]
    fn changes_without_visibility() {
        let changes: CategoryChanges = serde_json::from_str(
            r#"{"title": "Trips", "description": "", "slug": "trips"}"#,
        )
        .unwrap();
        assert_eq!(changes.is_published, None);
        assert!(changes.validate().is_ok());
    }

    #[test]
    fn renaming_keeps_visibility() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        let hidden = create(&connection, &new_category("drafts", false)).unwrap();
        let rename = CategoryChanges {
            title: String::from("Drafts and notes"),
            description: hidden.description.clone(),
            slug: hidden.slug.clone(),
            is_published: None,
        };
        assert_eq!(edit(&connection, hidden.id, &rename).unwrap(), 1);
        let renamed = get(&connection, hidden.id).unwrap().unwrap();
        assert_eq!(renamed.title, "Drafts and notes");
        assert!(!renamed.is_published);

        let publish = CategoryChanges {
            is_published: Some(true),
            ..rename
        };
        edit(&connection, hidden.id, &publish).unwrap();
        assert!(get(&connection, hidden.id).unwrap().unwrap().is_published);
    }

    #[test]
    fn unpublished_category_has_no_page() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        create(&connection, &new_category("hidden", false)).unwrap();
        let shown = create(&connection, &new_category("shown", true)).unwrap();

        match published_by_slug(&connection, "hidden") {
            Err(DieselError::NotFound) => (),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(published_by_slug(&connection, "shown").unwrap().id, shown.id);
        assert!(choices(&connection, None)
            .unwrap()
            .iter()
            .all(|category| category.slug != "hidden"));
    }

    #[test]
    fn current_category_stays_a_choice() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        let retired = create(&connection, &new_category("retired", false)).unwrap();
        let shown = create(&connection, &new_category("current", true)).unwrap();

        let ids: Vec<i32> = choices(&connection, Some(retired.id))
            .unwrap()
            .iter()
            .map(|category| category.id)
            .collect();
        assert!(ids.contains(&retired.id));
        assert!(ids.contains(&shown.id));
    }
}
