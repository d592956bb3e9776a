use chrono::NaiveDateTime;
use diesel::{pg::Pg, prelude::*, result::Error as DieselError};

use crate::{db::Connection, schema::locations};

#[derive(Clone, Debug, Serialize, Deserialize, Queryable, Identifiable)]
#[table_name = "locations"]
pub struct Location {
    pub id: i32,
    pub name: String,
    pub is_published: bool,
    #[serde(with = "crate::date_format")]
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable)]
#[table_name = "locations"]
pub struct NewLocation {
    pub name: String,
    #[serde(default = "crate::form::yes")]
    pub is_published: bool,
}

impl NewLocation {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)
    }
}

/// Changes to an existing location. Without `is_published` the location stays as visible as it
/// was.
#[derive(Clone, Debug, Serialize, Deserialize, AsChangeset)]
#[table_name = "locations"]
pub struct LocationChanges {
    pub name: String,
    #[serde(default)]
    pub is_published: Option<bool>,
}

impl LocationChanges {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() || name.chars().count() > 256 {
        return Err(String::from("name must be between 1 and 256 characters"));
    }
    Ok(())
}

pub fn list(connection: &Connection) -> Result<Vec<Location>, DieselError> {
    use crate::schema::locations::dsl;

    dsl::locations.order(dsl::name.desc()).load(connection)
}

/// The published locations, plus the post's `current` one.
pub fn choices(
    connection: &Connection,
    current: Option<i32>,
) -> Result<Vec<Location>, DieselError> {
    use crate::schema::locations::dsl;

    let mut query = dsl::locations
        .filter(dsl::is_published.eq(true))
        .into_boxed::<Pg>();
    if let Some(id) = current {
        query = query.or_filter(dsl::id.eq(id));
    }
    query.order(dsl::name.desc()).load(connection)
}

pub fn get(connection: &Connection, id: i32) -> Result<Option<Location>, DieselError> {
    use crate::schema::locations::dsl;

    dsl::locations.find(id).first(connection).optional()
}

pub fn create(connection: &Connection, new: &NewLocation) -> Result<Location, DieselError> {
    diesel::insert_into(locations::table)
        .values(new)
        .get_result(connection)
}

pub fn edit(
    connection: &Connection,
    id: i32,
    changes: &LocationChanges,
) -> Result<usize, DieselError> {
    use crate::schema::locations::dsl;

    diesel::update(dsl::locations.find(id))
        .set(changes)
        .execute(connection)
}

/// Deletes a location. Posts at the location lose it.
pub fn delete(connection: &Connection, id: i32) -> Result<usize, DieselError> {
    use crate::schema::locations::dsl;

    diesel::delete(dsl::locations.find(id)).execute(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        let mut location = NewLocation {
            name: String::from("Lisbon"),
            is_published: true,
        };
        assert!(location.validate().is_ok());
        location.name = String::new();
        assert!(location.validate().is_err());
        location.name = "ж".repeat(256);
        assert!(location.validate().is_ok());
        location.name.push('ж');
        assert!(location.validate().is_err());
    }

    #[test]
    fn renaming_keeps_visibility() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        let hidden = create(
            &connection,
            &NewLocation {
                name: String::from("Atlantis"),
                is_published: false,
            },
        )
        .unwrap();
        let rename: LocationChanges = serde_json::from_str(r#"{"name": "Lost Atlantis"}"#).unwrap();
        assert_eq!(edit(&connection, hidden.id, &rename).unwrap(), 1);
        let renamed = get(&connection, hidden.id).unwrap().unwrap();
        assert_eq!(renamed.name, "Lost Atlantis");
        assert!(!renamed.is_published);
    }
}
