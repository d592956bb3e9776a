use chrono::NaiveDateTime;
use diesel::{pg::PgConnection as Connection, prelude::*, result::Error as DieselError, Queryable};

use std::collections::HashMap;

use crate::schema::comments;

#[derive(Clone, Debug, Serialize, Deserialize, Queryable, Identifiable)]
pub struct Comment {
    /// The unique id of this comment
    pub id: i32,
    /// The comment's content
    pub text: String,
    /// The user who submitted the comment
    pub author: String,
    /// The id of the post this comment belongs to
    pub post: i32,
    /// The time of the comment's submission
    #[serde(with = "crate::date_format")]
    pub created_at: NaiveDateTime,
}

impl Comment {
    pub fn created(&self) -> String {
        self.created_at.format("%d %B %Y, %H:%M").to_string()
    }

    pub fn formatted(&self) -> String {
        crate::config::render_markdown(&self.text)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Insertable)]
#[table_name = "comments"]
pub struct NewComment {
    pub text: String,
    pub author: String,
    pub post: i32,
}

/// Get the comments of a post, oldest first
pub fn list(connection: &Connection, post: i32) -> Result<Vec<Comment>, DieselError> {
    use crate::schema::comments::dsl;

    dsl::comments
        .filter(dsl::post.eq(post))
        .order((dsl::created_at.asc(), dsl::id.asc()))
        .load::<Comment>(connection)
}

/// Counts the comments of each of the given posts. Posts without comments are left out.
pub fn count_by_post(
    connection: &Connection,
    posts: &[i32],
) -> Result<HashMap<i32, i64>, DieselError> {
    use crate::schema::comments::dsl;

    let commented: Vec<i32> = dsl::comments
        .filter(dsl::post.eq_any(posts))
        .select(dsl::post)
        .load(connection)?;
    Ok(tally(commented))
}

fn tally(posts: Vec<i32>) -> HashMap<i32, i64> {
    posts.into_iter().fold(HashMap::new(), |mut counts, post| {
        *counts.entry(post).or_insert(0) += 1;
        counts
    })
}

/// Gets a comment only if it belongs to `post`
pub fn get_on_post(connection: &Connection, post: i32, id: i32) -> Result<Comment, DieselError> {
    use crate::schema::comments::dsl;

    dsl::comments
        .find(id)
        .filter(dsl::post.eq(post))
        .first(connection)
}

pub fn submit(connection: &Connection, comment: &NewComment) -> Result<Comment, DieselError> {
    diesel::insert_into(comments::table)
        .values(comment)
        .get_result(connection)
}

pub fn edit(connection: &Connection, id: i32, text: &str) -> Result<usize, DieselError> {
    use crate::schema::comments::dsl;

    diesel::update(dsl::comments.find(id))
        .set(dsl::text.eq(text))
        .execute(connection)
}

pub fn delete(connection: &Connection, id: i32) -> Result<usize, DieselError> {
    use crate::schema::comments::dsl;

    diesel::delete(dsl::comments.find(id)).execute(connection)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{post, user};

    pub fn new_comment(post: i32, text: &str) -> NewComment {
        NewComment {
            text: text.to_owned(),
            author: String::from("writer"),
            post,
        }
    }

    #[test]
    fn tally_counts_rows() {
        let counts = tally(vec![3, 1, 3, 3, 2]);
        assert_eq!(counts.get(&3), Some(&3));
        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&2), Some(&1));
        assert_eq!(counts.get(&4), None);
    }

    #[test]
    fn json_encode() {
        let comment = Comment {
            id: 1,
            text: String::from("Nice post"),
            author: String::from("reader"),
            post: 7,
            created_at: chrono::NaiveDate::from_ymd(2020, 5, 1).and_hms(9, 15, 0),
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["created_at"], "2020-05-01T09:15:00");
        assert_eq!(json["post"], 7);
    }

    fn post_by_writer(connection: &Connection) -> i32 {
        if !user::exists(connection, "writer").unwrap() {
            user::create(connection, user::tests::new_user("writer")).unwrap();
        }
        post::submit(
            connection,
            &post::NewPost {
                title: String::from("Commented"),
                text: String::from("text"),
                pub_date: chrono::Utc::now().naive_utc(),
                image: None,
                author: String::from("writer"),
                location: None,
                category: None,
                is_published: true,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn oldest_first_and_cascade() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        let post_id = post_by_writer(&connection);
        let first = submit(&connection, &new_comment(post_id, "first")).unwrap();
        let second = submit(&connection, &new_comment(post_id, "second")).unwrap();

        let ids: Vec<i32> = list(&connection, post_id)
            .unwrap()
            .iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(count_by_post(&connection, &[post_id]).unwrap()[&post_id], 2);

        match get_on_post(&connection, post_id + 1, first.id) {
            Err(DieselError::NotFound) => (),
            other => panic!("comment found on the wrong post: {:?}", other),
        }

        post::delete(&connection, post_id).unwrap();
        assert!(list(&connection, post_id).unwrap().is_empty());
    }
}
