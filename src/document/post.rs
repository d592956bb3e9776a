//! Pages for reading, writing, editing and deleting posts.
use askama::Template;
use chrono::Utc;
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};
use hyper::{Body, Response};

use super::{Choice, DocumentResult, TemplateExt};
use crate::{
    category,
    comment::{self, Comment},
    config::Settings,
    db::{self, Connection, DbConnection},
    error::BlogError,
    form::{CommentForm, FormErrors, PostForm},
    guard,
    handler::redirect,
    location,
    post::{self, NewPost, Post, PostListing},
    upload::{self, Upload},
    user::Session,
};

#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct PostPath {
    pub post_id: i32,
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate<'a> {
    pub session: Option<&'a Session>,
    pub listing: PostListing,
    pub comments: Vec<Comment>,
    pub is_owner: bool,
    pub form: CommentForm,
    pub errors: FormErrors,
}

impl<'a> DetailTemplate<'a> {
    fn can_change(&self, comment: &Comment) -> bool {
        guard::is_owner(self.session, &comment.author)
    }
}

/// Loads a post if `session` may see it.
pub fn visible_post(
    connection: &Connection,
    id: i32,
    session: Option<&Session>,
) -> Result<Post, failure::Error> {
    let post = post::get(connection, id)?;
    let category = match post.category {
        Some(id) => category::get(connection, id)?,
        None => None,
    };
    let viewer = session.map(|session| session.user.as_str());
    if post.visible_to(category.as_ref(), viewer, Utc::now().naive_utc()) {
        Ok(post)
    } else {
        Err(BlogError::NotFound.into())
    }
}

/// Builds the post page, with a comment form holding `form`.
pub fn detail_page<'a>(
    connection: &Connection,
    session: Option<&'a Session>,
    post: Post,
    form: CommentForm,
    errors: FormErrors,
) -> Result<DetailTemplate<'a>, failure::Error> {
    let comments = comment::list(connection, post.id)?;
    let is_owner = guard::is_owner(session, &post.author);
    let listing = post::listings(connection, vec![post])?
        .pop()
        .ok_or(BlogError::NotFound)?;
    Ok(DetailTemplate {
        session,
        listing,
        comments,
        is_owner,
        form,
        errors,
    })
}

/// Display a post with its comments
pub fn view(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let id = PostPath::borrow_from(state).post_id;
    let session = Session::try_borrow_from(state);

    let post = visible_post(connection, id, session)?;
    let template = detail_page(
        connection,
        session,
        post,
        CommentForm::default(),
        FormErrors::new(),
    )?;
    Ok(template.to_response(state))
}

#[derive(Template)]
#[template(path = "create.html")]
struct PostFormTemplate<'a> {
    session: Option<&'a Session>,
    heading: &'static str,
    /// The post being edited, `None` for a new one
    post_id: Option<i32>,
    form: PostForm,
    errors: FormErrors,
    categories: Vec<Choice>,
    locations: Vec<Choice>,
}

impl<'a> PostFormTemplate<'a> {
    /// The form for a new post, or for editing `existing`. An existing post keeps its category
    /// and location as choices even if they are no longer published.
    fn new(
        connection: &Connection,
        session: Option<&'a Session>,
        existing: Option<&Post>,
        form: PostForm,
        errors: FormErrors,
    ) -> Result<Self, failure::Error> {
        let categories = category::choices(connection, existing.and_then(|post| post.category))?
            .into_iter()
            .map(|category| (category.id, category.title));
        let locations = location::choices(connection, existing.and_then(|post| post.location))?
            .into_iter()
            .map(|location| (location.id, location.name));
        let heading = match existing {
            Some(_) => "Edit post",
            None => "New post",
        };
        Ok(PostFormTemplate {
            session,
            heading,
            post_id: existing.map(|post| post.id),
            categories: Choice::list(categories, &form.category),
            locations: Choice::list(locations, &form.location),
            form,
            errors,
        })
    }
}

/// Validates a submitted post form, including that the chosen category and location exist.
///
/// The category must be published unless it is `current`, the category the post is already
/// filed under. A valid `upload` replaces the form's image.
fn validate(
    connection: &Connection,
    form: &PostForm,
    author: &str,
    current: Option<i32>,
    upload: Option<&Upload>,
) -> Result<Result<NewPost, FormErrors>, failure::Error> {
    let image = upload.map(Upload::check);
    let mut new = match form.validate(author) {
        Ok(new) => new,
        Err(mut errors) => {
            if let Some(Err(message)) = image {
                errors.add("image", message);
            }
            return Ok(Err(errors));
        }
    };
    let mut errors = FormErrors::new();
    match image {
        Some(Ok(path)) => new.image = Some(path),
        Some(Err(message)) => errors.add("image", message),
        None => (),
    }
    if let Some(id) = new.category {
        match category::get(connection, id)? {
            Some(ref category) if category.is_published || current == Some(id) => (),
            _ => errors.add("category", "Select a valid choice."),
        }
    }
    if let Some(id) = new.location {
        if location::get(connection, id)?.is_none() {
            errors.add("location", "Select a valid choice.");
        }
    }
    Ok(errors.result(new))
}

fn duplicate_post() -> FormErrors {
    let mut errors = FormErrors::new();
    errors.add(
        "title",
        "A post with this title, category and publication date already exists.",
    );
    errors
}

/// Form for a new post
pub fn create(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::login_required(Session::try_borrow_from(state))?;

    let template = PostFormTemplate::new(
        connection,
        Some(session),
        None,
        PostForm::blank(),
        FormErrors::new(),
    )?;
    Ok(template.to_response(state))
}

/// Stores the uploaded image at the path `validate` picked for it.
fn save_image(
    state: &State,
    upload: Option<&Upload>,
    new: &NewPost,
) -> Result<(), failure::Error> {
    if let (Some(upload), Some(path)) = (upload, &new.image) {
        upload.save(&Settings::borrow_from(state).media_dir, path)?;
    }
    Ok(())
}

pub fn create_post(state: &State, post: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::login_required(Session::try_borrow_from(state))?;
    let (mut form, image) = upload::read_post_form(state, &post)?;
    form.image = String::new();

    let new = match validate(connection, &form, &session.user, None, image.as_ref())? {
        Ok(new) => new,
        Err(errors) => {
            let template = PostFormTemplate::new(connection, Some(session), None, form, errors)?;
            return Ok(template.to_response(state));
        }
    };
    match post::submit(connection, &new) {
        Ok(created) => {
            save_image(state, image.as_ref(), &new)?;
            log::info!("User '{}' created post {}", session.user, created.id);
            Ok(redirect(state, format!("/profile/{}", session.user)))
        }
        Err(ref e) if db::is_unique_violation(e) => {
            let template =
                PostFormTemplate::new(connection, Some(session), None, form, duplicate_post())?;
            Ok(template.to_response(state))
        }
        Err(e) => Err(e.into()),
    }
}

/// Loads the post in the path for a change by its author.
///
/// Anyone else is sent to the post's page instead.
fn owned_post<'a>(
    state: &'a State,
    connection: &Connection,
) -> Result<Result<(Post, &'a Session), Response<Body>>, failure::Error> {
    let id = PostPath::borrow_from(state).post_id;
    let session = guard::login_required(Session::try_borrow_from(state))?;
    let post = post::get(connection, id)?;

    match guard::require_owner(Some(session), &post.author) {
        Ok(session) => Ok(Ok((post, session))),
        Err(_) => Ok(Err(redirect(state, format!("/posts/{}", id)))),
    }
}

/// Form for editing a post
pub fn edit(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (post, session) = match owned_post(state, connection)? {
        Ok(owned) => owned,
        Err(denied) => return Ok(denied),
    };

    let form = PostForm::of(&post);
    let template =
        PostFormTemplate::new(connection, Some(session), Some(&post), form, FormErrors::new())?;
    Ok(template.to_response(state))
}

pub fn edit_post(state: &State, body: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (post, session) = match owned_post(state, connection)? {
        Ok(owned) => owned,
        Err(denied) => return Ok(denied),
    };
    let (mut form, image) = upload::read_post_form(state, &body)?;
    form.image = match (&post.image, form.image_clear) {
        (Some(current), false) => current.clone(),
        _ => String::new(),
    };

    let new = match validate(connection, &form, &post.author, post.category, image.as_ref())? {
        Ok(new) => new,
        Err(errors) => {
            let template =
                PostFormTemplate::new(connection, Some(session), Some(&post), form, errors)?;
            return Ok(template.to_response(state));
        }
    };
    match post::edit(connection, post.id, &new.changes()) {
        Ok(_) => {
            save_image(state, image.as_ref(), &new)?;
            log::info!("User '{}' edited post {}", session.user, post.id);
            Ok(redirect(state, format!("/profile/{}", post.author)))
        }
        Err(ref e) if db::is_unique_violation(e) => {
            let template = PostFormTemplate::new(
                connection,
                Some(session),
                Some(&post),
                form,
                duplicate_post(),
            )?;
            Ok(template.to_response(state))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Template)]
#[template(path = "post-delete.html")]
struct DeleteTemplate<'a> {
    session: Option<&'a Session>,
    post: Post,
}

/// Asks the author to confirm deleting a post
pub fn delete(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (post, session) = match owned_post(state, connection)? {
        Ok(owned) => owned,
        Err(denied) => return Ok(denied),
    };

    let template = DeleteTemplate {
        session: Some(session),
        post,
    };
    Ok(template.to_response(state))
}

pub fn delete_post(state: &State, _body: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (post, session) = match owned_post(state, connection)? {
        Ok(owned) => owned,
        Err(denied) => return Ok(denied),
    };

    post::delete(connection, post.id)?;
    log::info!("User '{}' deleted post {}", session.user, post.id);
    Ok(redirect(state, format!("/profile/{}", post.author)))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{category::Category, location::Location};

    fn listing() -> PostListing {
        let date = NaiveDate::from_ymd(2020, 6, 1).and_hms(8, 0, 0);
        PostListing {
            post: Post {
                id: 12,
                title: String::from("Night train"),
                text: String::from("We took the **night** train."),
                pub_date: date,
                image: Some(String::from("post_images/train.jpg")),
                author: String::from("anna"),
                location: Some(1),
                category: Some(2),
                is_published: true,
                created_at: date,
            },
            category: Some(Category {
                id: 2,
                title: String::from("Trains"),
                description: String::new(),
                slug: String::from("trains"),
                is_published: true,
                created_at: date,
            }),
            location: Some(Location {
                id: 1,
                name: String::from("Secret place"),
                is_published: false,
                created_at: date,
            }),
            comment_count: 1,
        }
    }

    fn comment(author: &str) -> Comment {
        Comment {
            id: 5,
            text: String::from("Lovely"),
            author: author.to_owned(),
            post: 12,
            created_at: NaiveDate::from_ymd(2020, 6, 2).and_hms(9, 0, 0),
        }
    }

    #[test]
    fn detail_for_reader() {
        let session = Session::new("reader");
        let template = DetailTemplate {
            session: Some(&session),
            listing: listing(),
            comments: vec![comment("reader"), comment("someone")],
            is_owner: false,
            form: CommentForm::default(),
            errors: FormErrors::new(),
        };
        let html = template.render().unwrap();
        assert!(html.contains("<strong>night</strong>"));
        assert!(html.contains("train.jpg"));
        assert!(html.contains("Trains"));
        // Unpublished locations aren't shown
        assert!(!html.contains("Secret place"));
        // Only the reader's own comment can be changed
        assert_eq!(html.matches("/edit_comment/5").count(), 1);
        assert!(!html.contains("/posts/12/edit\""));
        assert!(html.contains("action=\"/posts/12/comment\""));
    }

    #[test]
    fn detail_for_author_and_guest() {
        let session = Session::new("anna");
        let template = DetailTemplate {
            session: Some(&session),
            listing: listing(),
            comments: Vec::new(),
            is_owner: true,
            form: CommentForm::default(),
            errors: FormErrors::new(),
        };
        let html = template.render().unwrap();
        assert!(html.contains("/posts/12/edit\""));
        assert!(html.contains("/posts/12/delete\""));

        let template = DetailTemplate {
            session: None,
            listing: listing(),
            comments: Vec::new(),
            is_owner: false,
            form: CommentForm::default(),
            errors: FormErrors::new(),
        };
        let html = template.render().unwrap();
        assert!(html.contains("to leave a comment"));
        assert!(!html.contains("/posts/12/comment"));
    }

    #[test]
    fn form_shows_errors_and_choices() {
        let mut errors = FormErrors::new();
        errors.add("title", "This field is required.");
        let mut form = PostForm::blank();
        form.category = String::from("2");
        let template = PostFormTemplate {
            session: None,
            heading: "New post",
            post_id: None,
            categories: Choice::list(vec![(2, String::from("Trains"))], &form.category),
            locations: Choice::list(Vec::new(), &form.location),
            form,
            errors,
        };
        let html = template.render().unwrap();
        assert!(html.contains("This field is required."));
        assert!(html.contains("<option value=\"2\" selected>Trains</option>"));
        assert!(html.contains("name=\"is_published\" checked"));
        assert!(html.contains("action=\"/posts/create\""));
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(html.contains("type=\"file\""));
        // Nothing to remove on a new post
        assert!(!html.contains("image_clear"));
    }

    #[test]
    fn edit_form_offers_to_remove_image() {
        let mut form = PostForm::of(&listing().post);
        form.image_clear = true;
        let template = PostFormTemplate {
            session: None,
            heading: "Edit post",
            post_id: Some(12),
            categories: Choice::list(Vec::new(), &form.category),
            locations: Choice::list(Vec::new(), &form.location),
            form,
            errors: FormErrors::new(),
        };
        let html = template.render().unwrap();
        assert!(html.contains("action=\"/posts/12/edit\""));
        assert!(html.contains("train.jpg"));
        assert!(html.contains("name=\"image_clear\" checked"));
    }

    #[test]
    fn post_keeps_unpublished_category_on_edit() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        crate::user::create(&connection, crate::user::tests::new_user("writer")).unwrap();
        let retired = category::create(
            &connection,
            &category::tests::new_category("retired", true),
        )
        .unwrap();
        let filed = post::submit(
            &connection,
            &NewPost {
                title: String::from("Old trip"),
                text: String::from("text"),
                pub_date: Utc::now().naive_utc() - chrono::Duration::days(3),
                image: None,
                author: String::from("writer"),
                location: None,
                category: Some(retired.id),
                is_published: true,
            },
        )
        .unwrap();
        let changes = category::CategoryChanges {
            title: retired.title.clone(),
            description: retired.description.clone(),
            slug: retired.slug.clone(),
            is_published: Some(false),
        };
        category::edit(&connection, retired.id, &changes).unwrap();

        let template = PostFormTemplate::new(
            &connection,
            None,
            Some(&filed),
            PostForm::of(&filed),
            FormErrors::new(),
        )
        .unwrap();
        let selected: Vec<&Choice> = template
            .categories
            .iter()
            .filter(|choice| choice.selected)
            .collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, retired.id.to_string());

        let mut form = PostForm::of(&filed);
        form.title = String::from("Old trip, revisited");
        let new = validate(&connection, &form, "writer", filed.category, None)
            .unwrap()
            .unwrap();
        assert_eq!(new.category, Some(retired.id));

        // Other posts can't be filed under it
        let errors = validate(&connection, &form, "writer", None, None)
            .unwrap()
            .unwrap_err();
        assert!(errors.has("category"));
    }

    #[test]
    fn upload_replaces_image() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        let mut form = PostForm::of(&listing().post);
        form.category = String::new();
        form.location = String::new();
        let upload = Upload {
            filename: String::from("harbour.webp"),
            data: vec![1, 2, 3],
        };
        let new = validate(&connection, &form, "anna", None, Some(&upload))
            .unwrap()
            .unwrap();
        let image = new.image.unwrap();
        assert!(image.starts_with("post_images/"));
        assert!(image.ends_with(".webp"));

        let text = Upload {
            filename: String::from("notes.txt"),
            data: vec![1],
        };
        let errors = validate(&connection, &form, "anna", None, Some(&text))
            .unwrap()
            .unwrap_err();
        assert!(errors.has("image"));
    }

    #[test]
    fn hidden_post_is_not_found() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        crate::user::create(&connection, crate::user::tests::new_user("writer")).unwrap();
        let draft = post::submit(
            &connection,
            &NewPost {
                title: String::from("Draft"),
                text: String::from("text"),
                pub_date: Utc::now().naive_utc() - chrono::Duration::days(1),
                image: None,
                author: String::from("writer"),
                location: None,
                category: None,
                is_published: false,
            },
        )
        .unwrap();

        let stranger = Session::new("stranger");
        let author = Session::new("writer");
        let error = visible_post(&connection, draft.id, Some(&stranger)).unwrap_err();
        assert_eq!(error.downcast_ref::<BlogError>(), Some(&BlogError::NotFound));
        assert!(visible_post(&connection, draft.id, None).is_err());
        assert_eq!(
            visible_post(&connection, draft.id, Some(&author)).unwrap().id,
            draft.id
        );
    }
}
