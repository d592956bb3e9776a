//! Adding, editing and deleting comments.
use askama::Template;
use gotham::state::{FromState, State};
use gotham_derive::{StateData, StaticResponseExtender};

use super::{
    post::{detail_page, visible_post, PostPath},
    DocumentResult, TemplateExt,
};
use crate::{
    comment::{self, Comment, NewComment},
    db::{Connection, DbConnection},
    form::{CommentForm, FormErrors},
    guard,
    handler::redirect,
    user::Session,
};

#[derive(Deserialize, StateData, StaticResponseExtender)]
pub struct CommentPath {
    pub post_id: i32,
    pub comment_id: i32,
}

/// Adds a comment to a post the commenter can see. An invalid comment shows the post again with
/// the errors.
pub fn add_post(state: &State, body: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let session = guard::login_required(Session::try_borrow_from(state))?;
    let id = PostPath::borrow_from(state).post_id;
    let post = visible_post(connection, id, Some(session))?;
    let form: CommentForm = serde_urlencoded::from_bytes(&body)?;

    match form.validate() {
        Ok(text) => {
            let new = NewComment {
                text,
                author: session.user.clone(),
                post: post.id,
            };
            let submitted = comment::submit(connection, &new)?;
            log::info!(
                "User '{}' commented on post {} ({})",
                session.user,
                post.id,
                submitted.id
            );
            Ok(redirect(state, format!("/posts/{}", post.id)))
        }
        Err(errors) => {
            let template = detail_page(connection, Some(session), post, form, errors)?;
            Ok(template.to_response(state))
        }
    }
}

#[derive(Template)]
#[template(path = "comment.html")]
struct CommentTemplate<'a> {
    session: Option<&'a Session>,
    heading: &'static str,
    post_id: i32,
    comment_id: i32,
    form: CommentForm,
    errors: FormErrors,
    deleting: bool,
}

impl<'a> CommentTemplate<'a> {
    fn editing(session: &'a Session, comment: &Comment, form: CommentForm, errors: FormErrors) -> Self {
        CommentTemplate {
            session: Some(session),
            heading: "Edit comment",
            post_id: comment.post,
            comment_id: comment.id,
            form,
            errors,
            deleting: false,
        }
    }

    fn deleting(session: &'a Session, comment: &Comment) -> Self {
        CommentTemplate {
            session: Some(session),
            heading: "Delete comment",
            post_id: comment.post,
            comment_id: comment.id,
            form: CommentForm {
                text: comment.text.clone(),
            },
            errors: FormErrors::new(),
            deleting: true,
        }
    }
}

/// Loads the comment in the path, if the logged in user wrote it.
fn owned_comment<'a>(
    state: &'a State,
    connection: &Connection,
) -> Result<(Comment, &'a Session), failure::Error> {
    let path = CommentPath::borrow_from(state);
    let comment = comment::get_on_post(connection, path.post_id, path.comment_id)?;
    let session = guard::require_owner(Session::try_borrow_from(state), &comment.author)?;
    Ok((comment, session))
}

/// Form for editing a comment
pub fn edit(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (comment, session) = owned_comment(state, connection)?;

    let form = CommentForm {
        text: comment.text.clone(),
    };
    let template = CommentTemplate::editing(session, &comment, form, FormErrors::new());
    Ok(template.to_response(state))
}

pub fn edit_post(state: &State, body: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (comment, session) = owned_comment(state, connection)?;
    let form: CommentForm = serde_urlencoded::from_bytes(&body)?;

    match form.validate() {
        Ok(text) => {
            comment::edit(connection, comment.id, &text)?;
            log::info!("User '{}' edited comment {}", session.user, comment.id);
            Ok(redirect(state, format!("/posts/{}", comment.post)))
        }
        Err(errors) => {
            let template = CommentTemplate::editing(session, &comment, form, errors);
            Ok(template.to_response(state))
        }
    }
}

/// Asks the author to confirm deleting a comment
pub fn delete(state: &State) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (comment, session) = owned_comment(state, connection)?;

    Ok(CommentTemplate::deleting(session, &comment).to_response(state))
}

pub fn delete_post(state: &State, _body: Vec<u8>) -> DocumentResult {
    let connection = &DbConnection::from_state(state)?;
    let (comment, session) = owned_comment(state, connection)?;

    comment::delete(connection, comment.id)?;
    log::info!("User '{}' deleted comment {}", session.user, comment.id);
    Ok(redirect(state, format!("/posts/{}", comment.post)))
}
