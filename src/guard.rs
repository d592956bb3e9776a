//! Authorization checks run before a handler changes anything.
//!
//! Posts and comments may only be changed by their author. Categories, locations and other
//! people's posts may only be changed by users whose group grants the matching permission.
use crate::{
    db::Connection,
    error::BlogError,
    user::{Permission, Session},
};

/// Result of an authorization check
pub type GuardResult<T> = Result<T, BlogError>;

/// Requires a logged in user.
pub fn login_required(session: Option<&Session>) -> GuardResult<&Session> {
    session.ok_or(BlogError::LoginRequired)
}

/// Requires the logged in user to be `author`.
pub fn require_owner<'a>(session: Option<&'a Session>, author: &str) -> GuardResult<&'a Session> {
    let session = login_required(session)?;
    if session.user == author {
        Ok(session)
    } else {
        log::warn!(
            "User '{}' tried to change content owned by '{}'",
            session.user,
            author
        );
        Err(BlogError::Forbidden)
    }
}

/// Whether `session` belongs to `author`. Used to decide which controls to show.
pub fn is_owner(session: Option<&Session>, author: &str) -> bool {
    session.map_or(false, |session| session.user == author)
}

/// Requires the logged in user's group to grant `permission`.
pub fn require_permission<'a>(
    session: Option<&'a Session>,
    permission: Permission,
    connection: &Connection,
) -> Result<&'a Session, failure::Error> {
    let session = login_required(session)?;
    if session.allowed(permission, connection)? {
        Ok(session)
    } else {
        log::warn!("User '{}' lacks permission {:?}", session.user, permission);
        Err(BlogError::Forbidden.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_must_log_in() {
        assert_eq!(login_required(None).unwrap_err(), BlogError::LoginRequired);
        assert_eq!(
            require_owner(None, "author").unwrap_err(),
            BlogError::LoginRequired
        );
        assert!(!is_owner(None, "author"));
    }

    #[test]
    fn only_author_passes() {
        let author = Session::new("author");
        let other = Session::new("other");
        assert_eq!(require_owner(Some(&author), "author").unwrap().user, "author");
        assert_eq!(
            require_owner(Some(&other), "author").unwrap_err(),
            BlogError::Forbidden
        );
        assert!(is_owner(Some(&author), "author"));
        assert!(!is_owner(Some(&other), "author"));
    }

    #[test]
    fn usernames_compare_exactly() {
        let session = Session::new("Author");
        assert!(require_owner(Some(&session), "author").is_err());
        assert!(require_owner(Some(&session), "Author ").is_err());
    }
}
