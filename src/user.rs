use bcrypt::BcryptError;
use chrono::{Duration, NaiveDateTime, Utc};
use cookie::{Cookie, CookieJar};
use diesel::{prelude::*, result::Error as DieselError};
use diesel_derive_enum::DbEnum;
use futures::future;
use gotham::{
    handler::HandlerFuture,
    helpers::http::response::create_response,
    middleware::Middleware,
    state::{FromState, State},
};
use gotham_derive::{NewMiddleware, StateData};
use rand::prelude::*;
use sha2::{Digest, Sha256};

use crate::{
    config,
    db::{Connection, DbConnection},
    schema::{groups, sessions, users},
};

const SALT_LEN: usize = 16;
const SESSION_LEN: usize = 24;
const SESSION_COOKIE: &str = "session";

#[derive(Debug, Queryable, Identifiable, Insertable)]
pub struct User {
    /// The unique username/login
    pub id: String,
    /// The hashed password
    hash: String,
    /// The salt for the password
    salt: Vec<u8>,
    /// The user's email address
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// The group the user belongs to
    group: String,
}

impl User {
    /// Verify the supplied password matches the users
    pub fn verify(&self, password: &str) -> Result<bool, BcryptError> {
        verify(password, &self.salt, &self.hash)
    }

    /// The name shown next to the user's posts and comments.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        match full.trim() {
            "" => self.id.clone(),
            name => name.to_owned(),
        }
    }

    /// Checks if a user has a given permission.
    pub fn allowed(
        &self,
        permission: Permission,
        connection: &Connection,
    ) -> Result<bool, DieselError> {
        use crate::schema::groups::dsl;

        let group: Group = dsl::groups.find(&self.group).first(connection)?;
        Ok(group.grants(permission))
    }
}

/// A to be created user.
///
/// NOTE: This structure contains the user's unencrypted password, handle it with great care!
#[derive(Clone, Deserialize)]
pub struct NewUser {
    /// The username
    pub id: String,
    /// The users raw password
    password: String,
    /// The user's email address
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl NewUser {
    /// Checks the fields a user picks when signing up.
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.id)?;
        validate_email(&self.email)?;
        if self.password.chars().count() < 8 {
            return Err(String::from("The password must be at least 8 characters long"));
        }
        Ok(())
    }

    /// The profile fields of the new user, to fill a form in again.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    /// Converts the structure into a proper user, generating a salt and hashing the password.
    pub fn into_user(self) -> Result<User, BcryptError> {
        let salt = generate_salt().to_vec();
        Ok(User {
            id: self.id,
            hash: hash(&self.password, &salt)?,
            salt,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            group: default_group(),
        })
    }
}

fn default_group() -> String {
    String::from("default")
}

/// Usernames may contain letters, digits and `@.+-_`, up to 150 characters.
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if len == 0 || len > 150 {
        return Err(String::from("The username must be between 1 and 150 characters"));
    }
    let allowed = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if !username.chars().all(allowed) {
        return Err(String::from(
            "The username may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    match email.find('@') {
        Some(at) if at > 0 && at < email.len() - 1 && !email.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => Err(String::from("Enter a valid email address")),
    }
}

/// The profile fields a user can change.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UserProfile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserProfile {
    pub fn of(user: &User) -> Self {
        UserProfile {
            username: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Login credentials
#[derive(Deserialize)]
pub struct Login {
    pub user: String,
    password: String,
}

impl Login {
    /// Create a session if username and password is valid
    pub fn login(&self, connection: &Connection) -> Result<Option<Session>, failure::Error> {
        let user: Option<User> = users::dsl::users
            .find(&self.user)
            .first(connection)
            .optional()?;
        match user {
            Some(ref user) if user.verify(&self.password)? => {
                let session = Session::new(&self.user);
                diesel::insert_into(sessions::table)
                    .values(&session)
                    .execute(connection)?;
                log::info!("User '{}' logged in", self.user);
                Ok(Some(session))
            }
            _ => {
                log::warn!("Failed login attempt for '{}'", self.user);
                Ok(None)
            }
        }
    }
}

impl From<NewUser> for Login {
    fn from(u: NewUser) -> Self {
        Self {
            user: u.id,
            password: u.password,
        }
    }
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize, StateData)]
pub struct Session {
    pub id: String,
    pub user: String,
    pub expires: NaiveDateTime,
}

impl Session {
    /// Generates a new session.
    ///
    /// NB: Must be inserted into the database for the session to be valid.
    pub fn new(user: &str) -> Session {
        // Fill array with random data
        let mut id = [0u8; SESSION_LEN];
        StdRng::from_entropy().fill(&mut id[..]);
        Session {
            id: base64::encode(&id),
            user: user.to_owned(),
            expires: Utc::now().naive_utc() + Duration::days(30),
        }
    }

    /// Get the unexpired session with the specified id
    pub fn from_id(id: &str, connection: &Connection) -> Result<Option<Session>, DieselError> {
        use crate::schema::sessions::dsl;

        dsl::sessions
            .find(id)
            .filter(dsl::expires.gt(Utc::now().naive_utc()))
            .first(connection)
            .optional()
    }

    pub fn user(&self, connection: &Connection) -> Result<User, DieselError> {
        get(connection, &self.user)
    }

    pub fn allowed(
        &self,
        permission: Permission,
        connection: &Connection,
    ) -> Result<bool, DieselError> {
        self.user(connection)?.allowed(permission, connection)
    }
}

/// Builds the cookie carrying a session id.
pub fn session_cookie(settings: &config::Settings, id: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, id.to_owned())
        .path("/")
        .http_only(true)
        .secure(settings.cookie.secure)
        .max_age(time::Duration::days(30))
        .finish();
    if let Some(domain) = &settings.cookie.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Builds a cookie that makes the browser forget its session.
pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .max_age(time::Duration::zero())
        .finish()
}

/// Looks up the session named by the request's cookie and puts it in the state.
#[derive(Clone, NewMiddleware)]
pub struct SessionMiddleware;

impl Middleware for SessionMiddleware {
    fn call<C>(self, mut state: State, chain: C) -> Box<HandlerFuture>
    where
        C: FnOnce(State) -> Box<HandlerFuture>,
    {
        let put_session = |state: &mut State| -> Result<(), failure::Error> {
            let connection = DbConnection::borrow_from(&state).lock()?;
            let cookie = CookieJar::borrow_from(&state)
                .get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned());
            if let Some(id) = cookie {
                if let Some(session) = Session::from_id(&id, &connection)? {
                    std::mem::drop(connection);
                    state.put(session);
                }
            }
            Ok(())
        };
        match put_session(&mut state) {
            Ok(()) => Box::new(chain(state)),
            Err(e) => {
                log::error!("Failed to look up session: {}", e);
                let response = create_response(
                    &state,
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    mime::TEXT_PLAIN,
                    e.to_string(),
                );
                Box::new(future::ok((state, response)))
            }
        }
    }
}

/// Password hashing function. Inspired by [Dropbox's password storage policy][1].
///
/// First the password and salt are combined, then hashed with SHA256 to prevent DoS attacks. The
/// password is then hashed with bcrypt.
///
/// [1]: https://blogs.dropbox.com/tech/2016/09/how-dropbox-securely-stores-your-passwords/
fn hash(key: &str, salt: &[u8]) -> Result<String, BcryptError> {
    hash_with_cost(key, salt, bcrypt::DEFAULT_COST)
}

fn hash_with_cost(key: &str, salt: &[u8], cost: u32) -> Result<String, BcryptError> {
    // digest the password and salt
    let digest = Sha256::new().chain(key).chain(salt).finalize();
    // Hash the password with bcrypt (base64 encode to avoid zero-bytes).
    bcrypt::hash(base64::encode(&digest), cost)
}

fn verify(key: &str, salt: &[u8], hash: &str) -> Result<bool, BcryptError> {
    let digest = Sha256::new().chain(key).chain(salt).finalize();
    bcrypt::verify(&base64::encode(&digest), hash)
}

/// Generates a new salt of length `SALT_LEN`
fn generate_salt() -> [u8; SALT_LEN] {
    let mut bytes = [0u8; SALT_LEN];

    StdRng::from_entropy().fill(&mut bytes[..]);

    bytes
}

/// Creates a user
pub fn create(connection: &Connection, user: NewUser) -> Result<usize, failure::Error> {
    let user = user.into_user()?;
    let created = diesel::insert_into(users::table)
        .values(&user)
        .execute(connection)?;
    log::info!("Created user '{}'", user.id);
    Ok(created)
}

pub fn get(connection: &Connection, id: &str) -> Result<User, DieselError> {
    use crate::schema::users::dsl;

    dsl::users.find(id).first(connection)
}

pub fn exists(connection: &Connection, id: &str) -> Result<bool, DieselError> {
    use crate::schema::users::dsl;
    use diesel::dsl::exists;

    diesel::select(exists(dsl::users.find(id))).get_result(connection)
}

pub fn logout(connection: &Connection, session: &str) -> Result<usize, DieselError> {
    use crate::schema::sessions::dsl;

    diesel::delete(dsl::sessions.find(session)).execute(connection)
}

/// Saves profile changes of user `id`. Renaming a user carries their posts, comments and sessions
/// along.
pub fn edit_profile(
    connection: &Connection,
    id: &str,
    profile: &UserProfile,
) -> Result<usize, DieselError> {
    use crate::schema::users::dsl;

    diesel::update(dsl::users.find(id))
        .set((
            dsl::id.eq(&profile.username),
            dsl::email.eq(&profile.email),
            dsl::first_name.eq(&profile.first_name),
            dsl::last_name.eq(&profile.last_name),
        ))
        .execute(connection)
}

#[derive(Clone, Debug, Queryable, Identifiable, Insertable)]
#[table_name = "groups"]
pub struct Group {
    id: String,
    permissions: Vec<Permission>,
}

impl Group {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission) || self.permissions.contains(&Permission::All)
    }
}

/// Represents a type of moderation action that a group can be allowed to perform
#[derive(Clone, Copy, Debug, PartialEq, Eq, DbEnum)]
pub enum Permission {
    All,

    ManageCategories,
    ManageLocations,
    ModeratePosts,
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn new_user(id: &str) -> NewUser {
        NewUser {
            id: id.to_owned(),
            password: String::from("correct horse battery"),
            email: format!("{}@example.org", id),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn password_roundtrip() {
        let salt = generate_salt();
        let hashed = hash_with_cost("hunter22", &salt, 4).unwrap();
        assert!(verify("hunter22", &salt, &hashed).unwrap());
        assert!(!verify("hunter23", &salt, &hashed).unwrap());
        assert!(!verify("hunter22", &generate_salt(), &hashed).unwrap());
    }

    #[test]
    fn sessions_are_unique() {
        let a = Session::new("alice");
        let b = Session::new("alice");
        assert_ne!(a.id, b.id);
        assert!(a.expires > Utc::now().naive_utc() + Duration::days(29));
    }

    #[test]
    fn usernames() {
        assert!(validate_username("anna.k+blog@home_1-2").is_ok());
        assert!(validate_username("анна").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("slash/").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email("a@b.c").is_ok());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("me@").is_err());
        assert!(validate_email("me @example.org").is_err());
    }

    #[test]
    fn signup_validation() {
        assert!(new_user("writer").validate().is_ok());
        let mut short = new_user("writer");
        short.password = String::from("short");
        assert!(short.validate().is_err());
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = User {
            id: String::from("leo"),
            hash: String::new(),
            salt: Vec::new(),
            email: String::from("leo@example.org"),
            first_name: String::new(),
            last_name: String::new(),
            group: default_group(),
        };
        assert_eq!(user.display_name(), "leo");
        user.first_name = String::from("Leo");
        user.last_name = String::from("Tolstoy");
        assert_eq!(user.display_name(), "Leo Tolstoy");
    }

    #[test]
    fn group_permissions() {
        let moderator = Group {
            id: String::from("moderator"),
            permissions: vec![Permission::All],
        };
        let curator = Group {
            id: String::from("curator"),
            permissions: vec![Permission::ManageCategories],
        };
        let default = Group {
            id: default_group(),
            permissions: Vec::new(),
        };
        assert!(moderator.grants(Permission::ModeratePosts));
        assert!(curator.grants(Permission::ManageCategories));
        assert!(!curator.grants(Permission::ManageLocations));
        assert!(!default.grants(Permission::ManageCategories));
    }

    #[test]
    fn rename_keeps_ownership() {
        let connection = match crate::db::test_connection() {
            Some(connection) => connection,
            None => return,
        };
        create(&connection, new_user("old_name")).unwrap();
        let mut profile = UserProfile::of(&get(&connection, "old_name").unwrap());
        profile.username = String::from("new_name");
        profile.first_name = String::from("New");
        edit_profile(&connection, "old_name", &profile).unwrap();

        assert!(!exists(&connection, "old_name").unwrap());
        assert_eq!(get(&connection, "new_name").unwrap().display_name(), "New");
    }
}
