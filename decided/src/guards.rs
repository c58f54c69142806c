use crate::api::ApiError;
use anyhow::Context;
use decide::{Error, Identity};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use std::collections::HashMap;

/// Token to identity directory
///
/// Loaded from a JSON array of `{"token", "id", "username", "is_admin"}` records.
#[derive(Default)]
pub struct Users {
    by_token: HashMap<String, Identity>,
}

#[derive(Deserialize)]
struct UserRecord {
    token: String,
    #[serde(flatten)]
    identity: Identity,
}

impl Users {
    /// Load the directory, or an empty one if no path is configured
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path,
            None => return Ok(Users::default()),
        };

        let contents =
            std::fs::read_to_string(path).with_context(|| format!("unable to read {}", path))?;
        let records: Vec<UserRecord> =
            serde_json::from_str(&contents).with_context(|| format!("invalid users file {}", path))?;

        Ok(records
            .into_iter()
            .fold(Users::default(), |users, r| users.with(r.token, r.identity)))
    }

    pub fn with(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.by_token.insert(token.into(), identity);
        self
    }

    pub fn lookup(&self, token: &str) -> Option<&Identity> {
        self.by_token.get(token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }
}

/// `Authorization: Token <t>` or `Authorization: Bearer <t>`
fn token_from_header(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    match scheme {
        "Token" | "Bearer" if !token.trim().is_empty() => Some(token.trim()),
        _ => None,
    }
}

/// The authenticated caller of a request
pub struct Caller(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let unauthorized = || Outcome::Error((Status::Unauthorized, ApiError(Error::Unauthorized)));

        let token = match req.headers().get_one("Authorization").and_then(token_from_header) {
            Some(token) => token,
            None => return unauthorized(),
        };
        let users = match req.rocket().state::<Users>() {
            Some(users) => users,
            None => return unauthorized(),
        };

        match users.lookup(token) {
            Some(identity) => Outcome::Success(Caller(identity.clone())),
            None => unauthorized(),
        }
    }
}
