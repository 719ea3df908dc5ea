use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::error;

use crate::web::{USER_KEY, error::Error, routes::RoutePath};

/// Only employees use this application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserType {
    Employee,
}

/// The user recorded in the session at login
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub email: String,
}

/// The session user, if any
#[derive(Clone, Debug)]
pub struct Auth(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| {
                error!("Session layer missing: {msg}");
                Error::Internal
            })?;
        let user = session.get::<AuthUser>(USER_KEY).await.map_err(|e| {
            error!("Error reading user from session: {e}");
            Error::Internal
        })?;
        Ok(Auth(user))
    }
}

/// A logged-in employee. Anyone else is sent back to the login page.
#[derive(Clone, Debug)]
pub struct Employee(pub AuthUser);

impl<S> FromRequestParts<S> for Employee
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(Some(user))) => Ok(Employee(user)),
            Ok(Auth(None)) => Err(Redirect::to(RoutePath::Login.as_str()).into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}
