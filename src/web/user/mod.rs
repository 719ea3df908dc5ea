use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{error, warn};

mod data;

use crate::{
    Ctx,
    web::{
        Result, USER_KEY,
        auth::{Auth, AuthUser, UserType},
        csrf::{gen_csrf, verify_csrf},
        error::Error,
        rate_limit::{Action, RealIp},
        routes::RoutePath,
        templates::{HtmlTemplate, LoginTemplate},
        user::data::LoginData,
    },
};

const INVALID_EMAIL: &str = "Adresse email invalide";

#[tracing::instrument(level = tracing::Level::DEBUG, skip(auth, session))]
pub async fn login(session: Session, auth: Auth) -> Result<impl IntoResponse> {
    if let Auth(Some(_)) = auth {
        return Ok(Redirect::to(RoutePath::Bills.as_str()).into_response());
    }
    let template = LoginTemplate {
        csrf_token: gen_csrf(&session).await.map_err(|_| Error::Internal)?,
        error: None,
    };
    Ok(HtmlTemplate(template).into_response())
}

/// Records the employee in the session. Credentials are verified upstream.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx, session, payload))]
pub async fn do_login(
    RealIp(ip): RealIp,
    session: Session,
    State(ctx): State<Ctx>,
    Form(payload): Form<LoginData>,
) -> Result<Response> {
    let mut rate_limiter = ctx.rate_limiter.lock().await;
    let allowed = rate_limiter.check(Action::Login, ip, &payload.email);
    drop(rate_limiter);
    if !allowed {
        warn!("Rate limited login from {} for {}", ip, payload.email);
        return Err(Error::TooManyRequests);
    }

    verify_csrf(&payload.csrf_token, &session)
        .await
        .map_err(|_| Error::Unauthorized)?;
    if !payload.validate() {
        let template = LoginTemplate {
            csrf_token: payload.csrf_token,
            error: Some(INVALID_EMAIL.to_string()),
        };
        return Ok((StatusCode::BAD_REQUEST, HtmlTemplate(template)).into_response());
    }

    session.cycle_id().await.map_err(|e| {
        error!("Error renewing session id: {e}");
        Error::Internal
    })?;
    session
        .insert(
            USER_KEY,
            AuthUser {
                user_type: UserType::Employee,
                email: payload.email.trim().to_string(),
            },
        )
        .await
        .map_err(|e| {
            error!("Error putting user in session: {e}");
            Error::Internal
        })?;

    Ok(Redirect::to(RoutePath::Bills.as_str()).into_response())
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(session))]
pub async fn logout(session: Session) -> Result<impl IntoResponse> {
    session.delete().await.map_err(|e| {
        error!("Error logging out: {e}");
        Error::Internal
    })?;
    Ok(Redirect::to(RoutePath::Login.as_str()))
}
