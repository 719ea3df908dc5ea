use rand::{Rng, distr::Alphanumeric};
use tower_sessions::Session;

use crate::web::CSRF_TOKEN;

const TOKEN_LEN: usize = 42;

fn gen_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Returns the form token of the session, creating it on first use
pub async fn gen_csrf(session: &Session) -> Result<String, anyhow::Error> {
    if let Some(session_token) = session.get::<String>(CSRF_TOKEN).await? {
        Ok(session_token)
    } else {
        let token = gen_token();
        session.insert(CSRF_TOKEN, &token).await?;
        Ok(token)
    }
}

pub async fn verify_csrf(csrf_token: &str, session: &Session) -> Result<(), anyhow::Error> {
    match session.get::<String>(CSRF_TOKEN).await? {
        Some(session_token) if !csrf_token.is_empty() && csrf_token == session_token => Ok(()),
        _ => Err(anyhow::anyhow!("invalid csrf")),
    }
}
