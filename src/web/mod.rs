use axum::{
    Router,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_sessions::{
    Expiry, SessionManagerLayer,
    cookie::{SameSite, time::Duration},
};

use crate::{Config, Ctx};

pub mod auth;
mod bill;
mod csrf;
mod error;
pub mod rate_limit;
pub mod routes;
pub mod session;
mod templates;
mod user;

pub type Result<T> = std::result::Result<T, error::Error>;

pub const SESSION_EXPIRATION_SEC: i64 = 60 * 30; // 30 min
pub const CSRF_TOKEN: &str = "csrf_token";
/// Session key of the logged-in user
pub const USER_KEY: &str = "user";

pub fn router(ctx: Ctx, cfg: &Config) -> Router {
    let sessions = SessionManagerLayer::new(ctx.session_store.clone())
        .with_secure(cfg.cookie_secure)
        .with_domain(cfg.domain.clone())
        .with_same_site(SameSite::Strict)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_EXPIRATION_SEC,
        )))
        .with_http_only(true);

    let web = Router::new()
        .nest_service(
            "/static",
            ServeDir::new(format!("{}/static", env!("CARGO_MANIFEST_DIR"))),
        )
        .route("/health", get(health))
        .route("/", get(user::login))
        .route("/login", post(user::do_login))
        .route("/logout", get(user::logout))
        .route("/employee/bills", get(bill::ssr::list))
        .route("/employee/bills/new-bill", get(bill::ssr::new_bill))
        .route("/employee/bills/{id}/justificatif", get(bill::ssr::receipt))
        .route(
            "/employee/bill/new",
            get(bill::new_bill::form).post(bill::new_bill::submit),
        )
        .layer(sessions);
    Router::new().merge(web).with_state(ctx)
}

async fn health() -> Result<&'static str> {
    Ok("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            bill::{Bill, BillKey, BillStore, BillUpdate, NewBill},
            memory::InMemBillStore,
        },
        tests::test_config,
    };
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use http_body_util::BodyExt;
    use regex::Regex;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FailingStore(&'static str);

    #[async_trait]
    impl BillStore for FailingStore {
        async fn list(&self, _email: &str) -> std::result::Result<Vec<Bill>, anyhow::Error> {
            Err(anyhow!(self.0))
        }
        async fn create(&self, _new_bill: &NewBill) -> std::result::Result<BillKey, anyhow::Error> {
            Err(anyhow!(self.0))
        }
        async fn update(
            &self,
            _id: &str,
            _update: &BillUpdate,
        ) -> std::result::Result<Bill, anyhow::Error> {
            Err(anyhow!(self.0))
        }
    }

    async fn app_with(store: Arc<dyn BillStore>) -> Router {
        let cfg = test_config();
        router(Ctx::with_store(&cfg, store), &cfg)
    }

    async fn app() -> (Router, InMemBillStore) {
        let store = InMemBillStore::from_fixtures(test_config().fixtures_path())
            .await
            .unwrap();
        (app_with(Arc::new(store.clone())).await, store)
    }

    async fn body_string(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn session_cookie(resp: &Response) -> Option<String> {
        resp.headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_owned)
    }

    fn csrf_token(html: &str) -> String {
        let re = Regex::new(r#"name="csrf_token" value="([A-Za-z0-9]+)""#).unwrap();
        re.captures(html).unwrap()[1].to_string()
    }

    fn location(resp: &Response) -> &str {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
    }

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_form(app: &Router, uri: &str, cookie: &str, form: &str) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::from(form.to_owned()))
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    /// Logs in as the fixture employee, returns the session cookie and a form token
    async fn login(app: &Router) -> (String, String) {
        let resp = get(app, "/", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = session_cookie(&resp).unwrap();
        let token = csrf_token(&body_string(resp).await);

        let resp = post_form(app, "/login", &cookie, &format!("csrf_token={token}&email=a%40a")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/employee/bills");
        let cookie = session_cookie(&resp).unwrap_or(cookie);
        (cookie, token)
    }

    #[tokio::test]
    async fn health() {
        let (app, _) = app().await;
        let resp = get(&app, "/health", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "OK");
    }

    #[tokio::test]
    async fn bills_page_requires_login() {
        let (app, _) = app().await;
        let resp = get(&app, "/employee/bills", None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
    }

    #[tokio::test]
    async fn login_without_csrf_token_is_rejected() {
        let (app, _) = app().await;
        let resp = get(&app, "/", None).await;
        let cookie = session_cookie(&resp).unwrap();
        let resp = post_form(&app, "/login", &cookie, "csrf_token=forged&email=a%40a").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_email_rerenders_the_login_page() {
        let (app, _) = app().await;
        let resp = get(&app, "/", None).await;
        let cookie = session_cookie(&resp).unwrap();
        let token = csrf_token(&body_string(resp).await);

        let resp = post_form(&app, "/login", &cookie, &format!("csrf_token={token}&email=nobody")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let html = body_string(resp).await;
        assert!(html.contains(r#"data-testid="login-error">Adresse email invalide<"#));
        assert_eq!(csrf_token(&html), token);

        let resp = get(&app, "/employee/bills", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
    }

    #[tokio::test]
    async fn repeated_logins_for_one_email_are_throttled() {
        let (app, _) = app().await;
        let resp = get(&app, "/", None).await;
        let cookie = session_cookie(&resp).unwrap();
        for _ in 0..10 {
            let resp = post_form(&app, "/login", &cookie, "csrf_token=forged&email=a%40a").await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        let resp = post_form(&app, "/login", &cookie, "csrf_token=forged&email=a%40a").await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let resp = post_form(&app, "/login", &cookie, "csrf_token=forged&email=b%40b").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bills_page_lists_the_employees_bills() {
        let (app, _) = app().await;
        let (cookie, _) = login(&app).await;

        let resp = get(&app, "/employee/bills", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_string(resp).await;
        assert!(html.contains("Mes notes de frais"));
        assert!(html.contains(r#"data-testid="icon-window" class="active-icon""#));
        assert_eq!(html.matches(r#"data-testid="icon-eye""#).count(), 4);
        assert!(html.contains("En attente"));
        assert!(html.contains("Accepté"));
        let first = html.find("4 Avr. 04").unwrap();
        let last = html.find("1 Jan. 01").unwrap();
        assert!(first < last);
    }

    #[tokio::test]
    async fn eye_icon_opens_the_receipt() {
        let (app, _) = app().await;
        let (cookie, _) = login(&app).await;

        let resp = get(&app, "/employee/bills/47qAXb6fIm2zOKkLzMro/justificatif", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_string(resp).await;
        assert!(html.contains(r#"id="modaleFileTitle">Justificatif<"#));
        assert!(html.contains(r#"id="modaleFile""#));
        assert!(html.contains(r#"width="400""#));

        let resp = get(&app, "/employee/bills/unknown/justificatif", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn new_bill_button_leads_to_the_form() {
        let (app, _) = app().await;
        let (cookie, _) = login(&app).await;

        let resp = get(&app, "/employee/bills/new-bill", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/employee/bill/new");

        let resp = get(&app, "/employee/bill/new", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_string(resp).await;
        assert!(html.contains("Envoyer une note de frais"));
        assert!(html.contains(r#"data-testid="icon-mail" class="active-icon""#));
    }

    #[tokio::test]
    async fn submitting_a_new_bill() {
        let (app, store) = app().await;
        let (cookie, token) = login(&app).await;

        let form = format!(
            "csrf_token={token}&expense_type=Transports&expense_name=Train&datepicker=2021-03-01\
             &amount=54&vat=9&pct=20&commentary=&file_url=https%3A%2F%2Ffiles.test%2Ftrain.png"
        );
        let resp = post_form(&app, "/employee/bill/new", &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/employee/bills");

        let bills = store.list("a@a").await.unwrap();
        assert_eq!(bills.len(), 5);
        assert!(bills.iter().any(|b| b.name == "Train" && b.file_name == "train.png"));

        let html = body_string(get(&app, "/employee/bills", Some(&cookie)).await).await;
        assert!(html.find("1 Mar. 21").unwrap() < html.find("4 Avr. 04").unwrap());
    }

    #[tokio::test]
    async fn invalid_new_bill_rerenders_the_form() {
        let (app, store) = app().await;
        let (cookie, token) = login(&app).await;

        let form = format!(
            "csrf_token={token}&expense_type=Transports&expense_name=Train&datepicker=2021-03-01\
             &amount=54&file_url=https%3A%2F%2Ffiles.test%2Ftrain.pdf"
        );
        let resp = post_form(&app, "/employee/bill/new", &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let html = body_string(resp).await;
        assert!(html.contains("Envoyer une note de frais"));
        assert!(html.contains("jpg, jpeg ou png"));
        assert_eq!(store.list("a@a").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn api_errors_are_rendered() {
        for (msg, status) in [
            ("Erreur 404", StatusCode::NOT_FOUND),
            ("Erreur 500", StatusCode::INTERNAL_SERVER_ERROR),
        ] {
            let app = app_with(Arc::new(FailingStore(msg))).await;
            let (cookie, _) = login(&app).await;

            let resp = get(&app, "/employee/bills", Some(&cookie)).await;
            assert_eq!(resp.status(), status);
            let html = body_string(resp).await;
            assert!(html.contains(msg));
            assert!(html.contains(r#"data-testid="error-message""#));
        }
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let (app, _) = app().await;
        let (cookie, _) = login(&app).await;

        let resp = get(&app, "/logout", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let resp = get(&app, "/employee/bills", Some(&cookie)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
    }
}
