use std::sync::Arc;

use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{error, info, warn};

use crate::{
    Ctx,
    db::bill::{BillKey, BillStore},
    web::{
        Result,
        auth::{AuthUser, Employee},
        bill::{
            container::{Navigator, PendingNavigation},
            data::{EXPENSE_TYPES, NewBillData},
        },
        csrf::{gen_csrf, verify_csrf},
        error::Error,
        rate_limit::{Action, RealIp},
        routes::RoutePath,
        templates::{ActiveIcon, HtmlTemplate, NewBillTemplate, VerticalLayout},
    },
};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Submits new bills for the logged-in employee
pub struct NewBillContainer<'a> {
    navigator: &'a dyn Navigator,
    store: Arc<dyn BillStore>,
    user: &'a AuthUser,
}

impl<'a> NewBillContainer<'a> {
    pub fn new(navigator: &'a dyn Navigator, store: Arc<dyn BillStore>, user: &'a AuthUser) -> Self {
        Self {
            navigator,
            store,
            user,
        }
    }

    /// Creates the bill from its receipt, fills in the details and goes back
    /// to the bills page
    pub async fn handle_submit(&self, data: &NewBillData) -> std::result::Result<BillKey, SubmitError> {
        let valid = data.validate(&self.user.email).map_err(SubmitError::Invalid)?;
        let key = self.store.create(&valid.new_bill).await?;
        self.store.update(&key.id, &valid.update).await?;
        info!("Bill {} created for {}", key.id, self.user.email);
        self.navigator.navigate(RoutePath::Bills);
        Ok(key)
    }
}

fn form_template(csrf_token: String, error: Option<String>) -> HtmlTemplate<NewBillTemplate> {
    HtmlTemplate(NewBillTemplate {
        layout: VerticalLayout::new(ActiveIcon::Mail),
        csrf_token,
        expense_types: EXPENSE_TYPES,
        error,
    })
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(session))]
pub async fn form(session: Session, _employee: Employee) -> Result<impl IntoResponse> {
    let csrf_token = gen_csrf(&session).await.map_err(|_| Error::Internal)?;
    Ok(form_template(csrf_token, None))
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx, session, payload))]
pub async fn submit(
    RealIp(ip): RealIp,
    session: Session,
    State(ctx): State<Ctx>,
    Employee(user): Employee,
    Form(payload): Form<NewBillData>,
) -> Result<Response> {
    let mut rate_limiter = ctx.rate_limiter.lock().await;
    let allowed = rate_limiter.check(Action::SubmitBill, ip, &user.email);
    drop(rate_limiter);
    if !allowed {
        warn!("Rate limited bill submission from {} for {}", ip, user.email);
        return Err(Error::TooManyRequests);
    }

    verify_csrf(&payload.csrf_token, &session)
        .await
        .map_err(|_| Error::Unauthorized)?;

    let navigator = PendingNavigation::default();
    let container = NewBillContainer::new(&navigator, ctx.bill_store.clone(), &user);
    match container.handle_submit(&payload).await {
        Ok(_) => Ok(Redirect::to(navigator.take().unwrap_or(RoutePath::Bills).as_str()).into_response()),
        Err(SubmitError::Invalid(msg)) => Ok((
            StatusCode::BAD_REQUEST,
            form_template(payload.csrf_token.clone(), Some(msg)),
        )
            .into_response()),
        Err(SubmitError::Store(e)) => {
            error!("Error creating bill for {}: {e}", user.email);
            Err(Error::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{bill::BillStatus, memory::InMemBillStore},
        web::auth::UserType,
    };

    fn employee() -> AuthUser {
        AuthUser {
            user_type: UserType::Employee,
            email: "e@e".to_string(),
        }
    }

    fn form_data(file_url: &str) -> NewBillData {
        NewBillData {
            csrf_token: "t".to_string(),
            expense_type: "Hôtel et logement".to_string(),
            expense_name: "Hotel Lyon".to_string(),
            datepicker: "2022-06-15".to_string(),
            amount: "120.5".to_string(),
            vat: "20".to_string(),
            pct: "20".to_string(),
            commentary: String::new(),
            file_url: file_url.to_string(),
        }
    }

    #[tokio::test]
    async fn submit_stores_the_bill_and_goes_back_to_bills() {
        let store = InMemBillStore::default();
        let navigator = PendingNavigation::default();
        let user = employee();
        let container = NewBillContainer::new(&navigator, Arc::new(store.clone()), &user);

        let key = container
            .handle_submit(&form_data("https://files.test/hotel.jpeg"))
            .await
            .unwrap();

        assert_eq!(navigator.take(), Some(RoutePath::Bills));
        let bills = store.list("e@e").await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].id, key.id);
        assert_eq!(bills[0].name, "Hotel Lyon");
        assert_eq!(bills[0].date, "2022-06-15");
        assert_eq!(bills[0].file_name, "hotel.jpeg");
        assert_eq!(bills[0].status, BillStatus::Pending);
    }

    #[tokio::test]
    async fn invalid_submit_stores_nothing_and_stays() {
        let store = InMemBillStore::default();
        let navigator = PendingNavigation::default();
        let user = employee();
        let container = NewBillContainer::new(&navigator, Arc::new(store.clone()), &user);

        let err = container
            .handle_submit(&form_data("https://files.test/hotel.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Invalid(_)));
        assert_eq!(navigator.take(), None);
        assert!(store.list("e@e").await.unwrap().is_empty());
    }
}
