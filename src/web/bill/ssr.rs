use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::error;

use crate::{
    Ctx,
    web::{
        Result,
        auth::{AuthUser, Employee},
        bill::{
            container::{BillsContainer, IconEye, ModalSlot, ModalPresenter, Navigator, PendingNavigation},
            view::{BillsPage, render_bills},
        },
        error::Error,
        routes::RoutePath,
    },
};

fn container<'a>(
    ctx: &Ctx,
    navigator: &'a dyn Navigator,
    user: &'a AuthUser,
    modal: &'a dyn ModalPresenter,
) -> BillsContainer<'a> {
    BillsContainer::new(
        navigator,
        Some(ctx.bill_store.clone()),
        user,
        modal,
        ctx.config.modal_width,
    )
}

fn render_page(status: StatusCode, page: &BillsPage) -> Result<Response> {
    let html = render_bills(page).map_err(|e| {
        error!("Error rendering bills page: {e}");
        Error::Internal
    })?;
    Ok((status, Html(html)).into_response())
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx))]
pub async fn list(State(ctx): State<Ctx>, Employee(user): Employee) -> Result<Response> {
    let (navigator, modal) = (PendingNavigation::default(), ModalSlot::default());
    let bills = container(&ctx, &navigator, &user, &modal).fetch_bills().await;
    match bills {
        Ok(bills) => render_page(StatusCode::OK, &BillsPage::with_bills(bills)),
        Err(e) => {
            error!("Error fetching bills for {}: {e}", user.email);
            render_page(e.status_code(), &BillsPage::error(e.to_string()))
        }
    }
}

/// The bills page with the receipt of bill `id` opened in the modal
#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx))]
pub async fn receipt(
    State(ctx): State<Ctx>,
    Employee(user): Employee,
    Path(id): Path<String>,
) -> Result<Response> {
    let (navigator, modal) = (PendingNavigation::default(), ModalSlot::default());
    let container = container(&ctx, &navigator, &user, &modal);
    let bills = match container.fetch_bills().await {
        Ok(bills) => bills,
        Err(e) => {
            error!("Error fetching bills for {}: {e}", user.email);
            return render_page(e.status_code(), &BillsPage::error(e.to_string()));
        }
    };

    let icon = bills
        .iter()
        .find(|b| b.id == id)
        .map(|b| IconEye {
            bill_url: b.bill_url.clone(),
        })
        .ok_or_else(|| Error::NotFound("bill not found".to_string()))?;
    container.handle_click_icon_eye(&icon);

    render_page(
        StatusCode::OK,
        &BillsPage::with_bills(bills).with_modal(modal.take()),
    )
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx))]
pub async fn new_bill(State(ctx): State<Ctx>, Employee(user): Employee) -> Redirect {
    let (navigator, modal) = (PendingNavigation::default(), ModalSlot::default());
    container(&ctx, &navigator, &user, &modal).handle_click_new_bill();
    Redirect::to(navigator.take().unwrap_or(RoutePath::Bills).as_str())
}
