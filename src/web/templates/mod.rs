use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::web::bill::view::{BillView, ModalContent};

use super::error::Error;

pub struct HtmlTemplate<T>(pub T);

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub error: String,
}

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!("Error rendering template: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error rendering template",
                )
                    .into_response()
            }
        }
    }
}

/// Which icon of the vertical navigation is highlighted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveIcon {
    Window,
    Mail,
}

#[derive(Clone, Copy, Debug)]
pub struct VerticalLayout {
    pub active: ActiveIcon,
}

impl VerticalLayout {
    pub fn new(active: ActiveIcon) -> Self {
        Self { active }
    }

    pub fn window_class(&self) -> &'static str {
        if self.active == ActiveIcon::Window {
            "active-icon"
        } else {
            ""
        }
    }

    pub fn mail_class(&self) -> &'static str {
        if self.active == ActiveIcon::Mail {
            "active-icon"
        } else {
            ""
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub csrf_token: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "bills.html")]
pub struct BillsTemplate<'a> {
    pub layout: VerticalLayout,
    pub bills: &'a [BillView],
    pub modal: Option<&'a ModalContent>,
}

#[derive(Template)]
#[template(path = "error_page.html")]
pub struct ErrorPageTemplate<'a> {
    pub layout: VerticalLayout,
    pub error: &'a str,
}

#[derive(Template)]
#[template(path = "new_bill.html")]
pub struct NewBillTemplate {
    pub layout: VerticalLayout,
    pub csrf_token: String,
    pub expense_types: &'static [&'static str],
    pub error: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let response = match self {
            Error::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Internal Server Error"),
            ),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, String::from("Unauthorized")),
            Error::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                String::from("Please try again later"),
            ),
        };

        (
            response.0,
            HtmlTemplate(ErrorTemplate { error: response.1 }),
        )
            .into_response()
    }
}
