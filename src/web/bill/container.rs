use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

use crate::{
    db::{ApiError, bill::BillStore},
    web::{
        auth::AuthUser,
        bill::view::{BillView, ModalContent, sort_latest_first},
        routes::RoutePath,
    },
};

/// Moves the user to another page
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: RoutePath);
}

/// Shows content in a modal dialog
pub trait ModalPresenter: Send + Sync {
    fn open(&self, content: ModalContent);
}

/// The eye icon of a bill row, as clicked by the user
#[derive(Debug, Clone)]
pub struct IconEye {
    pub bill_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Server(String),
}

impl FetchError {
    /// Stores only guarantee a readable message, so the kind is derived from it.
    /// Messages that aren't meant for the user are replaced.
    pub fn from_store(e: anyhow::Error) -> Self {
        if let Some(api_error) = e.downcast_ref::<ApiError>() {
            return match api_error {
                ApiError::NotFound => FetchError::NotFound(api_error.to_string()),
                ApiError::Server => FetchError::Server(api_error.to_string()),
            };
        }
        let msg = e.to_string();
        let user_facing = msg.starts_with("Erreur");
        if msg.contains("404") {
            FetchError::NotFound(if user_facing {
                msg
            } else {
                ApiError::NotFound.to_string()
            })
        } else if user_facing {
            FetchError::Server(msg)
        } else {
            error!("Bill store failure: {e:#}");
            FetchError::Server(ApiError::Server.to_string())
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FetchError::NotFound(_) => StatusCode::NOT_FOUND,
            FetchError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Drives the bills page for the logged-in employee.
pub struct BillsContainer<'a> {
    navigator: &'a dyn Navigator,
    store: Option<Arc<dyn BillStore>>,
    user: &'a AuthUser,
    modal: &'a dyn ModalPresenter,
    modal_width: u32,
}

impl<'a> BillsContainer<'a> {
    pub fn new(
        navigator: &'a dyn Navigator,
        store: Option<Arc<dyn BillStore>>,
        user: &'a AuthUser,
        modal: &'a dyn ModalPresenter,
        modal_width: u32,
    ) -> Self {
        Self {
            navigator,
            store,
            user,
            modal,
            modal_width,
        }
    }

    /// The user's bills, latest first. Without a store there is nothing to list.
    pub async fn fetch_bills(&self) -> Result<Vec<BillView>, FetchError> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        let records = store
            .list(&self.user.email)
            .await
            .map_err(FetchError::from_store)?;

        let mut bills: Vec<BillView> = records.iter().map(BillView::formatted).collect();
        sort_latest_first(&mut bills);
        Ok(bills)
    }

    pub fn handle_click_icon_eye(&self, icon: &IconEye) {
        self.modal
            .open(ModalContent::receipt(&icon.bill_url, self.modal_width));
    }

    pub fn handle_click_new_bill(&self) {
        self.navigator.navigate(RoutePath::NewBill);
    }
}

/// Remembers where a handler navigated to, so it can be turned into a redirect
#[derive(Debug, Default)]
pub struct PendingNavigation(Mutex<Option<RoutePath>>);

impl PendingNavigation {
    pub fn take(&self) -> Option<RoutePath> {
        self.0.lock().ok().and_then(|mut path| path.take())
    }
}

impl Navigator for PendingNavigation {
    fn navigate(&self, path: RoutePath) {
        if let Ok(mut pending) = self.0.lock() {
            *pending = Some(path);
        }
    }
}

/// Holds the opened modal until the page is rendered
#[derive(Debug, Default)]
pub struct ModalSlot(Mutex<Option<ModalContent>>);

impl ModalSlot {
    pub fn take(&self) -> Option<ModalContent> {
        self.0.lock().ok().and_then(|mut content| content.take())
    }
}

impl ModalPresenter for ModalSlot {
    fn open(&self, content: ModalContent) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(content);
        }
    }
}
