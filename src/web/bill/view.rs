//! Display side of the bills page: view model entries, their formatting and
//! the page renderer.

use std::cmp::Ordering;

use askama::Template;
use chrono::{Datelike, NaiveDate};

use crate::{
    db::bill::{Bill, BillStatus},
    web::templates::{ActiveIcon, BillsTemplate, ErrorPageTemplate, VerticalLayout},
};

pub const RECEIPT_MODAL_TITLE: &str = "Justificatif";

const MONTHS: [&str; 12] = [
    "Jan", "Fév", "Mar", "Avr", "Mai", "Jui", "Jui", "Aoû", "Sep", "Oct", "Nov", "Déc",
];

/// One row of the bills table.
#[derive(Debug, Clone, PartialEq)]
pub struct BillView {
    pub id: String,
    pub expense_type: String,
    pub name: String,
    /// What is displayed in the date column
    pub date: String,
    /// The stored date, used for ordering
    pub raw_date: String,
    pub amount: String,
    pub status: String,
    pub bill_url: String,
}

impl BillView {
    /// Row showing the record exactly as stored
    pub fn raw(bill: &Bill) -> Self {
        Self {
            id: bill.id.clone(),
            expense_type: bill.expense_type.clone(),
            name: bill.name.clone(),
            date: bill.date.clone(),
            raw_date: bill.date.clone(),
            amount: format_amount(bill.amount),
            status: bill.status.to_string(),
            bill_url: bill.file_url.clone(),
        }
    }

    /// Row with a localized date and status label. A date that can't be
    /// parsed is shown as stored.
    pub fn formatted(bill: &Bill) -> Self {
        let date = match format_date(&bill.date) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Could not format date {:?} of bill {}: {e}", bill.date, bill.id);
                bill.date.clone()
            }
        };
        Self {
            date,
            status: format_status(bill.status).to_string(),
            ..Self::raw(bill)
        }
    }
}

/// `2004-04-04` -> `4 Avr. 04`
pub fn format_date(raw: &str) -> Result<String, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
    Ok(format!(
        "{} {}. {:02}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year().rem_euclid(100)
    ))
}

pub fn format_status(status: BillStatus) -> &'static str {
    match status {
        BillStatus::Pending => "En attente",
        BillStatus::Accepted => "Accepté",
        BillStatus::Refused => "Refusé",
    }
}

fn format_amount(amount: f64) -> String {
    format!("{amount} €")
}

/// Descending order on stored dates. Calendar dates compare as dates and come
/// before anything unparseable, which falls back to descending string order.
pub fn latest_first(a: &str, b: &str) -> Ordering {
    let key = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    (key(b), b).cmp(&(key(a), a))
}

pub fn sort_latest_first(bills: &mut [BillView]) {
    bills.sort_by(|a, b| latest_first(&a.raw_date, &b.raw_date));
}

/// Content of the receipt preview dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalContent {
    pub title: &'static str,
    pub image_url: String,
    pub image_width: u32,
    pub modal_width: u32,
}

impl ModalContent {
    /// The image takes half of the dialog width
    pub fn receipt(image_url: &str, modal_width: u32) -> Self {
        Self {
            title: RECEIPT_MODAL_TITLE,
            image_url: image_url.to_owned(),
            image_width: modal_width / 2,
            modal_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BillsState {
    Error(String),
    Bills(Vec<BillView>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillsPage {
    pub state: BillsState,
    pub modal: Option<ModalContent>,
}

impl BillsPage {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            state: BillsState::Error(msg.into()),
            modal: None,
        }
    }

    /// Rows are rendered in the given order
    pub fn with_bills(bills: Vec<BillView>) -> Self {
        Self {
            state: BillsState::Bills(bills),
            modal: None,
        }
    }

    pub fn with_modal(mut self, modal: Option<ModalContent>) -> Self {
        self.modal = modal;
        self
    }
}

/// Renders the bills page. Has no side effects.
pub fn render_bills(page: &BillsPage) -> askama::Result<String> {
    let layout = VerticalLayout::new(ActiveIcon::Window);
    match &page.state {
        BillsState::Error(error) => ErrorPageTemplate { layout, error }.render(),
        BillsState::Bills(bills) => BillsTemplate {
            layout,
            bills,
            modal: page.modal.as_ref(),
        }
        .render(),
    }
}
