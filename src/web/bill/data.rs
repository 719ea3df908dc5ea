use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::bill::{BillStatus, BillUpdate, DEFAULT_PCT, NewBill};

pub const EXPENSE_TYPES: &[&str] = &[
    "Transports",
    "Restaurants et bars",
    "Hôtel et logement",
    "Services en ligne",
    "IT et électronique",
    "Equipement et matériel",
    "Fournitures de bureau",
];

const RECEIPT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const MAX_NAME_LEN: usize = 100;
const MAX_COMMENTARY_LEN: usize = 1000;

/// The new bill form as posted
#[derive(Debug, Clone, Deserialize)]
pub struct NewBillData {
    pub csrf_token: String,
    pub expense_type: String,
    pub expense_name: String,
    pub datepicker: String,
    pub amount: String,
    #[serde(default)]
    pub vat: String,
    #[serde(default)]
    pub pct: String,
    #[serde(default)]
    pub commentary: String,
    pub file_url: String,
}

/// A validated form, split into the two store calls that persist it
#[derive(Debug, Clone)]
pub struct ValidBill {
    pub new_bill: NewBill,
    pub update: BillUpdate,
}

impl NewBillData {
    pub fn validate(&self, email: &str) -> Result<ValidBill, String> {
        if !EXPENSE_TYPES.contains(&self.expense_type.as_str()) {
            return Err("Type de dépense inconnu".to_string());
        }

        let name = self.expense_name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err("Nom de la dépense invalide".to_string());
        }

        let date = NaiveDate::parse_from_str(self.datepicker.trim(), "%Y-%m-%d")
            .map_err(|_| "Date invalide".to_string())?;

        let amount: f64 = self
            .amount
            .trim()
            .parse()
            .map_err(|_| "Montant invalide".to_string())?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err("Montant invalide".to_string());
        }

        let vat = self.vat.trim();
        if !vat.is_empty() && !vat.parse::<f64>().is_ok_and(|v| v.is_finite() && v >= 0.0) {
            return Err("TVA invalide".to_string());
        }

        let pct = match self.pct.trim() {
            "" => DEFAULT_PCT,
            pct => pct
                .parse::<i32>()
                .ok()
                .filter(|p| (0..=100).contains(p))
                .ok_or_else(|| "Pourcentage de TVA invalide".to_string())?,
        };

        if self.commentary.chars().count() > MAX_COMMENTARY_LEN {
            return Err("Commentaire trop long".to_string());
        }

        let (file_url, file_name) = parse_receipt(&self.file_url)?;

        Ok(ValidBill {
            new_bill: NewBill {
                email: email.to_owned(),
                file_url,
                file_name,
            },
            update: BillUpdate {
                expense_type: self.expense_type.clone(),
                name: name.to_owned(),
                amount,
                date: date.format("%Y-%m-%d").to_string(),
                vat: vat.to_owned(),
                pct,
                commentary: self.commentary.trim().to_owned(),
                status: BillStatus::Pending,
            },
        })
    }
}

/// The receipt has to be a http(s) link to a jpg, jpeg or png image
fn parse_receipt(raw: &str) -> Result<(String, String), String> {
    let invalid = || "Le justificatif doit être une image jpg, jpeg ou png".to_string();
    let url = url::Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .ok_or_else(invalid)?
        .to_owned();
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or_else(invalid)?;
    if !RECEIPT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid());
    }
    Ok((url.to_string(), file_name))
}
