use std::{fmt, str::FromStr};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::db::{ApiError, PostgresStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Accepted,
    Refused,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "pending",
            BillStatus::Accepted => "accepted",
            BillStatus::Refused => "refused",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BillStatus::Pending),
            "accepted" => Ok(BillStatus::Accepted),
            "refused" => Ok(BillStatus::Refused),
            other => Err(anyhow!("unknown bill status: {other}")),
        }
    }
}

/// A bill as the store hands it out.
///
/// `date` is kept exactly as stored, it is only parsed when formatted for
/// display, so a malformed value never prevents the record from loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub email: String,
    #[serde(rename = "type", default)]
    pub expense_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub vat: String,
    #[serde(default = "default_pct")]
    pub pct: i32,
    #[serde(default)]
    pub commentary: String,
    pub status: BillStatus,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub file_name: String,
}

pub const DEFAULT_PCT: i32 = 20;

fn default_pct() -> i32 {
    DEFAULT_PCT
}

/// First step of a bill creation: the receipt reference, owned by `email`
#[derive(Clone, Debug)]
pub struct NewBill {
    pub email: String,
    pub file_url: String,
    pub file_name: String,
}

/// Identifies a freshly created bill
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BillKey {
    pub id: String,
    pub file_url: String,
}

/// The details filled in on the new bill form
#[derive(Clone, Debug)]
pub struct BillUpdate {
    pub expense_type: String,
    pub name: String,
    pub amount: f64,
    pub date: String,
    pub vat: String,
    pub pct: i32,
    pub commentary: String,
    pub status: BillStatus,
}

impl Bill {
    pub fn from_new(id: String, new_bill: &NewBill) -> Self {
        Self {
            id,
            email: new_bill.email.clone(),
            expense_type: String::new(),
            name: String::new(),
            amount: 0.0,
            date: String::new(),
            vat: String::new(),
            pct: DEFAULT_PCT,
            commentary: String::new(),
            status: BillStatus::Pending,
            file_url: new_bill.file_url.clone(),
            file_name: new_bill.file_name.clone(),
        }
    }

    pub fn apply(&mut self, update: &BillUpdate) {
        self.expense_type = update.expense_type.clone();
        self.name = update.name.clone();
        self.amount = update.amount;
        self.date = update.date.clone();
        self.vat = update.vat.clone();
        self.pct = update.pct;
        self.commentary = update.commentary.clone();
        self.status = update.status;
    }
}

pub fn new_bill_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
pub trait BillStore: Send + Sync {
    /// All bills owned by `email`
    async fn list(&self, email: &str) -> Result<Vec<Bill>, anyhow::Error>;
    async fn create(&self, new_bill: &NewBill) -> Result<BillKey, anyhow::Error>;
    async fn update(&self, id: &str, update: &BillUpdate) -> Result<Bill, anyhow::Error>;
}

const BILL_COLUMNS: &str = "id, email, expense_type, name, amount, date, vat, pct, commentary, status, file_url, file_name";

#[async_trait]
impl BillStore for PostgresStore {
    async fn list(&self, email: &str) -> Result<Vec<Bill>, anyhow::Error> {
        let rows = self
            .pool
            .get()
            .await?
            .query(
                format!("SELECT {BILL_COLUMNS} FROM bills WHERE email = $1 ORDER BY date DESC")
                    .as_str(),
                &[&email],
            )
            .await?;

        rows.iter().map(row_to_bill).collect()
    }

    async fn create(&self, new_bill: &NewBill) -> Result<BillKey, anyhow::Error> {
        let id = new_bill_id();
        self.pool
            .get()
            .await?
            .execute(
                r#"INSERT INTO bills
                        (id, email, status, file_url, file_name)
                    VALUES
                        ($1, $2, $3, $4, $5)
                "#,
                &[
                    &id,
                    &new_bill.email,
                    &BillStatus::Pending.as_str(),
                    &new_bill.file_url,
                    &new_bill.file_name,
                ],
            )
            .await?;
        Ok(BillKey {
            id,
            file_url: new_bill.file_url.clone(),
        })
    }

    async fn update(&self, id: &str, update: &BillUpdate) -> Result<Bill, anyhow::Error> {
        let row = self
            .pool
            .get()
            .await?
            .query_opt(
                format!(
                    r#"UPDATE bills SET
                        expense_type = $2, name = $3, amount = $4, date = $5,
                        vat = $6, pct = $7, commentary = $8, status = $9
                    WHERE id = $1
                    RETURNING {BILL_COLUMNS}"#
                )
                .as_str(),
                &[
                    &id,
                    &update.expense_type,
                    &update.name,
                    &update.amount,
                    &update.date,
                    &update.vat,
                    &update.pct,
                    &update.commentary,
                    &update.status.as_str(),
                ],
            )
            .await?;

        match row {
            Some(row) => row_to_bill(&row),
            None => Err(ApiError::NotFound.into()),
        }
    }
}

fn row_to_bill(row: &Row) -> Result<Bill, anyhow::Error> {
    Ok(Bill {
        id: row.get(0),
        email: row.get(1),
        expense_type: row.get(2),
        name: row.get(3),
        amount: row.get(4),
        date: row.get(5),
        vat: row.get(6),
        pct: row.get(7),
        commentary: row.get(8),
        status: BillStatus::from_str(&row.get::<usize, String>(9))?,
        file_url: row.get(10),
        file_name: row.get(11),
    })
}
