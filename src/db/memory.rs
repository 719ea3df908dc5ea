use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{
    ApiError,
    bill::{Bill, BillKey, BillStore, BillUpdate, NewBill, new_bill_id},
};

/// Bill store kept in memory, seeded from a JSON fixture file.
#[derive(Default, Clone, Debug)]
pub struct InMemBillStore(Arc<Mutex<Vec<Bill>>>);

impl InMemBillStore {
    pub fn new(bills: Vec<Bill>) -> Self {
        Self(Arc::new(Mutex::new(bills)))
    }

    pub async fn from_fixtures(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let bills: Vec<Bill> = serde_json::from_str(&raw)?;
        tracing::debug!(
            "loaded {} bills from {}",
            bills.len(),
            path.as_ref().display()
        );
        Ok(Self::new(bills))
    }
}

#[async_trait]
impl BillStore for InMemBillStore {
    async fn list(&self, email: &str) -> Result<Vec<Bill>, anyhow::Error> {
        Ok(self
            .0
            .lock()
            .await
            .iter()
            .filter(|b| b.email == email)
            .cloned()
            .collect())
    }

    async fn create(&self, new_bill: &NewBill) -> Result<BillKey, anyhow::Error> {
        let mut bills = self.0.lock().await;
        let mut id = new_bill_id();
        while bills.iter().any(|b| b.id == id) {
            id = new_bill_id();
        }
        bills.push(Bill::from_new(id.clone(), new_bill));
        Ok(BillKey {
            id,
            file_url: new_bill.file_url.clone(),
        })
    }

    async fn update(&self, id: &str, update: &BillUpdate) -> Result<Bill, anyhow::Error> {
        let mut bills = self.0.lock().await;
        let bill = bills
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(ApiError::NotFound)?;
        bill.apply(update);
        Ok(bill.clone())
    }
}
