use sqlx::{Sqlite, Transaction};

use super::{delete_row, get_record, put_record, Record, Region, StoreError};

/// A write batch across regions. Dropping it without [`commit`] rolls back.
///
/// [`commit`]: StoreTransaction::commit
pub struct StoreTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl StoreTransaction {
    pub(super) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub async fn put<R: Record>(&mut self, record: &R) -> Result<(), StoreError> {
        put_record(&mut *self.tx, record).await
    }

    pub async fn get<R: Record>(&mut self, key: &str) -> Result<Option<R>, StoreError> {
        get_record(&mut *self.tx, key).await
    }

    pub async fn delete(&mut self, region: Region, key: &str) -> Result<bool, StoreError> {
        delete_row(&mut *self.tx, region, key).await
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
