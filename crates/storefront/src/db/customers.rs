//! Customer repository for database operations.
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the crate builds
//! without a database.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use gigya_im_core::{AddressId, CustomerAddress, CustomerId, Email, LocalCustomerRecord};

use super::{CustomerStore, CustomerTransaction, RepositoryError};

const CUSTOMER_COLUMNS: &str = "id, email, first_name, last_name, gigya_uid, \
     is_synchronized_to_gigya, is_deleted, password_hash, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, first_name, last_name, street, city, postcode, country_code, \
     telephone, is_default_billing, is_default_shipping";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    gigya_uid: Option<String>,
    is_synchronized_to_gigya: bool,
    is_deleted: bool,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    first_name: String,
    last_name: String,
    street: String,
    city: String,
    postcode: String,
    country_code: String,
    telephone: Option<String>,
    is_default_billing: bool,
    is_default_shipping: bool,
}

impl CustomerRow {
    fn into_record(self, addresses: Vec<CustomerAddress>) -> Result<LocalCustomerRecord, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(LocalCustomerRecord {
            id: Some(CustomerId::new(self.id)),
            email,
            first_name: self.first_name,
            last_name: self.last_name,
            gigya_uid: self.gigya_uid,
            addresses,
            is_synchronized_to_gigya: self.is_synchronized_to_gigya,
            is_deleted: self.is_deleted,
            password_hash: self.password_hash,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

impl From<AddressRow> for CustomerAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: Some(AddressId::new(row.id)),
            first_name: row.first_name,
            last_name: row.last_name,
            street: row.street,
            city: row.city,
            postcode: row.postcode,
            country_code: row.country_code,
            telephone: row.telephone,
            is_default_billing: row.is_default_billing,
            is_default_shipping: row.is_default_shipping,
        }
    }
}

/// Map unique violations to `RepositoryError::Conflict`.
fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return RepositoryError::Conflict(db.message().to_string());
    }
    RepositoryError::Database(e)
}

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL` customer store.
pub struct PgCustomerStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgCustomerStore<'a> {
    /// Create a new customer store.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        column: &str,
        bind: &str,
    ) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM storefront.customer WHERE {column} = $1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(bind)
            .fetch_optional(self.pool)
            .await?;

        self.with_addresses(row).await
    }

    async fn with_addresses(
        &self,
        row: Option<CustomerRow>,
    ) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        match row {
            Some(row) => {
                let addresses = self.addresses_for(row.id).await?;
                row.into_record(addresses).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn addresses_for(&self, customer_id: i32) -> Result<Vec<CustomerAddress>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.customer_address \
             WHERE customer_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(customer_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(CustomerAddress::from).collect())
    }
}

impl CustomerStore for PgCustomerStore<'_> {
    type Transaction = PgCustomerTransaction;

    async fn begin(&self) -> Result<PgCustomerTransaction, RepositoryError> {
        Ok(PgCustomerTransaction {
            tx: self.pool.begin().await?,
            savepoints: 0,
        })
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM storefront.customer WHERE id = $1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        self.with_addresses(row).await
    }

    async fn find_by_gigya_uid(&self, uid: &str) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        self.find_one("gigya_uid", uid).await
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        self.find_one("lower(email)", &email.as_str().to_lowercase())
            .await
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An open `PostgreSQL` transaction. Nested transactions are savepoints.
pub struct PgCustomerTransaction {
    tx: Transaction<'static, Postgres>,
    savepoints: usize,
}

impl CustomerTransaction for PgCustomerTransaction {
    async fn begin_nested(&mut self) -> Result<(), RepositoryError> {
        self.savepoints += 1;
        let sql = format!("SAVEPOINT customer_sp_{}", self.savepoints);
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn release_nested(&mut self) -> Result<(), RepositoryError> {
        if self.savepoints == 0 {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "release without an open savepoint".to_string(),
            )));
        }
        let sql = format!("RELEASE SAVEPOINT customer_sp_{}", self.savepoints);
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        self.savepoints -= 1;
        Ok(())
    }

    async fn write_customer(&mut self, record: &LocalCustomerRecord) -> Result<CustomerId, RepositoryError> {
        let id = match record.id {
            Some(id) => sqlx::query_scalar::<_, i32>(
                r"
                UPDATE storefront.customer
                SET email = $2, first_name = $3, last_name = $4, gigya_uid = $5,
                    is_synchronized_to_gigya = $6, is_deleted = $7,
                    password_hash = COALESCE($8, password_hash), updated_at = NOW()
                WHERE id = $1
                RETURNING id
                ",
            )
            .bind(id.as_i32())
            .bind(record.email.as_str())
            .bind(record.first_name.as_deref())
            .bind(record.last_name.as_deref())
            .bind(record.gigya_uid.as_deref())
            .bind(record.is_synchronized_to_gigya)
            .bind(record.is_deleted)
            .bind(record.password_hash.as_deref())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_write_error)?
            .ok_or(RepositoryError::NotFound)?,
            None => sqlx::query_scalar::<_, i32>(
                r"
                INSERT INTO storefront.customer
                    (email, first_name, last_name, gigya_uid,
                     is_synchronized_to_gigya, is_deleted, password_hash)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                ",
            )
            .bind(record.email.as_str())
            .bind(record.first_name.as_deref())
            .bind(record.last_name.as_deref())
            .bind(record.gigya_uid.as_deref())
            .bind(record.is_synchronized_to_gigya)
            .bind(record.is_deleted)
            .bind(record.password_hash.as_deref())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?,
        };

        Ok(CustomerId::new(id))
    }

    async fn write_addresses(
        &mut self,
        customer_id: CustomerId,
        addresses: &[CustomerAddress],
    ) -> Result<Vec<AddressId>, RepositoryError> {
        sqlx::query("DELETE FROM storefront.customer_address WHERE customer_id = $1")
            .bind(customer_id.as_i32())
            .execute(&mut *self.tx)
            .await?;

        let mut ids = Vec::with_capacity(addresses.len());
        for address in addresses {
            let id = sqlx::query_scalar::<_, i32>(
                r"
                INSERT INTO storefront.customer_address
                    (customer_id, first_name, last_name, street, city, postcode,
                     country_code, telephone, is_default_billing, is_default_shipping)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING id
                ",
            )
            .bind(customer_id.as_i32())
            .bind(&address.first_name)
            .bind(&address.last_name)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.postcode)
            .bind(&address.country_code)
            .bind(address.telephone.as_deref())
            .bind(address.is_default_billing)
            .bind(address.is_default_shipping)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_error)?;
            ids.push(AddressId::new(id));
        }

        Ok(ids)
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
