// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use retrato_core::CustomerId;
use retrato_model::{Customer, CustomerDraft};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{parse_timestamp, Db};
use crate::error::{StoreError, StoreErrorCode};

struct RawCustomer {
    id: String,
    name: String,
    email: String,
    cellphone: String,
    tax_id: String,
    gateway_customer_id: Option<String>,
    created_at: String,
}

fn raw_customer(row: &Row<'_>) -> rusqlite::Result<RawCustomer> {
    Ok(RawCustomer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        cellphone: row.get(3)?,
        tax_id: row.get(4)?,
        gateway_customer_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn into_customer(raw: RawCustomer) -> Result<Customer, StoreError> {
    Ok(Customer {
        id: CustomerId::parse(&raw.id)
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))?,
        name: raw.name,
        email: raw.email,
        cellphone: raw.cellphone,
        tax_id: raw.tax_id,
        gateway_customer_id: raw.gateway_customer_id,
        created_at: parse_timestamp(&raw.created_at)?,
    })
}

const CUSTOMER_COLUMNS: &str =
    "id, name, email, cellphone, tax_id, gateway_customer_id, created_at";

impl Db {
    /// Customers are deduplicated by email: a returning buyer keeps their
    /// row and id, with the contact fields refreshed from the latest
    /// checkout.
    pub fn upsert_customer(&self, draft: &CustomerDraft) -> Result<Customer, StoreError> {
        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM customers WHERE email = ?1",
                params![draft.email],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE customers SET name = ?2, cellphone = ?3, tax_id = ?4 WHERE id = ?1",
                    params![id, draft.name, draft.cellphone, draft.tax_id],
                )?;
                id
            }
            None => {
                let id = CustomerId::generate().to_string();
                conn.execute(
                    "INSERT INTO customers (id, name, email, cellphone, tax_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        draft.name,
                        draft.email,
                        draft.cellphone,
                        draft.tax_id,
                        Utc::now().to_rfc3339()
                    ],
                )?;
                id
            }
        };

        let raw = conn.query_row(
            &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
            params![id],
            raw_customer,
        )?;
        drop(conn);
        into_customer(raw)
    }

    pub fn customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"),
                params![id.to_string()],
                raw_customer,
            )
            .optional()?;
        drop(conn);
        raw.map(into_customer).transpose()
    }

    pub fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = ?1"),
                params![email],
                raw_customer,
            )
            .optional()?;
        drop(conn);
        raw.map(into_customer).transpose()
    }

    pub fn set_gateway_customer_id(
        &self,
        id: CustomerId,
        gateway_customer_id: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE customers SET gateway_customer_id = ?2 WHERE id = ?1",
            params![id.to_string(), gateway_customer_id],
        )?;
        if changed == 0 {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("customer {id} not found"),
            ));
        }
        Ok(())
    }
}
