// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use retrato_core::{CustomerId, GenerationId, OrderId};
use retrato_model::{Order, OrderStatus, PortraitStyle, ProductKind, ShippingAddress};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use crate::db::{parse_timestamp, parse_timestamp_opt, Db};
use crate::error::{StoreError, StoreErrorCode};

const ORDER_COLUMNS: &str = "id, generation_id, customer_id, product, size, price_cents, status, \
     charge_id, shipping_address, tracking_code, notes, created_at, paid_at, shipped_at";

struct RawOrder {
    id: String,
    generation_id: String,
    customer_id: String,
    product: String,
    size: Option<String>,
    price_cents: i64,
    status: String,
    charge_id: String,
    shipping_address: Option<String>,
    tracking_code: Option<String>,
    notes: Option<String>,
    created_at: String,
    paid_at: Option<String>,
    shipped_at: Option<String>,
}

fn raw_order(row: &Row<'_>) -> rusqlite::Result<RawOrder> {
    Ok(RawOrder {
        id: row.get(0)?,
        generation_id: row.get(1)?,
        customer_id: row.get(2)?,
        product: row.get(3)?,
        size: row.get(4)?,
        price_cents: row.get(5)?,
        status: row.get(6)?,
        charge_id: row.get(7)?,
        shipping_address: row.get(8)?,
        tracking_code: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
        paid_at: row.get(12)?,
        shipped_at: row.get(13)?,
    })
}

fn internal(message: impl std::fmt::Display) -> StoreError {
    StoreError::new(StoreErrorCode::Internal, message.to_string())
}

fn into_order(raw: RawOrder) -> Result<Order, StoreError> {
    let shipping_address: Option<ShippingAddress> = raw
        .shipping_address
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| internal(format!("stored shipping address is not valid json: {e}")))?;
    Ok(Order {
        id: OrderId::parse(&raw.id).map_err(internal)?,
        generation_id: GenerationId::parse(&raw.generation_id).map_err(internal)?,
        customer_id: CustomerId::parse(&raw.customer_id).map_err(internal)?,
        product: ProductKind::parse(&raw.product).map_err(internal)?,
        size: raw.size,
        price_cents: raw.price_cents,
        status: OrderStatus::parse(&raw.status).map_err(internal)?,
        charge_id: raw.charge_id,
        shipping_address,
        tracking_code: raw.tracking_code,
        notes: raw.notes,
        created_at: parse_timestamp(&raw.created_at)?,
        paid_at: parse_timestamp_opt(raw.paid_at)?,
        shipped_at: parse_timestamp_opt(raw.shipped_at)?,
    })
}

/// Joined context for the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub tax_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub style: PortraitStyle,
    pub generated_path: Option<String>,
    pub watermarked_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithContext {
    #[serde(flatten)]
    pub order: Order,
    pub customer: CustomerSummary,
    pub generation: GenerationSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderWithContext>,
    pub total: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AdminOrderUpdate {
    pub status: Option<OrderStatus>,
    pub tracking_code: Option<String>,
    pub notes: Option<String>,
}

impl AdminOrderUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.tracking_code.is_none() && self.notes.is_none()
    }
}

impl Db {
    pub fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let shipping_address = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| internal(format!("shipping address serialization failed: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO orders ({ORDER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
            params![
                order.id.to_string(),
                order.generation_id.to_string(),
                order.customer_id.to_string(),
                order.product.as_str(),
                order.size,
                order.price_cents,
                order.status.as_str(),
                order.charge_id,
                shipping_address,
                order.tracking_code,
                order.notes,
                order.created_at.to_rfc3339(),
                order.paid_at.map(|t| t.to_rfc3339()),
                order.shipped_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id.to_string()],
                raw_order,
            )
            .optional()?;
        drop(conn);
        raw.map(into_order).transpose()
    }

    pub fn order_by_charge(&self, charge_id: &str) -> Result<Option<Order>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE charge_id = ?1"),
                params![charge_id],
                raw_order,
            )
            .optional()?;
        drop(conn);
        raw.map(into_order).transpose()
    }

    /// The fulfillment idempotence point: the transition away from
    /// `pending_payment` happens in a single guarded UPDATE, so concurrent
    /// poll and webhook deliveries race for one winner.
    pub fn mark_order_paid(
        &self,
        id: OrderId,
        new_status: OrderStatus,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE orders SET status = ?2, paid_at = ?3
             WHERE id = ?1 AND status = 'pending_payment'",
            params![id.to_string(), new_status.as_str(), paid_at.to_rfc3339()],
        )?;
        Ok(changed == 1)
    }

    pub fn set_order_notes_and_status(
        &self,
        id: OrderId,
        notes: &str,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE orders SET notes = ?2, status = ?3 WHERE id = ?1",
            params![id.to_string(), notes, status.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("order {id} not found"),
            ));
        }
        Ok(())
    }

    /// Admin edits. Entering a tracking code stamps `shipped_at`.
    pub fn update_order_admin(
        &self,
        id: OrderId,
        update: &AdminOrderUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::new(
                StoreErrorCode::Validation,
                "no fields to update",
            ));
        }
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = update.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(tracking) = &update.tracking_code {
            sets.push("tracking_code = ?");
            values.push(Box::new(tracking.clone()));
            sets.push("shipped_at = ?");
            values.push(Box::new(now.to_rfc3339()));
        }
        if let Some(notes) = &update.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }
        values.push(Box::new(id.to_string()));
        let sql = format!("UPDATE orders SET {} WHERE id = ?", sets.join(", "));
        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(Box::as_ref).collect();
        let conn = self.lock()?;
        let changed = conn.execute(&sql, &param_refs[..])?;
        if changed == 0 {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("order {id} not found"),
            ));
        }
        Ok(())
    }

    /// Newest-first admin page, joined with customer and generation context.
    /// `page` is 1-based.
    pub fn list_orders(
        &self,
        filter: Option<OrderStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<OrderPage, StoreError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);
        let page_size = i64::from(page_size);
        let conn = self.lock()?;

        let total: i64 = match filter {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM orders WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?,
        };
        let total = u64::try_from(total).unwrap_or(0);

        let base = format!(
            "SELECT o.id, o.generation_id, o.customer_id, o.product, o.size, o.price_cents, \
                    o.status, o.charge_id, o.shipping_address, o.tracking_code, o.notes, \
                    o.created_at, o.paid_at, o.shipped_at, \
                    c.name, c.email, c.cellphone, c.tax_id, \
                    g.style, g.generated_path, g.watermarked_path \
             FROM orders o \
             JOIN customers c ON c.id = o.customer_id \
             JOIN generations g ON g.id = o.generation_id \
             {} \
             ORDER BY o.created_at DESC LIMIT ?{} OFFSET ?{}",
            if filter.is_some() {
                "WHERE o.status = ?1"
            } else {
                ""
            },
            if filter.is_some() { 2 } else { 1 },
            if filter.is_some() { 3 } else { 2 },
        );

        let map = |row: &Row<'_>| -> rusqlite::Result<(RawOrder, CustomerSummary, GenerationSummary)> {
            let raw = raw_order(row)?;
            let customer = CustomerSummary {
                name: row.get(14)?,
                email: row.get(15)?,
                cellphone: row.get(16)?,
                tax_id: row.get(17)?,
            };
            let style: String = row.get(18)?;
            let generation = GenerationSummary {
                style: PortraitStyle::from_input(&style),
                generated_path: row.get(19)?,
                watermarked_path: row.get(20)?,
            };
            Ok((raw, customer, generation))
        };

        let mut stmt = conn.prepare(&base)?;
        let rows: Vec<(RawOrder, CustomerSummary, GenerationSummary)> = match filter {
            Some(status) => stmt
                .query_map(params![status.as_str(), page_size, offset], map)?
                .collect::<rusqlite::Result<_>>()?,
            None => stmt
                .query_map(params![page_size, offset], map)?
                .collect::<rusqlite::Result<_>>()?,
        };
        drop(stmt);
        drop(conn);

        let mut orders = Vec::with_capacity(rows.len());
        for (raw, customer, generation) in rows {
            orders.push(OrderWithContext {
                order: into_order(raw)?,
                customer,
                generation,
            });
        }
        Ok(OrderPage { orders, total })
    }

    pub fn orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ?1 ORDER BY created_at DESC"
        ))?;
        let raws: Vec<RawOrder> = stmt
            .query_map(params![customer_id.to_string()], raw_order)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);
        raws.into_iter().map(into_order).collect()
    }
}
