//! Database service: every persistence operation of the billing backend.
//!
//! Correctness under concurrent requests comes from PostgreSQL, never from
//! in-process locks: each mutating operation re-reads authoritative state
//! inside its own transaction, holding a `FOR UPDATE` row lock on the
//! invoice where the operation is read-then-write. Errors propagate with
//! `?`, dropping the transaction and rolling back, so no partial writes are
//! ever observable.

use crate::models::{
    Client, CreateClient, CreateInvoice, CreateInvoiceItem, CreatePayment, Invoice, InvoiceItem,
    InvoiceStatus, InvoiceWithItems, InvoicedTotals, OutstandingInvoice, OutstandingReport,
    Payment, PaymentMethod, PaymentOutcome, PaymentWithInvoice, SalesReport, SequenceKind,
    UpdateClient, UpdateInvoice, VatReport,
};
use crate::money::{self, LineInput};
use crate::services::metrics::{
    DB_QUERY_DURATION, INVOICES_TOTAL, PAYMENT_AMOUNT_TOTAL, PAYMENTS_TOTAL,
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "id, invoice_number, client_id, status, issue_date, due_date, \
     currency, notes, subtotal, tax_rate, tax_total, total, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, invoice_id, product_id, description, qty, unit_price, line_total, sort_order, created_at";

const PAYMENT_COLUMNS: &str =
    "id, invoice_id, method, amount, paid_at, note, receipt_number, created_at";

const CLIENT_COLUMNS: &str = "id, name, email, phone, address_line1, address_line2, city, \
     country, created_at, updated_at";

/// Format a document number: `{prefix}-{year}-{seq:06}`.
fn format_document_number(prefix: &str, year: i32, seq: i64) -> String {
    format!("{}-{}-{:06}", prefix, year, seq)
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })
    }

    // -------------------------------------------------------------------------
    // Sequence Generator
    // -------------------------------------------------------------------------

    /// Allocate the next document number for (kind, current year).
    ///
    /// Runs on the caller's open transaction so the increment commits or
    /// rolls back with the row it numbers. The upsert serializes concurrent
    /// callers on the counter row; duplicates are impossible, gaps from
    /// rolled-back creations are tolerated and never reused.
    async fn next_document_number(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: SequenceKind,
    ) -> Result<String, AppError> {
        let year = Utc::now().year();

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequence_counters (kind, year, last_seq)
            VALUES ($1, $2, 1)
            ON CONFLICT (kind, year)
            DO UPDATE SET last_seq = sequence_counters.last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(kind.as_str())
        .bind(year)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to advance sequence counter: {}", e))
        })?;

        Ok(format_document_number(kind.prefix(), year, seq))
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (id, name, email, phone, address_line1, address_line2, city, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.country)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to create client: {}", e)))?;

        timer.observe_duration();

        info!(client_id = %client.id, name = %client.name, "Client created");

        Ok(client)
    }

    /// List clients, most recent first.
    #[instrument(skip(self))]
    pub async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC LIMIT 100"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Update a client; absent fields stay unchanged.
    #[instrument(skip(self, input), fields(client_id = %client_id))]
    pub async fn update_client(
        &self,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                address_line1 = COALESCE($5, address_line1),
                address_line2 = COALESCE($6, address_line2),
                city = COALESCE($7, city),
                country = COALESCE($8, country),
                updated_at = now()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.country)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to update client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Delete a client. Blocked while any invoice references it.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn delete_client(&self, client_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let invoice_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE client_id = $1")
                .bind(client_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::Database(anyhow::anyhow!("Failed to count client invoices: {}", e))
                })?;

        if invoice_count > 0 {
            return Err(AppError::state_conflict_with_meta(
                "ClientHasInvoices",
                format!("Client has {} invoice(s) and cannot be deleted", invoice_count),
                serde_json::json!({ "invoice_count": invoice_count }),
            ));
        }

        // The FK RESTRICT on invoices.client_id backs up the pre-check if an
        // invoice lands between the count and the delete.
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::state_conflict(
                        "ClientHasInvoices",
                        "Client has invoices and cannot be deleted",
                    )
                }
                _ => AppError::Database(anyhow::anyhow!("Failed to delete client: {}", e)),
            })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("ClientNotFound", "Client not found"));
        }

        info!(client_id = %client_id, "Client deleted");

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Lifecycle
    // -------------------------------------------------------------------------

    /// Create a draft invoice with its items, totals and generated number,
    /// all in one transaction.
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let client_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM clients WHERE id = $1")
            .bind(input.client_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to check client: {}", e)))?;

        if client_exists.is_none() {
            return Err(AppError::not_found("ClientNotFound", "Client not found"));
        }

        let tax_rate = input.tax_rate.unwrap_or_else(|| Decimal::from(13));
        let line_inputs: Vec<LineInput> = input
            .items
            .iter()
            .map(|it| LineInput {
                qty: it.qty,
                unit_price: it.unit_price,
            })
            .collect();
        let totals = money::invoice_totals(&line_inputs, tax_rate);

        let invoice_number = self
            .next_document_number(&mut tx, SequenceKind::Invoice)
            .await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                id, invoice_number, client_id, status, issue_date, due_date, currency, notes,
                subtotal, tax_rate, tax_total, total
            )
            VALUES (
                $1, $2, $3, 'draft',
                COALESCE($4::date, CURRENT_DATE),
                $5::date,
                $6, $7,
                $8, $9, $10, $11
            )
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&invoice_number)
        .bind(input.client_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.currency.as_deref().unwrap_or("NPR"))
        .bind(&input.notes)
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_total)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        let items = self
            .insert_invoice_items(&mut tx, invoice.id, &input.items)
            .await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        INVOICES_TOTAL.with_label_values(&["draft"]).inc();

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            "Draft invoice created"
        );

        Ok(InvoiceWithItems { invoice, items })
    }

    /// Insert an item set for an invoice on the caller's transaction.
    /// sort_order defaults to the item's position in the submitted array.
    async fn insert_invoice_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        items: &[CreateInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let mut inserted = Vec::with_capacity(items.len());

        for (i, it) in items.iter().enumerate() {
            let line_total = money::line_total(it.qty, it.unit_price);

            let item = sqlx::query_as::<_, InvoiceItem>(&format!(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, product_id, description, qty, unit_price, line_total, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(it.product_id)
            .bind(&it.description)
            .bind(it.qty)
            .bind(it.unit_price)
            .bind(line_total)
            .bind(it.sort_order.unwrap_or(i as i32))
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::Database(anyhow::anyhow!("Failed to insert invoice item: {}", e))
            })?;

            inserted.push(item);
        }

        Ok(inserted)
    }

    /// List invoices, most recent first.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// List the invoices referencing a client, most recent first.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn list_invoices_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices_for_client"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE client_id = $1 ORDER BY created_at DESC"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Get an invoice with its items, items ordered by sort_order then
    /// insertion.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<InvoiceWithItems>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let Some(invoice) = invoice else {
            timer.observe_duration();
            return Ok(None);
        };

        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = $1 \
             ORDER BY sort_order, created_at"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to get invoice items: {}", e)))?;

        timer.observe_duration();

        Ok(Some(InvoiceWithItems { invoice, items }))
    }

    /// Issue a draft invoice: a compare-and-swap transition conditioned on
    /// the row still being draft. On zero rows the invoice is re-read to
    /// tell InvoiceNotFound from InvoiceNotDraft.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn issue_invoice(&self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["issue_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'issued',
                issue_date = COALESCE(issue_date, CURRENT_DATE),
                updated_at = now()
            WHERE id = $1 AND status = 'draft'
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to issue invoice: {}", e)))?;

        timer.observe_duration();

        match invoice {
            Some(invoice) => {
                INVOICES_TOTAL.with_label_values(&["issued"]).inc();
                info!(
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    "Invoice issued"
                );
                Ok(invoice)
            }
            None => {
                let exists: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM invoices WHERE id = $1")
                        .bind(invoice_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| {
                            AppError::Database(anyhow::anyhow!("Failed to re-read invoice: {}", e))
                        })?;

                if exists.is_some() {
                    Err(AppError::state_conflict(
                        "InvoiceNotDraft",
                        "Only draft invoices can be issued",
                    ))
                } else {
                    Err(AppError::not_found("InvoiceNotFound", "Invoice not found"))
                }
            }
        }
    }

    /// Lock and load an invoice row for a read-then-write operation on the
    /// caller's transaction.
    async fn lock_invoice(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
    ) -> Result<Invoice, AppError> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE"
        ))
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to lock invoice: {}", e)))?
        .ok_or_else(|| AppError::not_found("InvoiceNotFound", "Invoice not found"))
    }

    /// Update whitelisted fields of a draft invoice under a row lock.
    /// A tax_rate change recomputes tax_total and total from the stored
    /// subtotal, keeping the totals invariant intact.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status() != InvoiceStatus::Draft {
            return Err(AppError::state_conflict(
                "InvoiceNotDraft",
                "Only draft invoices can be updated",
            ));
        }

        // Items are untouched here, so the stored subtotal already reflects
        // them; re-deriving tax and total from it is exact.
        let retaxed = input.tax_rate.map(|rate| {
            money::invoice_totals(
                &[LineInput {
                    qty: Decimal::ONE,
                    unit_price: invoice.subtotal,
                }],
                rate,
            )
        });

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET issue_date = COALESCE($2, issue_date),
                due_date = COALESCE($3, due_date),
                currency = COALESCE($4, currency),
                notes = COALESCE($5, notes),
                tax_rate = COALESCE($6, tax_rate),
                tax_total = COALESCE($7, tax_total),
                total = COALESCE($8, total),
                updated_at = now()
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(&input.currency)
        .bind(&input.notes)
        .bind(retaxed.map(|t| t.tax_rate))
        .bind(retaxed.map(|t| t.tax_total))
        .bind(retaxed.map(|t| t.total))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice.id, "Invoice updated");

        Ok(invoice)
    }

    /// Replace the whole item set of a draft invoice and recompute totals
    /// with the invoice's existing tax rate. Delete, insert and recompute
    /// commit together or roll back together.
    #[instrument(skip(self, items), fields(invoice_id = %invoice_id))]
    pub async fn replace_invoice_items(
        &self,
        invoice_id: Uuid,
        items: &[CreateInvoiceItem],
    ) -> Result<InvoiceWithItems, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_invoice_items"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status() != InvoiceStatus::Draft {
            return Err(AppError::state_conflict(
                "InvoiceNotDraft",
                "Only draft invoices can have items replaced",
            ));
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::Database(anyhow::anyhow!("Failed to delete invoice items: {}", e))
            })?;

        let inserted = self.insert_invoice_items(&mut tx, invoice_id, items).await?;

        let line_inputs: Vec<LineInput> = items
            .iter()
            .map(|it| LineInput {
                qty: it.qty,
                unit_price: it.unit_price,
            })
            .collect();
        let totals = money::invoice_totals(&line_inputs, invoice.tax_rate);

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET subtotal = $2,
                tax_rate = $3,
                tax_total = $4,
                total = $5,
                updated_at = now()
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(totals.subtotal)
        .bind(totals.tax_rate)
        .bind(totals.tax_total)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to update invoice totals: {}", e))
        })?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.id,
            item_count = inserted.len(),
            total = %invoice.total,
            "Invoice items replaced"
        );

        Ok(InvoiceWithItems {
            invoice,
            items: inserted,
        })
    }

    /// Delete a draft invoice; its items cascade.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status() != InvoiceStatus::Draft {
            return Err(AppError::state_conflict(
                "InvoiceNotDraft",
                "Only draft invoices can be deleted",
            ));
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Draft invoice deleted");

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payment Ledger
    // -------------------------------------------------------------------------

    /// Apply a payment against an issued invoice's outstanding balance.
    ///
    /// The whole operation runs with the invoice row locked: concurrent
    /// payment attempts against the same invoice serialize here instead of
    /// both reading a stale balance and jointly overpaying. Payments against
    /// different invoices never block each other.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn apply_payment(
        &self,
        invoice_id: Uuid,
        input: &CreatePayment,
    ) -> Result<PaymentOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_payment"])
            .start_timer();

        let mut tx = self.begin().await?;

        let invoice = self.lock_invoice(&mut tx, invoice_id).await?;

        if invoice.status() != InvoiceStatus::Issued {
            return Err(AppError::state_conflict(
                "InvoiceNotIssued",
                "Invoice must be issued before payment",
            ));
        }

        if input.amount <= Decimal::ZERO {
            return Err(AppError::domain_rule(
                "InvalidAmount",
                "Invalid payment amount",
            ));
        }

        let paid_total_before: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to sum payments: {}", e)))?;

        let balance_before = money::round2(invoice.total - paid_total_before);

        // Status should already prevent this; kept as a defensive check.
        if balance_before <= Decimal::ZERO {
            return Err(AppError::state_conflict(
                "InvoiceAlreadyPaid",
                "Invoice already paid",
            ));
        }

        if input.amount > balance_before {
            return Err(AppError::domain_rule_with_meta(
                "OverPayment",
                "Payment exceeds balance due",
                serde_json::json!({
                    "balance_before": balance_before,
                    "amount": input.amount,
                }),
            ));
        }

        let receipt_number = self
            .next_document_number(&mut tx, SequenceKind::Receipt)
            .await?;

        let method = input.method.unwrap_or(PaymentMethod::Cash);

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (id, invoice_id, method, amount, paid_at, note, receipt_number)
            VALUES ($1, $2, $3, $4, COALESCE($5::timestamptz, now()), $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(method.as_str())
        .bind(input.amount)
        .bind(input.paid_at)
        .bind(&input.note)
        .bind(&receipt_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to insert payment: {}", e)))?;

        let paid_total = money::round2(paid_total_before + input.amount);
        let balance_due = money::round2(invoice.total - paid_total);

        let invoice = if balance_due == Decimal::ZERO {
            let paid = sqlx::query_as::<_, Invoice>(&format!(
                r#"
                UPDATE invoices
                SET status = 'paid',
                    updated_at = now()
                WHERE id = $1
                RETURNING {INVOICE_COLUMNS}
                "#
            ))
            .bind(invoice_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::Database(anyhow::anyhow!("Failed to mark invoice paid: {}", e))
            })?;

            INVOICES_TOTAL.with_label_values(&["paid"]).inc();
            paid
        } else {
            invoice
        };

        tx.commit()
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        PAYMENTS_TOTAL.with_label_values(&[method.as_str()]).inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&[&invoice.currency])
            .inc_by(input.amount.to_f64().unwrap_or(0.0));

        info!(
            payment_id = %payment.id,
            invoice_id = %invoice_id,
            receipt_number = %payment.receipt_number,
            amount = %payment.amount,
            balance_due = %balance_due,
            invoice_status = %invoice.status,
            "Payment applied"
        );

        Ok(PaymentOutcome {
            payment,
            invoice,
            paid_total,
            balance_due,
        })
    }

    /// List the payments of one invoice, oldest first.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_payments_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments_for_invoice"])
            .start_timer();

        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to check invoice: {}", e)))?;

        if exists.is_none() {
            return Err(AppError::not_found("InvoiceNotFound", "Invoice not found"));
        }

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = $1 ORDER BY paid_at"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// List all payments joined with their invoice number, most recent first.
    #[instrument(skip(self))]
    pub async fn list_payments(&self) -> Result<Vec<PaymentWithInvoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, PaymentWithInvoice>(
            r#"
            SELECT p.id, p.invoice_id, i.invoice_number, p.method, p.amount, p.paid_at,
                   p.note, p.receipt_number, p.created_at
            FROM payments p
            JOIN invoices i ON i.id = p.invoice_id
            ORDER BY p.paid_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Reporting Aggregator
    // -------------------------------------------------------------------------

    /// Sales report: invoiced sums and cash received over a date range,
    /// defaulting to the last 30 days, dates inclusive.
    #[instrument(skip(self))]
    pub async fn sales_report(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<SalesReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sales_report"])
            .start_timer();

        let (from, to) = normalize_range(from, to);

        let invoices = sqlx::query_as::<_, InvoicedTotals>(
            r#"
            SELECT
                COALESCE(SUM(subtotal), 0) AS subtotal,
                COALESCE(SUM(tax_total), 0) AS vat,
                COALESCE(SUM(total), 0) AS total
            FROM invoices
            WHERE status IN ('issued', 'paid')
              AND issue_date >= $1::date
              AND issue_date <= $2::date
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to sum invoiced totals: {}", e)))?;

        let received: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE paid_at::date >= $1::date
              AND paid_at::date <= $2::date
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to sum cash received: {}", e)))?;

        timer.observe_duration();

        Ok(SalesReport {
            from,
            to,
            invoices,
            cash: crate::models::CashReceived { received },
        })
    }

    /// VAT report: vatable sales and VAT invoiced over a date range.
    #[instrument(skip(self))]
    pub async fn vat_report(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<VatReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["vat_report"])
            .start_timer();

        let (from, to) = normalize_range(from, to);

        let (vatable_sales, vat_invoiced): (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(subtotal), 0) AS vatable_sales,
                COALESCE(SUM(tax_total), 0) AS vat_invoiced
            FROM invoices
            WHERE status IN ('issued', 'paid')
              AND issue_date >= $1::date
              AND issue_date <= $2::date
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to sum VAT totals: {}", e)))?;

        timer.observe_duration();

        Ok(VatReport {
            from,
            to,
            vatable_sales,
            vat_invoiced,
        })
    }

    /// Outstanding report: issued invoices with an unpaid balance as of a
    /// date (default today), ordered by due date nulls last.
    #[instrument(skip(self))]
    pub async fn outstanding_report(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<OutstandingReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["outstanding_report"])
            .start_timer();

        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

        let invoices = sqlx::query_as::<_, OutstandingInvoice>(
            r#"
            WITH paid AS (
                SELECT invoice_id, COALESCE(SUM(amount), 0) AS amount_paid
                FROM payments
                GROUP BY invoice_id
            )
            SELECT
                inv.id,
                inv.invoice_number,
                inv.client_id,
                c.name AS client_name,
                inv.issue_date,
                inv.due_date,
                inv.total,
                COALESCE(p.amount_paid, 0) AS amount_paid,
                GREATEST(inv.total - COALESCE(p.amount_paid, 0), 0) AS amount_due
            FROM invoices inv
            JOIN clients c ON c.id = inv.client_id
            LEFT JOIN paid p ON p.invoice_id = inv.id
            WHERE inv.status = 'issued'
              AND inv.issue_date <= $1::date
              AND (inv.total - COALESCE(p.amount_paid, 0)) > 0
            ORDER BY inv.due_date NULLS LAST, inv.issue_date DESC
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::Database(anyhow::anyhow!("Failed to query outstanding invoices: {}", e))
        })?;

        timer.observe_duration();

        let total_due = money::round2(invoices.iter().map(|i| i.amount_due).sum());

        Ok(OutstandingReport {
            as_of,
            count: invoices.len(),
            total_due,
            invoices,
        })
    }
}

/// Inclusive date range defaulting to the last 30 days.
fn normalize_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let today = Utc::now().date_naive();
    let from = from.unwrap_or_else(|| today - chrono::Duration::days(30));
    let to = to.unwrap_or(today);
    (from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_numbers_are_bit_exact() {
        assert_eq!(
            format_document_number(SequenceKind::Invoice.prefix(), 2026, 42),
            "PP-2026-000042"
        );
        assert_eq!(
            format_document_number(SequenceKind::Receipt.prefix(), 2026, 7),
            "RCT-2026-000007"
        );
    }

    #[test]
    fn sequence_numbers_never_truncate_past_six_digits() {
        assert_eq!(
            format_document_number("PP", 2026, 1_234_567),
            "PP-2026-1234567"
        );
    }

    #[test]
    fn range_defaults_to_last_30_days() {
        let (from, to) = normalize_range(None, None);
        assert_eq!(to - from, chrono::Duration::days(30));

        let fixed = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let (from, to) = normalize_range(Some(fixed), Some(fixed));
        assert_eq!(from, fixed);
        assert_eq!(to, fixed);
    }
}
