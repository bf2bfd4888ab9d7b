// 🗄️ Store - SQLite persistence behind the REST API
//
// Free functions over a `rusqlite::Connection`, one per API operation.
// Bulk operations run inside a single SQL transaction: the whole batch is
// committed or nothing is.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::entities::{
    Account, AccountDraft, Category, CategoryDraft, Transaction, TransactionDraft,
    TransactionFilter,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// SETUP
// ============================================================================

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases silently keep "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Account delete cascades; category delete only clears the reference
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            amount INTEGER NOT NULL,
            payee TEXT NOT NULL,
            notes TEXT,
            date TEXT NOT NULL,
            account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id)",
        [],
    )?;

    Ok(())
}

/// True when the error chain carries a SQLite constraint violation
/// (unknown foreign key, duplicate id)
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// ACCOUNTS & CATEGORIES (named records share one table shape)
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum NamedTable {
    Accounts,
    Categories,
}

impl NamedTable {
    fn name(&self) -> &'static str {
        match self {
            NamedTable::Accounts => "accounts",
            NamedTable::Categories => "categories",
        }
    }
}

fn insert_named(conn: &Connection, table: NamedTable, id: &str, name: &str) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {} (id, name) VALUES (?1, ?2)", table.name()),
        params![id, name],
    )
    .with_context(|| format!("Failed to insert into {}", table.name()))?;
    Ok(())
}

fn list_named(conn: &Connection, table: NamedTable) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name FROM {} ORDER BY name COLLATE NOCASE, id",
        table.name()
    ))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn get_named(conn: &Connection, table: NamedTable, id: &str) -> Result<Option<(String, String)>> {
    let row = conn
        .query_row(
            &format!("SELECT id, name FROM {} WHERE id = ?1", table.name()),
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(row)
}

fn rename_named(
    conn: &Connection,
    table: NamedTable,
    id: &str,
    name: &str,
) -> Result<Option<(String, String)>> {
    let changed = conn.execute(
        &format!("UPDATE {} SET name = ?1 WHERE id = ?2", table.name()),
        params![name, id],
    )?;

    if changed == 0 {
        return Ok(None);
    }
    get_named(conn, table, id)
}

fn delete_named(conn: &Connection, table: NamedTable, id: &str) -> Result<Option<(String, String)>> {
    let existing = get_named(conn, table, id)?;
    if existing.is_some() {
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", table.name()),
            [id],
        )?;
    }
    Ok(existing)
}

/// Delete every id that exists, atomically. Returns the ids actually removed.
fn delete_many(conn: &mut Connection, table: &str, ids: &[String]) -> Result<Vec<String>> {
    let tx = conn.transaction().context("Failed to start bulk delete")?;
    let mut deleted = Vec::new();
    {
        let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE id = ?1", table))?;
        for id in ids {
            if stmt.execute([id])? > 0 {
                deleted.push(id.clone());
            }
        }
    }
    tx.commit().context("Failed to commit bulk delete")?;

    tracing::info!(table, requested = ids.len(), deleted = deleted.len(), "bulk delete");
    Ok(deleted)
}

pub fn insert_account(conn: &Connection, draft: &AccountDraft) -> Result<Account> {
    let account = Account::new(draft)?;
    insert_named(conn, NamedTable::Accounts, &account.id, &account.name)?;
    Ok(account)
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    Ok(list_named(conn, NamedTable::Accounts)?
        .into_iter()
        .map(|(id, name)| Account { id, name })
        .collect())
}

pub fn get_account(conn: &Connection, id: &str) -> Result<Option<Account>> {
    Ok(get_named(conn, NamedTable::Accounts, id)?.map(|(id, name)| Account { id, name }))
}

/// Find an account by name (exact match, case-insensitive)
pub fn find_account_by_name(conn: &Connection, name: &str) -> Result<Option<Account>> {
    let row = conn
        .query_row(
            "SELECT id, name FROM accounts WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            [name.trim()],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}

pub fn update_account(conn: &Connection, id: &str, draft: &AccountDraft) -> Result<Option<Account>> {
    let name = draft.validated_name()?;
    Ok(rename_named(conn, NamedTable::Accounts, id, &name)?.map(|(id, name)| Account { id, name }))
}

pub fn delete_account(conn: &Connection, id: &str) -> Result<Option<Account>> {
    Ok(delete_named(conn, NamedTable::Accounts, id)?.map(|(id, name)| Account { id, name }))
}

pub fn delete_accounts(conn: &mut Connection, ids: &[String]) -> Result<Vec<String>> {
    delete_many(conn, NamedTable::Accounts.name(), ids)
}

pub fn insert_category(conn: &Connection, draft: &CategoryDraft) -> Result<Category> {
    let category = Category::new(draft)?;
    insert_named(conn, NamedTable::Categories, &category.id, &category.name)?;
    Ok(category)
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    Ok(list_named(conn, NamedTable::Categories)?
        .into_iter()
        .map(|(id, name)| Category { id, name })
        .collect())
}

pub fn get_category(conn: &Connection, id: &str) -> Result<Option<Category>> {
    Ok(get_named(conn, NamedTable::Categories, id)?.map(|(id, name)| Category { id, name }))
}

pub fn update_category(
    conn: &Connection,
    id: &str,
    draft: &CategoryDraft,
) -> Result<Option<Category>> {
    draft.validate()?;
    let name = draft.name.trim();
    Ok(rename_named(conn, NamedTable::Categories, id, name)?.map(|(id, name)| Category { id, name }))
}

pub fn delete_category(conn: &Connection, id: &str) -> Result<Option<Category>> {
    Ok(delete_named(conn, NamedTable::Categories, id)?.map(|(id, name)| Category { id, name }))
}

pub fn delete_categories(conn: &mut Connection, ids: &[String]) -> Result<Vec<String>> {
    delete_many(conn, NamedTable::Categories.name(), ids)
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

const TRANSACTION_SELECT: &str = "SELECT t.id, t.amount, t.payee, t.notes, t.date,
        t.account_id, a.name, t.category_id, c.name
     FROM transactions t
     JOIN accounts a ON a.id = t.account_id
     LEFT JOIN categories c ON c.id = t.category_id";

fn parse_stored_date(value: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date: String = row.get(4)?;

    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        payee: row.get(2)?,
        notes: row.get(3)?,
        date: parse_stored_date(&date, 4)?,
        account_id: row.get(5)?,
        account: row.get(6)?,
        category_id: row.get(7)?,
        category: row.get(8)?,
    })
}

fn insert_transaction_row(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (id, amount, payee, notes, date, account_id, category_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.id,
            tx.amount,
            tx.payee,
            tx.notes,
            tx.date.format(DATE_FORMAT).to_string(),
            tx.account_id,
            tx.category_id,
        ],
    )
    .context("Failed to insert transaction")?;
    Ok(())
}

pub fn insert_transaction(conn: &Connection, draft: &TransactionDraft) -> Result<Transaction> {
    let tx = Transaction::new(draft)?;
    insert_transaction_row(conn, &tx)?;

    get_transaction(conn, &tx.id)?.context("Inserted transaction is missing")
}

/// Insert a batch atomically. Any invalid draft or unknown account/category
/// rolls the whole batch back.
pub fn insert_transactions(
    conn: &mut Connection,
    drafts: &[TransactionDraft],
) -> Result<Vec<Transaction>> {
    let records = drafts
        .iter()
        .map(Transaction::new)
        .collect::<Result<Vec<_>, _>>()?;

    let tx = conn.transaction().context("Failed to start bulk insert")?;
    for record in &records {
        insert_transaction_row(&tx, record)?;
    }

    let mut inserted = Vec::with_capacity(records.len());
    for record in &records {
        let stored = get_transaction(&tx, &record.id)?.context("Inserted transaction is missing")?;
        inserted.push(stored);
    }
    tx.commit().context("Failed to commit bulk insert")?;

    tracing::info!(count = inserted.len(), "✓ Inserted transactions");
    Ok(inserted)
}

/// Transactions matching the filter, newest first
pub fn list_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "{TRANSACTION_SELECT}
         WHERE (?1 IS NULL OR t.date >= ?1)
           AND (?2 IS NULL OR t.date <= ?2)
           AND (?3 IS NULL OR t.account_id = ?3)
         ORDER BY t.date DESC, t.created_at DESC, t.id"
    ))?;

    let transactions = stmt
        .query_map(
            params![
                filter.from.map(|d| d.format(DATE_FORMAT).to_string()),
                filter.to.map(|d| d.format(DATE_FORMAT).to_string()),
                filter.account_id,
            ],
            transaction_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!("{TRANSACTION_SELECT} WHERE t.id = ?1"),
            [id],
            transaction_from_row,
        )
        .optional()?;

    Ok(tx)
}

pub fn update_transaction(
    conn: &Connection,
    id: &str,
    draft: &TransactionDraft,
) -> Result<Option<Transaction>> {
    let draft = draft.normalized()?;

    let changed = conn
        .execute(
            "UPDATE transactions
             SET amount = ?1, payee = ?2, notes = ?3, date = ?4, account_id = ?5, category_id = ?6
             WHERE id = ?7",
            params![
                draft.amount,
                draft.payee,
                draft.notes,
                draft.date.format(DATE_FORMAT).to_string(),
                draft.account_id,
                draft.category_id,
                id,
            ],
        )
        .context("Failed to update transaction")?;

    if changed == 0 {
        return Ok(None);
    }
    get_transaction(conn, id)
}

pub fn delete_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let existing = get_transaction(conn, id)?;
    if existing.is_some() {
        conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    }
    Ok(existing)
}

pub fn delete_transactions(conn: &mut Connection, ids: &[String]) -> Result<Vec<String>> {
    delete_many(conn, "transactions", ids)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// AGGREGATES (used by the summary)
// ============================================================================

/// Income (amount >= 0) and expense (amount < 0) totals for a closed date range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub income: i64,
    pub expenses: i64,
    pub remaining: i64,
}

fn range_params(from: NaiveDate, to: NaiveDate, account_id: Option<&str>) -> [Option<String>; 3] {
    [
        Some(from.format(DATE_FORMAT).to_string()),
        Some(to.format(DATE_FORMAT).to_string()),
        account_id.map(str::to_string),
    ]
}

pub fn period_totals(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    account_id: Option<&str>,
) -> Result<PeriodTotals> {
    let totals = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN amount >= 0 THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN amount < 0 THEN amount ELSE 0 END), 0),
            COALESCE(SUM(amount), 0)
         FROM transactions
         WHERE date >= ?1 AND date <= ?2 AND (?3 IS NULL OR account_id = ?3)",
        params_from_iter(range_params(from, to, account_id)),
        |row| {
            Ok(PeriodTotals {
                income: row.get(0)?,
                expenses: row.get(1)?,
                remaining: row.get(2)?,
            })
        },
    )?;

    Ok(totals)
}

/// Absolute spending per category name, largest first.
/// Uncategorized spending is not included.
pub fn category_spending(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    account_id: Option<&str>,
) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT c.name, SUM(ABS(t.amount)) AS value
         FROM transactions t
         JOIN categories c ON c.id = t.category_id
         WHERE t.amount < 0
           AND t.date >= ?1 AND t.date <= ?2
           AND (?3 IS NULL OR t.account_id = ?3)
         GROUP BY c.name
         ORDER BY value DESC, c.name",
    )?;

    let rows = stmt
        .query_map(params_from_iter(range_params(from, to, account_id)), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Per-day (income, absolute expenses) for days that have transactions
pub fn daily_totals(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    account_id: Option<&str>,
) -> Result<Vec<(NaiveDate, i64, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT date,
            COALESCE(SUM(CASE WHEN amount >= 0 THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN amount < 0 THEN ABS(amount) ELSE 0 END), 0)
         FROM transactions
         WHERE date >= ?1 AND date <= ?2 AND (?3 IS NULL OR account_id = ?3)
         GROUP BY date
         ORDER BY date",
    )?;

    let rows = stmt
        .query_map(params_from_iter(range_params(from, to, account_id)), |row| {
            let date: String = row.get(0)?;
            Ok((parse_stored_date(&date, 0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================
