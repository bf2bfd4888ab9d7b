// Finance Dashboard - Core Library
// Exposes all modules for use in the terminal dashboard, API server, and tests

pub mod entities;
pub mod db;
pub mod summary;
pub mod config;
pub mod logging;
pub mod api;          // Server half: REST router over SQLite
pub mod client;       // Client half starts here: FinanceApi + RouterClient
pub mod query_cache;
pub mod notify;
pub mod dialog;
pub mod hooks;
pub mod import;
pub mod wizard;
pub mod bulk;
pub mod pages;

// Re-export commonly used types
pub use entities::{
    Account, AccountDraft, Category, CategoryDraft, Transaction, TransactionDraft,
    TransactionFilter, TransactionFormValues, ValidationError,
    format_amount, parse_amount, MILLIUNITS,
};
pub use db::{open_database, setup_database, verify_count};
pub use summary::Summary;
pub use config::Settings;
pub use client::{Accounts, ApiError, Categories, FinanceApi, Resource, RouterClient, Transactions};
pub use query_cache::{QueryCache, QueryKey, QueryScope};
pub use notify::{Notification, NotificationLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use dialog::{ConfirmGate, DialogPrompt, GateError, SelectGate, SelectOption};
pub use hooks::{AccountHooks, CategoryHooks, EntityHooks, MutationError, SummaryHook, TransactionHooks};
pub use import::{ColumnMapping, ImportError, ImportField, ImportResults, ImportRow};
pub use wizard::{ImportWizard, WizardView};
pub use bulk::{BulkSubmission, SubmitError};
pub use pages::{Dashboard, EntityPage, PageError, QueryState, TransactionsPage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
