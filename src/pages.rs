// 📄 Page shells - list state, selection and deletes for each entity page
//
// A page owns its query state and row selection behind std mutexes. No
// lock is held across an `.await`; every async method reads or writes the
// state in short critical sections around the API calls.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::bulk::{BulkSubmission, SubmitError};
use crate::client::{Accounts, Categories, FinanceApi, Resource, Transactions};
use crate::config::ImportSettings;
use crate::dialog::{ConfirmGate, GateError, SelectGate, SelectOption};
use crate::entities::{Transaction, TransactionFilter};
use crate::hooks::{EntityHooks, MutationError, SummaryHook};
use crate::import::{self, ColumnMapping, ImportError, ImportResults};
use crate::notify::{Notification, Notifier};
use crate::query_cache::QueryCache;
use crate::summary::Summary;
use crate::wizard::{ImportWizard, WizardView};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, QueryState::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            QueryState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// ENTITY PAGE
// ============================================================================

pub struct EntityPage<A, R: Resource> {
    hooks: EntityHooks<A, R>,
    filter: Mutex<R::Filter>,
    rows: Mutex<QueryState<Vec<R::Entity>>>,
    selected: Mutex<BTreeSet<String>>,
    delete_gate: ConfirmGate,
    bulk_delete_gate: ConfirmGate,
}

pub type AccountsPage<A> = EntityPage<A, Accounts>;
pub type CategoriesPage<A> = EntityPage<A, Categories>;

impl<A: FinanceApi, R: Resource> EntityPage<A, R> {
    pub fn new(hooks: EntityHooks<A, R>) -> Self {
        EntityPage {
            hooks,
            filter: Mutex::new(R::Filter::default()),
            rows: Mutex::new(QueryState::Loading),
            selected: Mutex::new(BTreeSet::new()),
            delete_gate: ConfirmGate::new(
                "Are you sure?",
                format!("You are about to delete this {}.", R::LABEL.to_lowercase()),
            ),
            bulk_delete_gate: ConfirmGate::new("Are you sure?", "You are about to perform a bulk delete."),
        }
    }

    pub fn hooks(&self) -> &EntityHooks<A, R> {
        &self.hooks
    }

    pub fn delete_gate(&self) -> &ConfirmGate {
        &self.delete_gate
    }

    pub fn bulk_delete_gate(&self) -> &ConfirmGate {
        &self.bulk_delete_gate
    }

    pub fn filter(&self) -> R::Filter {
        lock(&self.filter).clone()
    }

    pub fn set_filter(&self, filter: R::Filter) {
        *lock(&self.filter) = filter;
    }

    /// Load the list (from cache when fresh) into the page state
    pub async fn refresh(&self) {
        *lock(&self.rows) = QueryState::Loading;
        let filter = self.filter();

        let next = match self.hooks.list(&filter).await {
            Ok(rows) => {
                let ids: BTreeSet<&str> = rows.iter().map(|row| R::entity_id(row)).collect();
                lock(&self.selected).retain(|id| ids.contains(id.as_str()));
                QueryState::Ready(rows)
            }
            Err(err) => {
                tracing::warn!(page = R::PLURAL, "failed to load: {err}");
                QueryState::Failed(err.to_string())
            }
        };
        *lock(&self.rows) = next;
    }

    pub fn state(&self) -> QueryState<Vec<R::Entity>> {
        lock(&self.rows).clone()
    }

    /// Loaded rows, empty while loading or failed
    pub fn rows(&self) -> Vec<R::Entity> {
        lock(&self.rows).ready().cloned().unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.rows).is_loading()
    }

    pub fn is_disabled(&self) -> bool {
        self.is_loading() || self.hooks.is_pending()
    }

    /// Flip the selection of `id`. Returns whether it is now selected.
    pub fn toggle_selected(&self, id: &str) -> bool {
        let mut selected = lock(&self.selected);
        if selected.remove(id) {
            false
        } else {
            selected.insert(id.to_string());
            true
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        lock(&self.selected).contains(id)
    }

    pub fn select_all(&self) {
        let ids: BTreeSet<String> = self
            .rows()
            .iter()
            .map(|row| R::entity_id(row).to_string())
            .collect();
        *lock(&self.selected) = ids;
    }

    pub fn clear_selection(&self) {
        lock(&self.selected).clear();
    }

    pub fn selected_ids(&self) -> Vec<String> {
        lock(&self.selected).iter().cloned().collect()
    }

    /// Confirm, then delete every selected row with one request.
    /// Returns how many rows were deleted; 0 when disabled, nothing is
    /// selected or the user declined.
    pub async fn delete_selected(&self) -> Result<usize, PageError> {
        let ids = self.selected_ids();
        if ids.is_empty() || self.is_disabled() {
            return Ok(0);
        }
        if !self.bulk_delete_gate.confirm().await? {
            return Ok(0);
        }

        let deleted = self.hooks.bulk_delete(&ids).await?;
        self.clear_selection();
        self.refresh().await;
        Ok(deleted.len())
    }

    /// Confirm, then delete one row. Declining sends nothing.
    pub async fn delete_row(&self, id: &str) -> Result<bool, PageError> {
        if self.is_disabled() {
            return Ok(false);
        }
        if !self.delete_gate.confirm().await? {
            tracing::debug!(page = R::PLURAL, id, "delete declined");
            return Ok(false);
        }

        self.hooks.delete(id).await?;
        lock(&self.selected).remove(id);
        self.refresh().await;
        Ok(true)
    }
}

// ============================================================================
// TRANSACTIONS PAGE
// ============================================================================

pub struct TransactionsPage<A> {
    list: EntityPage<A, Transactions>,
    accounts: EntityHooks<A, Accounts>,
    wizard: Mutex<ImportWizard>,
    account_gate: SelectGate,
    bulk: BulkSubmission<A>,
    submitting: AtomicBool,
    notifier: Arc<dyn Notifier>,
    import_settings: ImportSettings,
}

/// Clears the submitting flag however `submit_import` exits
struct SubmitFlight<'a>(&'a AtomicBool);

impl<'a> SubmitFlight<'a> {
    fn begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SubmitFlight(flag))
    }
}

impl Drop for SubmitFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<A: FinanceApi> TransactionsPage<A> {
    pub fn new(
        transactions: EntityHooks<A, Transactions>,
        accounts: EntityHooks<A, Accounts>,
        notifier: Arc<dyn Notifier>,
        import_settings: ImportSettings,
    ) -> Self {
        TransactionsPage {
            list: EntityPage::new(transactions.clone()),
            accounts,
            wizard: Mutex::new(ImportWizard::new()),
            account_gate: SelectGate::new("Select Account", "Please select an account to continue."),
            bulk: BulkSubmission::new(transactions),
            submitting: AtomicBool::new(false),
            notifier,
            import_settings,
        }
    }

    pub fn list(&self) -> &EntityPage<A, Transactions> {
        &self.list
    }

    pub fn account_gate(&self) -> &SelectGate {
        &self.account_gate
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn view(&self) -> WizardView {
        lock(&self.wizard).view()
    }

    /// Snapshot for rendering the preview
    pub fn wizard(&self) -> ImportWizard {
        lock(&self.wizard).clone()
    }

    pub fn upload(&self, results: ImportResults) -> Result<(), ImportError> {
        lock(&self.wizard).on_upload(results)
    }

    /// Parse a file with the configured import settings, then upload it
    pub fn upload_file(&self, path: &Path) -> Result<(), ImportError> {
        let results = import::load_file(path, &self.import_settings);
        match results.and_then(|results| self.upload(results)) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.notifier.notify(Notification::error(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn cancel_import(&self) {
        lock(&self.wizard).on_cancel();
    }

    /// Apply `edit` to the column mapping. False outside IMPORT.
    pub fn edit_mapping(&self, edit: impl FnOnce(&mut ColumnMapping)) -> bool {
        match lock(&self.wizard).mapping_mut() {
            Some(mapping) => {
                edit(mapping);
                true
            }
            None => false,
        }
    }

    /// Build rows → select account → one bulk create → back to LIST.
    /// Any early exit leaves the wizard in IMPORT with its rows.
    /// A second call while one is in flight fails with `Busy`.
    pub async fn submit_import(&self) -> Result<Vec<Transaction>, SubmitError> {
        let Some(_flight) = SubmitFlight::begin(&self.submitting) else {
            return Err(SubmitError::Busy);
        };

        let prepared = lock(&self.wizard).prepare_rows(&self.import_settings.date_format);
        let rows = match prepared {
            None => return Err(SubmitError::NotImporting),
            Some(Err(err)) => {
                self.notifier.notify(Notification::error(err.to_string()));
                return Err(err.into());
            }
            Some(Ok(rows)) => rows,
        };
        if rows.is_empty() {
            self.notifier.notify(Notification::error("Nothing to import"));
            return Err(SubmitError::NoRows);
        }

        let accounts = self.accounts.list(&()).await.map_err(|err| {
            self.notifier.notify(Notification::error("Failed to load accounts"));
            MutationError::Api(err)
        })?;
        let options = accounts
            .into_iter()
            .map(|account| SelectOption::new(account.name, account.id))
            .collect();

        let Some(account_id) = self.account_gate.select(options).await? else {
            self.notifier
                .notify(Notification::error("Please select an account to continue"));
            return Err(SubmitError::NoAccount);
        };

        let created = self.bulk.submit(rows, &account_id).await?;
        self.cancel_import();
        self.list.refresh().await;
        Ok(created)
    }
}

// ============================================================================
// DASHBOARD
// ============================================================================

/// Every page plus the overview summary, sharing one cache and notifier
pub struct Dashboard<A> {
    pub accounts: AccountsPage<A>,
    pub categories: CategoriesPage<A>,
    pub transactions: TransactionsPage<A>,
    summary_hook: SummaryHook<A>,
    summary_filter: Mutex<TransactionFilter>,
    summary: Mutex<QueryState<Summary>>,
    cache: Arc<QueryCache>,
}

impl<A: FinanceApi> Dashboard<A> {
    pub fn new(api: Arc<A>, notifier: Arc<dyn Notifier>, import_settings: ImportSettings) -> Self {
        let cache = Arc::new(QueryCache::new());
        let account_hooks = EntityHooks::new(api.clone(), cache.clone(), notifier.clone());

        Dashboard {
            accounts: EntityPage::new(account_hooks.clone()),
            categories: EntityPage::new(EntityHooks::new(api.clone(), cache.clone(), notifier.clone())),
            transactions: TransactionsPage::new(
                EntityHooks::new(api.clone(), cache.clone(), notifier.clone()),
                account_hooks,
                notifier,
                import_settings,
            ),
            summary_hook: SummaryHook::new(api, cache.clone()),
            summary_filter: Mutex::new(TransactionFilter::default()),
            summary: Mutex::new(QueryState::Loading),
            cache,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn set_summary_filter(&self, filter: TransactionFilter) {
        *lock(&self.summary_filter) = filter;
    }

    pub async fn refresh_summary(&self) {
        *lock(&self.summary) = QueryState::Loading;
        let filter = lock(&self.summary_filter).clone();

        let next = match self.summary_hook.get(&filter).await {
            Ok(summary) => QueryState::Ready(summary),
            Err(err) => QueryState::Failed(err.to_string()),
        };
        *lock(&self.summary) = next;
    }

    pub fn summary(&self) -> QueryState<Summary> {
        lock(&self.summary).clone()
    }

    /// Reload every page; queries still cached are served without a request
    pub async fn refresh_all(&self) {
        self.accounts.refresh().await;
        self.categories.refresh().await;
        self.transactions.list().refresh().await;
        self.refresh_summary().await;
    }
}
