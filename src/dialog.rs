// Dialog gates - ask the user something and wait for the answer
//
// A controller registers a request (prompt + resolve callback) on a gate.
// The presentation layer polls `pending()` to mount the modal and answers
// through `accept`/`cancel` (confirm) or `choose`/`dismiss` (select). The
// async helpers turn the callback into something a controller can await.
//
// One request per gate at a time; there is no timeout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("a dialog request is already pending")]
    Busy,

    #[error("dialog closed without an answer")]
    Dropped,

    #[error("{0:?} is not one of the offered options")]
    UnknownOption(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        SelectOption {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// What the modal shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogPrompt {
    pub title: String,
    pub description: String,
    /// Empty for confirmation dialogs
    pub options: Vec<SelectOption>,
}

type Resolver<T> = Box<dyn FnOnce(T) + Send>;

struct PendingRequest<T> {
    prompt: DialogPrompt,
    resolve: Resolver<T>,
}

/// Holds at most one pending request. Dropping the request without
/// resolving it drops the callback, which the async helpers see as `Dropped`.
struct Gate<T> {
    title: String,
    description: String,
    pending: Mutex<Option<PendingRequest<T>>>,
}

impl<T: Send + 'static> Gate<T> {
    fn new(title: String, description: String) -> Self {
        Gate {
            title,
            description,
            pending: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingRequest<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prompt_with(&self, options: Vec<SelectOption>) -> DialogPrompt {
        DialogPrompt {
            title: self.title.clone(),
            description: self.description.clone(),
            options,
        }
    }

    fn request(&self, prompt: DialogPrompt, resolve: Resolver<T>) -> Result<(), GateError> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(GateError::Busy);
        }
        tracing::debug!(title = %prompt.title, "dialog opened");
        *slot = Some(PendingRequest { prompt, resolve });
        Ok(())
    }

    async fn ask(&self, prompt: DialogPrompt) -> Result<T, GateError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            prompt,
            Box::new(move |value| {
                // receiver gone means the asking task was dropped
                let _ = tx.send(value);
            }),
        )?;
        rx.await.map_err(|_| GateError::Dropped)
    }

    fn prompt(&self) -> Option<DialogPrompt> {
        self.lock().as_ref().map(|request| request.prompt.clone())
    }

    /// Take the request out, then call the resolver without holding the lock
    fn resolve(&self, value: T) -> bool {
        let request = self.lock().take();
        match request {
            Some(request) => {
                (request.resolve)(value);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// CONFIRMATION GATE
// ============================================================================

/// Yes/no dialog. Cloning shares the same pending slot.
#[derive(Clone)]
pub struct ConfirmGate {
    inner: Arc<Gate<bool>>,
}

impl ConfirmGate {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        ConfirmGate {
            inner: Arc::new(Gate::new(title.into(), description.into())),
        }
    }

    /// Resolves `true` on accept, `false` on cancel
    pub async fn confirm(&self) -> Result<bool, GateError> {
        let prompt = self.inner.prompt_with(Vec::new());
        self.inner.ask(prompt).await
    }

    /// Callback form of `confirm`
    pub fn request(&self, on_answer: impl FnOnce(bool) + Send + 'static) -> Result<(), GateError> {
        let prompt = self.inner.prompt_with(Vec::new());
        self.inner.request(prompt, Box::new(on_answer))
    }

    pub fn pending(&self) -> Option<DialogPrompt> {
        self.inner.prompt()
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    pub fn accept(&self) -> bool {
        self.inner.resolve(true)
    }

    pub fn cancel(&self) -> bool {
        self.inner.resolve(false)
    }
}

// ============================================================================
// SELECTION DIALOG
// ============================================================================

/// Pick one of a list of options, or dismiss
#[derive(Clone)]
pub struct SelectGate {
    inner: Arc<Gate<Option<String>>>,
}

impl SelectGate {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        SelectGate {
            inner: Arc::new(Gate::new(title.into(), description.into())),
        }
    }

    /// Resolves the chosen option's value, or `None` when dismissed
    pub async fn select(&self, options: Vec<SelectOption>) -> Result<Option<String>, GateError> {
        let prompt = self.inner.prompt_with(options);
        self.inner.ask(prompt).await
    }

    pub fn pending(&self) -> Option<DialogPrompt> {
        self.inner.prompt()
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Answer with `value`. Unknown values are rejected and the request
    /// stays pending. Returns `Ok(false)` when nothing was pending.
    pub fn choose(&self, value: &str) -> Result<bool, GateError> {
        let Some(prompt) = self.pending() else {
            return Ok(false);
        };
        if !prompt.options.iter().any(|option| option.value == value) {
            return Err(GateError::UnknownOption(value.to_string()));
        }
        Ok(self.inner.resolve(Some(value.to_string())))
    }

    pub fn dismiss(&self) -> bool {
        self.inner.resolve(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn wait_until(check: impl Fn() -> bool) {
        while !check() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_confirm_accept_and_cancel() {
        let gate = ConfirmGate::new("Are you sure?", "You are about to delete this account.");

        let answer = gate.clone();
        let (accepted, _) = tokio::join!(gate.confirm(), async {
            wait_until(|| answer.is_pending()).await;
            assert_eq!(answer.pending().unwrap().title, "Are you sure?");
            answer.accept()
        });
        assert_eq!(accepted, Ok(true));
        assert!(!gate.is_pending());

        let answer = gate.clone();
        let (declined, _) = tokio::join!(gate.confirm(), async {
            wait_until(|| answer.is_pending()).await;
            answer.cancel()
        });
        assert_eq!(declined, Ok(false));
    }

    #[test]
    fn test_second_request_is_busy() {
        let gate = ConfirmGate::new("Confirm", "");
        let seen = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&seen);

        gate.request(move |answer| flag.store(answer, Ordering::SeqCst)).unwrap();
        assert_eq!(gate.request(|_| {}), Err(GateError::Busy));

        assert!(gate.accept());
        assert!(seen.load(Ordering::SeqCst));
        assert!(!gate.accept());
    }

    #[tokio::test]
    async fn test_select_rejects_unknown_option() {
        let gate = SelectGate::new("Select Account", "Please select an account to continue.");
        let options = vec![SelectOption::new("Checking", "acc-1"), SelectOption::new("Savings", "acc-2")];

        let answer = gate.clone();
        let (chosen, _) = tokio::join!(gate.select(options), async {
            wait_until(|| answer.is_pending()).await;
            assert_eq!(answer.choose("acc-9"), Err(GateError::UnknownOption("acc-9".to_string())));
            assert!(answer.is_pending());
            answer.choose("acc-2").unwrap()
        });

        assert_eq!(chosen, Ok(Some("acc-2".to_string())));
    }

    #[tokio::test]
    async fn test_select_dismiss_resolves_none() {
        let gate = SelectGate::new("Select Account", "");

        let answer = gate.clone();
        let (chosen, dismissed) = tokio::join!(gate.select(Vec::new()), async {
            wait_until(|| answer.is_pending()).await;
            answer.dismiss()
        });

        assert!(dismissed);
        assert_eq!(chosen, Ok(None));
        assert_eq!(gate.choose("anything"), Ok(false));
    }
}
