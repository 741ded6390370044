//! Undo stack for multi-step backend mutations.
//!
//! A [`CompensationScope`] collects undo actions as the steps of an
//! operation succeed. When a later step fails, [`CompensationScope::check`]
//! runs the collected actions newest first and hands back the original
//! error. Undo failures are logged and swallowed so they never mask the
//! error that triggered the rollback.
//!
//! ```ignore
//! let mut scope = CompensationScope::new("create volume");
//! let volume = storage.create_volume(&request).await?;
//! scope.register("delete backend volume", move || {
//!     Box::pin(async move { storage.delete_volume(&volume.id).await.map_err(Into::into) })
//! });
//! let item = scope.check(mapping.add(kind, &volume.id).await).await?;
//! scope.commit();
//! ```

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

/// Error type returned by undo actions.
pub type UndoError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by an undo action.
pub type UndoFuture<'a> = Pin<Box<dyn Future<Output = Result<(), UndoError>> + Send + 'a>>;

type UndoAction<'a> = Box<dyn FnOnce() -> UndoFuture<'a> + Send + 'a>;

/// Stack of undo actions guarding one unit of work.
#[must_use = "a scope must be committed or unwound"]
pub struct CompensationScope<'a> {
    operation: &'static str,
    actions: Vec<(&'static str, UndoAction<'a>)>,
}

impl<'a> CompensationScope<'a> {
    /// Opens an empty scope for the named operation.
    pub const fn new(operation: &'static str) -> Self {
        Self {
            operation,
            actions: Vec::new(),
        }
    }

    /// Registers an undo action for a mutation that just succeeded.
    pub fn register<F>(&mut self, description: &'static str, action: F)
    where
        F: FnOnce() -> UndoFuture<'a> + Send + 'a,
    {
        self.actions.push((description, Box::new(action)));
    }

    /// Number of undo actions waiting to run.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.actions.len()
    }

    /// Passes a step's result through, unwinding the scope first when the
    /// step failed.
    ///
    /// # Errors
    ///
    /// Returns the step's own error unchanged after every registered undo
    /// action has run.
    pub async fn check<T, E: Display>(&mut self, result: Result<T, E>) -> Result<T, E> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let cause = err.to_string();
                self.unwind(&cause).await;
                Err(err)
            }
        }
    }

    /// Runs every registered undo action, newest first, and empties the
    /// scope.
    pub async fn unwind(&mut self, cause: &str) {
        debug!(
            operation = self.operation,
            pending = self.actions.len(),
            cause,
            "unwinding compensation scope"
        );
        while let Some((description, action)) = self.actions.pop() {
            if let Err(err) = action().await {
                warn!(
                    operation = self.operation,
                    undo = description,
                    error = %err,
                    "undo action failed; continuing rollback"
                );
            }
        }
    }

    /// Ends the scope successfully; registered actions are discarded.
    pub fn commit(mut self) {
        self.actions.clear();
    }
}

impl Drop for CompensationScope<'_> {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            warn!(
                operation = self.operation,
                pending = self.actions.len(),
                "compensation scope abandoned with pending undo actions; nothing was rolled back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, PoisonError};

    use super::*;

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<&'static str>>>);

    impl Journal {
        fn record(&self, entry: &'static str) {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry);
        }

        fn entries(&self) -> Vec<&'static str> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    fn recording(
        journal: &Journal,
        entry: &'static str,
    ) -> impl FnOnce() -> UndoFuture<'static> + use<> {
        let handle = journal.clone();
        move || {
            Box::pin(async move {
                handle.record(entry);
                Ok(())
            })
        }
    }

    fn failing(
        journal: &Journal,
        entry: &'static str,
    ) -> impl FnOnce() -> UndoFuture<'static> + use<> {
        let handle = journal.clone();
        move || {
            Box::pin(async move {
                handle.record(entry);
                Err(UndoError::from("undo exploded"))
            })
        }
    }

    #[tokio::test]
    async fn failure_unwinds_in_reverse_registration_order() {
        let journal = Journal::default();
        let mut scope = CompensationScope::new("test");
        scope.register("first", recording(&journal, "first"));
        scope.register("second", recording(&journal, "second"));
        scope.register("third", recording(&journal, "third"));

        let result: Result<(), &str> = scope.check(Err("boom")).await;

        assert_eq!(result, Err("boom"));
        assert_eq!(journal.entries(), vec!["third", "second", "first"]);
        assert_eq!(scope.pending(), 0);
        scope.commit();
    }

    #[tokio::test]
    async fn undo_failures_do_not_stop_the_rollback_or_replace_the_error() {
        let journal = Journal::default();
        let mut scope = CompensationScope::new("test");
        scope.register("first", recording(&journal, "first"));
        scope.register("second", failing(&journal, "second"));

        let result: Result<(), String> = scope.check(Err(String::from("original"))).await;

        assert_eq!(result, Err(String::from("original")));
        assert_eq!(journal.entries(), vec!["second", "first"]);
        scope.commit();
    }

    #[tokio::test]
    async fn success_passes_values_through_without_running_undo() {
        let journal = Journal::default();
        let mut scope = CompensationScope::new("test");
        scope.register("first", recording(&journal, "first"));

        let value = scope.check(Ok::<_, String>(7)).await;
        assert_eq!(value, Ok(7));
        assert_eq!(scope.pending(), 1);

        scope.commit();
        assert!(journal.entries().is_empty());
    }
}
