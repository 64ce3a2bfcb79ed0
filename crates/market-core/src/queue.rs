//! Deferred async work tagged by product
//!
//! The queue never runs anything on its own. Callers push tasks as products
//! change and drain them with [`Queue::execute`] when convenient.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{try_join_all, LocalBoxFuture};
use futures::FutureExt;

use crate::error::{MarketError, MarketResult, TaskError};

type Work = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<(), TaskError>>>;

/// A unit of deferred async work associated with a product.
#[derive(Clone)]
pub struct Task {
    product: String,
    work: Work,
}

impl Task {
    /// Wrap `work` for `product`. `work` is called once when the queue drains.
    pub fn new<F, Fut>(product: impl Into<String>, work: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<(), TaskError>> + 'static,
    {
        Self {
            product: product.into(),
            work: Rc::new(move || work().boxed_local()),
        }
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Start the work.
    pub fn run(&self) -> LocalBoxFuture<'static, Result<(), TaskError>> {
        (self.work)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("product", &self.product)
            .finish_non_exhaustive()
    }
}

/// FIFO list of pending tasks.
#[derive(Debug, Default)]
pub struct Queue {
    tasks: RefCell<Vec<Task>>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task.
    pub fn push(&self, task: Task) {
        self.tasks.borrow_mut().push(task);
    }

    /// Drop every pending task tagged with `product`.
    pub fn remove(&self, product: &str) {
        self.tasks.borrow_mut().retain(|task| task.product != product);
    }

    /// Drop every pending task.
    pub fn cancel(&self) {
        self.tasks.borrow_mut().clear();
    }

    /// Snapshot of the pending tasks.
    pub fn list(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Take every pending task and run them concurrently.
    ///
    /// The queue is empty as soon as this is called, so tasks pushed while the
    /// batch is running wait for the next call. Resolves once all tasks have
    /// finished, or with the first failure.
    pub async fn execute(&self) -> MarketResult<()> {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        if tasks.is_empty() {
            return Ok(());
        }

        tracing::debug!(tasks = tasks.len(), "draining queue");

        let runs = tasks.into_iter().map(|task| {
            let product = task.product.clone();
            task.run()
                .map(move |result| result.map_err(|source| MarketError::Task { product, source }))
        });

        try_join_all(runs).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn noop(product: &str) -> Task {
        Task::new(product, || async { Ok::<(), TaskError>(()) })
    }

    #[test]
    fn test_push_and_list() {
        let queue = Queue::new();
        queue.push(noop("a"));
        queue.push(noop("b"));
        queue.push(noop("a"));

        let products: Vec<String> = queue.list().iter().map(|t| t.product().to_string()).collect();
        assert_eq!(products, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let queue = Queue::new();
        queue.push(noop("a"));

        let snapshot = queue.list();
        queue.cancel();

        assert_eq!(snapshot.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_by_product() {
        let queue = Queue::new();
        queue.push(noop("a"));
        queue.push(noop("b"));
        queue.push(noop("a"));

        queue.remove("a");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.list()[0].product(), "b");

        queue.remove("missing");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_runs_each_task_once() {
        let queue = Queue::new();
        let runs = Rc::new(Cell::new(0));

        for product in ["a", "b", "c"] {
            let runs = runs.clone();
            queue.push(Task::new(product, move || {
                let runs = runs.clone();
                async move {
                    runs.set(runs.get() + 1);
                    Ok::<(), TaskError>(())
                }
            }));
        }

        queue.execute().await.unwrap();
        assert_eq!(runs.get(), 3);
        assert!(queue.is_empty());

        queue.execute().await.unwrap();
        assert_eq!(runs.get(), 3);
    }

    #[tokio::test]
    async fn test_execute_reports_failing_product() {
        let queue = Queue::new();
        queue.push(noop("a"));
        queue.push(Task::new("b", || async { Err(TaskError::from("offline")) }));

        let err = queue.execute().await.unwrap_err();
        match err {
            MarketError::Task { product, source } => {
                assert_eq!(product, "b");
                assert_eq!(source, TaskError::from("offline"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(queue.is_empty());
    }
}
