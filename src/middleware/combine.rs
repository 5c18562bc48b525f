//! Composition of transform functions.
//!
//! A [`Chain`] runs its stages in order. The value each stage returns becomes
//! the first argument of the next one; the remaining arguments are handed to
//! every stage unchanged.
//!
//! ```
//! use fetchq::middleware::Chain;
//!
//! let chain = Chain::new(|n: i32, _: &str| n + 1).then(|n, suffix| n * suffix.len() as i32);
//! assert_eq!(chain.call(2, "ab"), 6);
//! ```

use std::sync::Arc;

/// An ordered list of transforms sharing their trailing arguments.
pub struct Chain<A, R: ?Sized> {
    #[allow(clippy::type_complexity)]
    stages: Vec<Arc<dyn Fn(A, &R) -> A + Send + Sync>>,
}

impl<A, R: ?Sized> Clone for Chain<A, R> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<A, R: ?Sized> Chain<A, R> {
    /// Start a chain with its first stage.
    pub fn new<F>(first: F) -> Self
    where
        F: Fn(A, &R) -> A + Send + Sync + 'static,
    {
        Self {
            stages: vec![Arc::new(first)],
        }
    }

    /// Append a stage fed by the previous stage's result.
    pub fn then<F>(mut self, next: F) -> Self
    where
        F: Fn(A, &R) -> A + Send + Sync + 'static,
    {
        self.stages.push(Arc::new(next));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order.
    pub fn call(&self, first: A, rest: &R) -> A {
        self.stages.iter().fold(first, |acc, stage| stage(acc, rest))
    }
}
