//! Ordered multi-step command sequences.
//!
//! A [`CommandSeq`] runs asynchronous steps one after another. Each step
//! receives the shared context and a completion; the next step starts only
//! when the previous completion is called with success. A failing step
//! stops the sequence and the caller's completion receives
//! [`EngineError::StepFailed`].

use std::collections::VecDeque;

use tracing::debug;

use crate::error::EngineError;

/// Completion callback: called exactly once with the final result.
pub type Completion<C> = Box<dyn FnOnce(&mut C, Result<(), EngineError>)>;

/// One step: starts work and arranges for the completion to be called.
pub type Step<C> = Box<dyn FnOnce(&mut C, Completion<C>)>;

/// An ordered list of asynchronous steps.
pub struct CommandSeq<C> {
    name: String,
    steps: VecDeque<(String, Step<C>)>,
    index: usize,
}

impl<C: 'static> std::fmt::Debug for CommandSeq<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSeq")
            .field("name", &self.name)
            .field("steps", &self.labels())
            .finish()
    }
}

impl<C: 'static> CommandSeq<C> {
    /// Create an empty sequence.
    pub fn new(name: impl Into<String>) -> Self {
        CommandSeq {
            name: name.into(),
            steps: VecDeque::new(),
            index: 0,
        }
    }

    /// Append a step.
    pub fn add<F>(&mut self, label: impl Into<String>, step: F) -> &mut Self
    where
        F: FnOnce(&mut C, Completion<C>) + 'static,
    {
        self.steps.push_back((label.into(), Box::new(step)));
        self
    }

    /// Sequence name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels of the steps not yet started.
    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Number of steps not yet started.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Start the sequence. An empty sequence completes immediately.
    pub fn run(self, ctx: &mut C, on_done: Completion<C>) {
        self.run_next(ctx, on_done);
    }

    fn run_next(mut self, ctx: &mut C, on_done: Completion<C>) {
        let Some((label, step)) = self.steps.pop_front() else {
            debug!("[{}] sequence complete", self.name);
            on_done(ctx, Ok(()));
            return;
        };

        let index = self.index;
        self.index += 1;
        debug!("[{}] step {}: {}", self.name, index, label);

        step(
            ctx,
            Box::new(move |ctx: &mut C, result: Result<(), EngineError>| match result {
                Ok(()) => self.run_next(ctx, on_done),
                Err(err) => {
                    debug!("[{}] step {} ({}) failed: {}", self.name, index, label, err);
                    on_done(
                        ctx,
                        Err(EngineError::StepFailed {
                            step: index,
                            label,
                            source: Box::new(err),
                        }),
                    );
                }
            }),
        );
    }
}
