use super::error::{CallbackError, ErrorOutcome, TaskError};
use super::slots::Slots;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// Maximum number of steps queued on a task at once.
pub const MAX_PENDING_STEPS: usize = 128;

type OnSuccess<T> = Box<dyn FnOnce(&mut Task<T>, T) -> Result<(), CallbackError> + Send>;
type OnError<T> = Box<dyn FnOnce(&mut Task<T>, &TaskError) -> ErrorOutcome + Send>;

/// Callbacks attached to a single awaited step.
pub struct Callbacks<T> {
    on_success: Option<OnSuccess<T>>,
    on_error: Option<OnError<T>>,
}

impl<T: Send + 'static> Callbacks<T> {
    #[must_use]
    pub fn none() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }

    /// Run `f` with the step's value when it succeeds.
    pub fn then<F>(f: F) -> Self
    where
        F: FnOnce(&mut Task<T>, T) -> Result<(), CallbackError> + Send + 'static,
    {
        Self {
            on_success: Some(Box::new(f)),
            on_error: None,
        }
    }

    /// Run `f` when the step (or its success callback) raises.
    pub fn catch<F>(f: F) -> Self
    where
        F: FnOnce(&mut Task<T>, &TaskError) -> ErrorOutcome + Send + 'static,
    {
        Self::none().and_catch(f)
    }

    #[must_use]
    pub fn and_catch<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Task<T>, &TaskError) -> ErrorOutcome + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }
}

struct Step<T> {
    future: BoxFuture<'static, Result<T, TaskError>>,
    callbacks: Callbacks<T>,
}

/// A composite future: an ordered queue of awaited steps with callbacks.
///
/// Steps run one after another in the order they were added. A callback may
/// add more steps; they go to the back of the queue. When a step fails (or
/// its success callback raises), its error callback decides whether the task
/// carries on. Without an error callback the task fails with the error and
/// every remaining step is dropped.
///
/// The task resolves to the value set by [`Task::set_result`], if any. A
/// finished task cannot be polled again; it reports [`TaskError::Reused`].
pub struct Task<T> {
    queue: VecDeque<Step<T>>,
    current: Option<Step<T>>,
    slots: Slots,
    result: Option<T>,
    done: bool,
}

// No pinned projection into `T` is ever created.
impl<T> Unpin for Task<T> {}

impl<T: Send + 'static> Default for Task<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Task<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            slots: Slots::new(),
            result: None,
            done: false,
        }
    }

    /// Queue `future` behind every step already added.
    pub fn add_await<F>(&mut self, future: F, callbacks: Callbacks<T>) -> Result<(), TaskError>
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        if self.queue.len() >= MAX_PENDING_STEPS {
            return Err(TaskError::StepOverflow {
                capacity: MAX_PENDING_STEPS,
            });
        }
        self.queue
            .try_reserve(1)
            .map_err(|_| TaskError::OutOfMemory)?;
        self.queue.push_back(Step {
            future: future.boxed(),
            callbacks,
        });
        Ok(())
    }

    /// Set the value the task resolves to. Later calls overwrite earlier ones.
    pub fn set_result(&mut self, value: T) {
        self.result = Some(value);
    }

    #[must_use]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut Slots {
        &mut self.slots
    }

    /// Steps still waiting to run, excluding the one in progress.
    #[must_use]
    pub fn pending_steps(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Drop every outstanding step and mark the task finished.
    ///
    /// Returns how many steps were dropped.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.queue.len() + usize::from(self.current.is_some());
        self.queue.clear();
        self.current = None;
        self.done = true;
        dropped
    }

    /// Return a finished task to its pristine state, keeping its allocations.
    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.current = None;
        self.slots.clear();
        self.result = None;
        self.done = false;
    }

    fn fail(&mut self, err: TaskError) -> Poll<Result<Option<T>, TaskError>> {
        trace!(error = %err, dropped = self.queue.len(), "task failed");
        self.cancel();
        Poll::Ready(Err(err))
    }

    fn fire_error(&mut self, on_error: Option<OnError<T>>, err: TaskError) -> Result<(), TaskError> {
        let Some(on_error) = on_error else {
            return Err(err);
        };
        match on_error(self, &err) {
            ErrorOutcome::Handled => Ok(()),
            ErrorOutcome::Reraise => Err(err),
            ErrorOutcome::Replace(replacement) => Err(replacement),
        }
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = Result<Option<T>, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(Err(TaskError::Reused));
        }

        loop {
            let mut step = match this.current.take().or_else(|| this.queue.pop_front()) {
                Some(step) => step,
                None => {
                    this.done = true;
                    return Poll::Ready(Ok(this.result.take()));
                }
            };

            let outcome = match step.future.as_mut().poll(cx) {
                Poll::Pending => {
                    this.current = Some(step);
                    return Poll::Pending;
                }
                Poll::Ready(outcome) => outcome,
            };

            let Callbacks {
                on_success,
                on_error,
            } = step.callbacks;

            let raised = match outcome {
                Ok(value) => match on_success {
                    None => continue,
                    Some(on_success) => match on_success(this, value) {
                        Ok(()) => continue,
                        Err(CallbackError::Defer(err)) => return this.fail(err),
                        Err(CallbackError::Raise(err)) => err,
                    },
                },
                Err(err) => err,
            };

            if let Err(err) = this.fire_error(on_error, raised) {
                return this.fail(err);
            }
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("pending", &self.queue.len())
            .field("in_progress", &self.current.is_some())
            .field("slots", &self.slots)
            .field("done", &self.done)
            .finish()
    }
}
