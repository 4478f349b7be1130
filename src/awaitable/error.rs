use std::fmt;

/// Failure of a task, one of its steps, or one of its callbacks.
#[derive(Debug)]
pub enum TaskError {
    /// The task was polled again after it finished (or was cancelled).
    Reused,
    /// More steps were queued than the task can hold.
    StepOverflow { capacity: usize },
    /// A slot table is full.
    SlotOverflow { capacity: usize },
    /// No slot at this index.
    SlotMissing { index: usize },
    /// The slot holds a value of another type.
    SlotType { index: usize, expected: &'static str },
    /// Allocation failed inside the engine.
    OutOfMemory,
    /// A task returned to the pool before it finished.
    InFlight,
    /// Error raised by an awaited operation or a callback.
    Failed(anyhow::Error),
}

impl TaskError {
    /// Wrap any error raised by an awaited operation.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Failed(err.into())
    }

    /// Downcast the wrapped error, if this is a [`TaskError::Failed`].
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            TaskError::Failed(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// True for errors that come from the engine itself rather than from user code.
    #[must_use]
    pub fn is_engine_error(&self) -> bool {
        !matches!(self, TaskError::Failed(_))
    }

    /// Convert into an `anyhow::Error`, unwrapping [`TaskError::Failed`].
    #[must_use]
    pub fn into_anyhow(self) -> anyhow::Error {
        match self {
            TaskError::Failed(err) => err,
            other => anyhow::Error::new(other),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Reused => f.write_str("cannot reuse awaitable"),
            TaskError::StepOverflow { capacity } => {
                write!(f, "awaitable has a capacity of {capacity} pending steps")
            }
            TaskError::SlotOverflow { capacity } => write!(f, "array has a capacity of {capacity}"),
            TaskError::SlotMissing { index } => write!(f, "no saved value at index {index}"),
            TaskError::SlotType { index, expected } => {
                write!(f, "saved value at index {index} is not a {expected}")
            }
            TaskError::OutOfMemory => f.write_str("out of memory"),
            TaskError::InFlight => f.write_str("task released while still in flight"),
            TaskError::Failed(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Failed(err)
    }
}

/// Failure returned by a success callback.
#[derive(Debug)]
pub enum CallbackError {
    /// Route the error to the step's error callback.
    Raise(TaskError),
    /// Fail the task immediately, skipping the step's error callback.
    Defer(TaskError),
}

impl From<TaskError> for CallbackError {
    fn from(err: TaskError) -> Self {
        CallbackError::Raise(err)
    }
}

impl From<anyhow::Error> for CallbackError {
    fn from(err: anyhow::Error) -> Self {
        CallbackError::Raise(TaskError::Failed(err))
    }
}

/// Decision of an error callback.
#[derive(Debug)]
pub enum ErrorOutcome {
    /// The error is consumed; the task carries on with its next step.
    Handled,
    /// The original error fails the task.
    Reraise,
    /// This error fails the task instead of the original.
    Replace(TaskError),
}
