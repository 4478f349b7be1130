//! # Awaitable Engine
//!
//! [`Task`] lets dispatch code chain asynchronous steps with plain callbacks
//! instead of writing one large `async` block per request path. Each step is a
//! boxed future plus an optional success callback and error callback; the
//! callbacks receive the task itself so they can queue further steps or stash
//! state in its [`Slots`].
//!
//! Finished tasks are recycled through a [`TaskPool`].

mod error;
mod pool;
mod slots;
mod task;

pub use error::{CallbackError, ErrorOutcome, TaskError};
pub use pool::{TaskPool, DEFAULT_POOL_SIZE};
pub use slots::{Slots, SLOT_CAPACITY};
pub use task::{Callbacks, Task, MAX_PENDING_STEPS};

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::future::{ready, BoxFuture};
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn step(log: &Log, name: &'static str) -> BoxFuture<'static, Result<&'static str, TaskError>> {
        let log = Arc::clone(log);
        async move {
            log.lock().unwrap().push(name);
            Ok(name)
        }
        .boxed()
    }

    fn failing() -> BoxFuture<'static, Result<&'static str, TaskError>> {
        ready(Err(TaskError::failed(anyhow::anyhow!("boom")))).boxed()
    }

    #[test]
    fn test_steps_added_from_callbacks_run_after_existing_ones() {
        let log: Log = Arc::default();
        let mut task = Task::new();
        let inner = Arc::clone(&log);
        task.add_await(
            step(&log, "A"),
            Callbacks::then(move |task: &mut Task<&'static str>, _| {
                task.add_await(step(&inner, "C"), Callbacks::none())?;
                Ok(())
            }),
        )
        .unwrap();
        task.add_await(step(&log, "B"), Callbacks::none()).unwrap();

        block_on(task).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_result_is_what_callbacks_set() {
        let mut task = Task::new();
        task.add_await(
            ready(Ok(41)),
            Callbacks::then(|task: &mut Task<i32>, v| {
                task.set_result(v + 1);
                Ok(())
            }),
        )
        .unwrap();
        assert_eq!(block_on(task).unwrap(), Some(42));
    }

    #[test]
    fn test_handled_error_continues() {
        let log: Log = Arc::default();
        let mut task = Task::new();
        task.add_await(
            failing(),
            Callbacks::catch(|_, err| {
                assert_eq!(err.to_string(), "boom");
                ErrorOutcome::Handled
            }),
        )
        .unwrap();
        task.add_await(step(&log, "after"), Callbacks::none()).unwrap();
        block_on(task).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_unhandled_error_drops_remaining_steps() {
        let log: Log = Arc::default();
        let mut task = Task::new();
        task.add_await(failing(), Callbacks::catch(|_, _| ErrorOutcome::Reraise))
            .unwrap();
        task.add_await(step(&log, "never"), Callbacks::none()).unwrap();
        let err = block_on(&mut task).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(log.lock().unwrap().is_empty());
        assert!(matches!(block_on(&mut task), Err(TaskError::Reused)));
    }

    #[test]
    fn test_error_callback_can_replace_error() {
        let mut task: Task<&'static str> = Task::new();
        task.add_await(
            failing(),
            Callbacks::catch(|_, _| ErrorOutcome::Replace(TaskError::OutOfMemory)),
        )
        .unwrap();
        assert!(matches!(block_on(task), Err(TaskError::OutOfMemory)));
    }

    #[test]
    fn test_success_callback_raise_reaches_error_callback() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut task = Task::new();
        task.add_await(
            ready(Ok(1)),
            Callbacks::then(|_: &mut Task<i32>, _| {
                Err(CallbackError::Raise(TaskError::failed(anyhow::anyhow!("bad value"))))
            })
            .and_catch(move |_, err| {
                *sink.lock().unwrap() = Some(err.to_string());
                ErrorOutcome::Handled
            }),
        )
        .unwrap();
        assert_eq!(block_on(task).unwrap(), None);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("bad value"));
    }

    #[test]
    fn test_deferred_callback_error_skips_error_callback() {
        let mut task = Task::new();
        task.add_await(
            ready(Ok(1)),
            Callbacks::then(|_: &mut Task<i32>, _| Err(CallbackError::Defer(TaskError::InFlight)))
                .and_catch(|_, _| ErrorOutcome::Handled),
        )
        .unwrap();
        assert!(matches!(block_on(task), Err(TaskError::InFlight)));
    }

    #[test]
    fn test_step_capacity() {
        let mut task: Task<()> = Task::new();
        for _ in 0..MAX_PENDING_STEPS {
            task.add_await(ready(Ok(())), Callbacks::none()).unwrap();
        }
        assert!(matches!(
            task.add_await(ready(Ok(())), Callbacks::none()),
            Err(TaskError::StepOverflow { capacity: 128 })
        ));
    }

    #[tokio::test]
    async fn test_pending_steps_resume() {
        let mut task = Task::new();
        task.add_await(
            async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Ok("slept")
            },
            Callbacks::then(|task: &mut Task<&'static str>, v| {
                task.set_result(v);
                Ok(())
            }),
        )
        .unwrap();
        assert_eq!(task.await.unwrap(), Some("slept"));
    }

    #[test]
    fn test_pool_recycles_only_finished_tasks() {
        let pool: TaskPool<()> = TaskPool::new(2);
        let mut task = pool.acquire();
        task.slots_mut().save_int(5).unwrap();
        task.add_await(ready(Ok(())), Callbacks::none()).unwrap();
        assert!(matches!(pool.release(task), Err(TaskError::InFlight)));
        assert_eq!(pool.idle(), 0);

        let mut task = pool.acquire();
        task.slots_mut().save_int(5).unwrap();
        block_on(&mut task).unwrap();
        pool.release(task).unwrap();
        assert_eq!(pool.idle(), 1);

        let reused = pool.acquire();
        assert!(!reused.is_done());
        assert_eq!(reused.slots().int_count(), 0);
    }

    #[test]
    fn test_cancel_drops_outstanding_steps() {
        let mut task: Task<()> = Task::new();
        task.add_await(ready(Ok(())), Callbacks::none()).unwrap();
        task.add_await(ready(Ok(())), Callbacks::none()).unwrap();
        assert_eq!(task.cancel(), 2);
        assert!(task.is_done());
    }
}
