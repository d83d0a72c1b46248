//! A dedicated thread owning a blocking engine.
//!
//! Jobs run on the engine thread; callers await the reply on a oneshot
//! channel and never block the task polling them.

use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ServiceError;

/// A job and the channel its result goes back on.
struct Job<In, Out> {
    input: In,
    response_tx: oneshot::Sender<Out>,
}

pub(crate) struct Worker<In, Out> {
    jobs: mpsc::Sender<Job<In, Out>>,
}

impl<In, Out> Worker<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Start the thread, build the engine on it with `build`, then serve
    /// jobs with `run` until the worker is dropped. Build errors are returned
    /// here.
    pub(crate) fn spawn<E, B, F>(name: &str, build: B, run: F) -> Result<Self, ServiceError>
    where
        B: FnOnce() -> Result<E, ServiceError> + Send + 'static,
        F: Fn(&E, In) -> Out + Send + 'static,
    {
        let (jobs, job_rx) = mpsc::channel::<Job<In, Out>>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_name = name.to_string();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let engine = match build() {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        engine
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for job in job_rx {
                    // The caller may have given up on the reply.
                    let _ = job.response_tx.send(run(&engine, job.input));
                }
                debug!("{} thread stopped", thread_name);
            })
            .map_err(|e| ServiceError::Ocr(format!("failed to start {} thread: {}", name, e)))?;

        ready_rx
            .recv()
            .map_err(|_| ServiceError::Ocr(format!("{} thread exited during startup", name)))??;

        Ok(Self { jobs })
    }

    /// Run one job on the engine thread. Suspends until it finishes.
    pub(crate) async fn call(&self, input: In) -> Result<Out, ServiceError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.jobs
            .send(Job { input, response_tx })
            .map_err(|_| stopped())?;
        response_rx.await.map_err(|_| stopped())
    }
}

fn stopped() -> ServiceError {
    ServiceError::Ocr("engine thread has stopped".to_string())
}
