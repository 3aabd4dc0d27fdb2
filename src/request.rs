use crate::error::{CommError, Result};
use tokio::sync::oneshot;

/// Completion handle returned by every collective call.
///
/// Output buffers must not be read before the request has been waited on.
/// Requests from the thread backend are already complete when returned;
/// asynchronous backends hand out pending requests and resolve them through a
/// [`RequestCompleter`].
#[must_use = "a request must be waited on before its output buffers are read"]
#[derive(Debug)]
pub struct Request {
    state: State,
}

#[derive(Debug)]
enum State {
    Ready(Result<()>),
    Pending(oneshot::Receiver<Result<()>>),
}

impl Request {
    /// A request whose work has already finished successfully.
    pub fn completed() -> Self {
        Self {
            state: State::Ready(Ok(())),
        }
    }

    /// A request that resolves when the returned completer fires.
    pub fn pending() -> (RequestCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (
            RequestCompleter { tx },
            Self {
                state: State::Pending(rx),
            },
        )
    }

    /// Poll for completion without blocking.
    pub fn test(&mut self) -> bool {
        let State::Pending(rx) = &mut self.state else {
            return true;
        };
        match rx.try_recv() {
            Ok(result) => {
                self.state = State::Ready(result);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.state = State::Ready(Err(CommError::RequestAbandoned));
                true
            }
        }
    }

    /// Block the calling thread until the work completes and propagate its
    /// error.
    ///
    /// Must not be called from inside an async runtime while the request is
    /// still pending; use [`wait_async`](Self::wait_async) there.
    pub fn wait(self) -> Result<()> {
        match self.state {
            State::Ready(result) => result,
            State::Pending(rx) => rx.blocking_recv().map_err(|_| CommError::RequestAbandoned)?,
        }
    }

    /// Await completion.
    pub async fn wait_async(self) -> Result<()> {
        match self.state {
            State::Ready(result) => result,
            State::Pending(rx) => rx.await.map_err(|_| CommError::RequestAbandoned)?,
        }
    }
}

/// Resolves the pending [`Request`] it was created with.
///
/// Dropping it without calling [`complete`](Self::complete) resolves the
/// request with `RequestAbandoned`.
#[derive(Debug)]
pub struct RequestCompleter {
    tx: oneshot::Sender<Result<()>>,
}

impl RequestCompleter {
    pub fn complete(self, result: Result<()>) {
        // The request may already have been dropped; nobody is left to tell.
        let _ = self.tx.send(result);
    }
}

/// A set of requests that can be waited on together.
#[derive(Debug, Default)]
pub struct RequestGroup {
    requests: Vec<Request>,
}

impl RequestGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request to the group.
    pub fn push(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Wait for every request.
    ///
    /// Returns the first error encountered, if any. All requests are waited
    /// on regardless of errors.
    pub fn wait_all(self) -> Result<()> {
        let mut first_err = None;
        for request in self.requests {
            if let Err(e) = request.wait()
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Async counterpart of [`wait_all`](Self::wait_all).
    pub async fn wait_all_async(self) -> Result<()> {
        let results =
            futures::future::join_all(self.requests.into_iter().map(Request::wait_async)).await;
        results.into_iter().collect()
    }
}
