#![allow(dead_code)]

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context as TaskContext, Poll},
};

use scoped_di::{AsyncResource, DynError, Factory, SyncResource};

/// Logs to RUST_LOG, once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records what resources and factories did, in order
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);
impl Recorder {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Only the events starting with the prefix, prefix stripped
    pub fn filtered(&self, prefix: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.strip_prefix(prefix))
            .map(str::to_string)
            .collect()
    }
}

/// Counts factory invocations
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);
impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// The value guarded by the test resources
#[derive(Debug, PartialEq, Eq)]
pub struct Connection {
    pub name: &'static str,
}

pub struct SyncTracked {
    pub name: &'static str,
    pub recorder: Recorder,
    pub fail_exit: bool,
}
impl SyncResource for SyncTracked {
    type Target = Connection;

    fn enter(&self) -> Result<Connection, DynError> {
        self.recorder.record(format!("enter {}", self.name));
        Ok(Connection { name: self.name })
    }

    fn exit(&self) -> Result<(), DynError> {
        self.recorder.record(format!("exit {}", self.name));
        match self.fail_exit {
            true => Err(format!("{} refused to close", self.name).into()),
            false => Ok(()),
        }
    }
}

pub struct AsyncTracked {
    pub name: &'static str,
    pub recorder: Recorder,
    pub fail_exit: bool,
}
impl AsyncResource for AsyncTracked {
    type Target = Connection;

    fn enter(&self) -> impl Future<Output = Result<Connection, DynError>> + Send + '_ {
        async move {
            YieldOnce::default().await;
            self.recorder.record(format!("enter {}", self.name));
            Ok(Connection { name: self.name })
        }
    }

    fn exit(&self) -> impl Future<Output = Result<(), DynError>> + Send + '_ {
        async move {
            YieldOnce::default().await;
            self.recorder.record(format!("exit {}", self.name));
            match self.fail_exit {
                true => Err(format!("{} refused to close", self.name).into()),
                false => Ok(()),
            }
        }
    }
}

/// Handler scoped factory of a [`SyncTracked`] resource
pub fn sync_tracked(name: &'static str, recorder: &Recorder) -> Factory {
    let recorder = recorder.clone();
    Factory::builder(name).sync_managed(move |_| {
        Ok::<_, DynError>(SyncTracked {
            name,
            recorder: recorder.clone(),
            fail_exit: false,
        })
    })
}

/// Handler scoped factory of an [`AsyncTracked`] resource
pub fn async_tracked(name: &'static str, recorder: &Recorder) -> Factory {
    tracked_with_exit(name, recorder, false)
}

/// Like [`async_tracked`], but releasing the resource fails
pub fn failing_release(name: &'static str, recorder: &Recorder) -> Factory {
    tracked_with_exit(name, recorder, true)
}

fn tracked_with_exit(name: &'static str, recorder: &Recorder, fail_exit: bool) -> Factory {
    let recorder = recorder.clone();
    Factory::builder(name).async_managed(move |_| {
        Ok::<_, DynError>(AsyncTracked {
            name,
            recorder: recorder.clone(),
            fail_exit,
        })
    })
}

/// Suspends exactly once, so concurrent futures get a chance to interleave
#[derive(Default)]
pub struct YieldOnce(bool);
impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
