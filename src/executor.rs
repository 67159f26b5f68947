use iced::executor;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

/// Runs every session task on one worker thread, so controller futures are
/// scheduled cooperatively and never run in parallel.
#[derive(Debug)]
pub struct SessionExecutor {
    runtime: Arc<Runtime>,
}

impl executor::Executor for SessionExecutor {
    fn new() -> Result<Self, std::io::Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("vault-session")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    fn spawn(&self, future: impl std::future::Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(future);
    }

    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.runtime.enter();
        f()
    }
}
