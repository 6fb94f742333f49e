//! Single-shot background jobs
//!
//! A job runs one blocking operation (an export, a render) on its own thread
//! and reports back over a channel. There is no retry and no cancellation;
//! progress is indeterminate, reported as 0 at start and 100 at the end
//! whether the job succeeds or fails.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};

use super::error::StoreResult;

/// Events emitted by a running job, in order
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started(String),
    Progress(u8),
    Finished(PathBuf),
    Failed(String),
}

/// Handle to a spawned job
pub struct JobHandle {
    tag: String,
    events: Receiver<JobEvent>,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").field("tag", &self.tag).finish()
    }
}

/// Run `job` on a dedicated thread, tagged with the operation name
pub fn spawn<F>(tag: impl Into<String>, job: F) -> JobHandle
where
    F: FnOnce() -> StoreResult<PathBuf> + Send + 'static,
{
    let tag = tag.into();
    let (tx, rx) = unbounded();
    let thread_tag = tag.clone();

    let thread = thread::spawn(move || {
        let _ = tx.send(JobEvent::Started(thread_tag.clone()));
        let _ = tx.send(JobEvent::Progress(0));

        let outcome = panic::catch_unwind(AssertUnwindSafe(job));
        let event = match outcome {
            Ok(Ok(path)) => {
                let _ = tx.send(JobEvent::Progress(100));
                tracing::info!(job = %thread_tag, path = %path.display(), "job finished");
                JobEvent::Finished(path)
            }
            Ok(Err(e)) => {
                let _ = tx.send(JobEvent::Progress(100));
                tracing::warn!(job = %thread_tag, error = %e, "job failed");
                JobEvent::Failed(e.to_string())
            }
            Err(_) => {
                let _ = tx.send(JobEvent::Progress(100));
                tracing::warn!(job = %thread_tag, "job panicked");
                JobEvent::Failed(format!("{} job panicked", thread_tag))
            }
        };
        let _ = tx.send(event);
    });

    JobHandle {
        tag,
        events: rx,
        thread: Some(thread),
    }
}

impl JobHandle {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Block until the job ends, returning its output path or error text
    pub fn wait(mut self) -> Result<PathBuf, String> {
        let mut result = Err(format!("{} job ended without a result", self.tag));
        for event in self.events.iter() {
            match event {
                JobEvent::Finished(path) => {
                    result = Ok(path);
                    break;
                }
                JobEvent::Failed(message) => {
                    result = Err(message);
                    break;
                }
                JobEvent::Started(_) | JobEvent::Progress(_) => {}
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;

    #[test]
    fn test_job_reports_output_path() {
        let handle = spawn("export", || Ok(PathBuf::from("/tmp/out.csv")));
        assert_eq!(handle.tag(), "export");
        assert_eq!(handle.wait(), Ok(PathBuf::from("/tmp/out.csv")));
    }

    #[test]
    fn test_job_event_order() {
        let handle = spawn("render", || Ok(PathBuf::from("a.html")));
        let events: Vec<_> = handle.events.iter().collect();
        assert_eq!(
            events,
            vec![
                JobEvent::Started("render".to_string()),
                JobEvent::Progress(0),
                JobEvent::Progress(100),
                JobEvent::Finished(PathBuf::from("a.html")),
            ]
        );
    }

    #[test]
    fn test_job_error_is_reported_as_text() {
        let handle = spawn("export", || Err(StoreError::validation("path", "bad")));
        let err = handle.wait().unwrap_err();
        assert!(err.contains("bad"));
    }

    #[test]
    fn test_failed_job_still_completes_progress() {
        let handle = spawn("export", || Err(StoreError::validation("path", "bad")));
        let events: Vec<_> = handle.events.iter().collect();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], JobEvent::Progress(100));
        assert!(matches!(&events[3], JobEvent::Failed(msg) if msg.contains("bad")));
    }

    #[test]
    fn test_job_panic_is_reported() {
        let handle = spawn("export", || -> StoreResult<PathBuf> { panic!("boom") });
        let err = handle.wait().unwrap_err();
        assert!(err.contains("panicked"));
    }
}
