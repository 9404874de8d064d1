//! Sequential preload of bootstrap groups.
//!
//! A preload job walks its groups strictly in order; the next group is only
//! requested once the previous load has resolved. After the `i`-th group
//! (0-indexed) is attempted, progress `i / count` is reported, whether or not
//! the load succeeded. Completion fires after the last group.

use crate::content::JobId;
use slotmap::SlotMap;

pub type ProgressCallback = Box<dyn FnMut(f32)>;
pub type CompleteCallback = Box<dyn FnOnce()>;

struct PreloadJob {
    groups: Vec<String>,
    next: usize,
    failures: usize,
    on_progress: ProgressCallback,
    on_complete: CompleteCallback,
}

/// Active preload jobs
#[derive(Default)]
pub struct PreloadSequencer {
    jobs: SlotMap<JobId, PreloadJob>,
}

impl PreloadSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; an empty group list completes at once and yields `None`
    pub fn start(
        &mut self,
        groups: Vec<String>,
        on_progress: impl FnMut(f32) + 'static,
        on_complete: impl FnOnce() + 'static,
    ) -> Option<JobId> {
        if groups.is_empty() {
            on_complete();
            return None;
        }

        tracing::info!(groups = groups.len(), "preload started");
        Some(self.jobs.insert(PreloadJob {
            groups,
            next: 0,
            failures: 0,
            on_progress: Box::new(on_progress),
            on_complete: Box::new(on_complete),
        }))
    }

    /// Group the job is currently waiting on
    pub fn current_group(&self, job: JobId) -> Option<&str> {
        let job = self.jobs.get(job)?;
        job.groups.get(job.next).map(String::as_str)
    }

    /// Record the outcome of the current group; returns `true` while groups remain
    pub fn group_finished(&mut self, id: JobId, loaded: bool) -> bool {
        let Some(job) = self.jobs.get_mut(id) else {
            return false;
        };

        let count = job.groups.len();
        if !loaded {
            job.failures += 1;
            tracing::warn!(
                group = %job.groups[job.next],
                "preload group failed, continuing"
            );
        }
        (job.on_progress)(job.next as f32 / count as f32);
        job.next += 1;

        if job.next < count {
            return true;
        }

        if let Some(job) = self.jobs.remove(id) {
            tracing::info!(groups = count, failures = job.failures, "preload finished");
            (job.on_complete)();
        }
        false
    }

    pub fn is_active(&self, job: JobId) -> bool {
        self.jobs.contains_key(job)
    }

    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_empty_completes_immediately() {
        let mut sequencer = PreloadSequencer::new();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        let progress = Rc::new(Cell::new(0));
        let calls = progress.clone();

        let job = sequencer.start(
            Vec::new(),
            move |_| calls.set(calls.get() + 1),
            move || flag.set(true),
        );
        assert!(job.is_none());
        assert!(done.get());
        assert_eq!(progress.get(), 0);
    }

    #[test]
    fn test_progress_per_group_regardless_of_failure() {
        let mut sequencer = PreloadSequencer::new();
        let progress = Rc::new(RefCell::new(Vec::new()));
        let sink = progress.clone();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();

        let job = sequencer
            .start(
                groups(&["a", "b", "c"]),
                move |p| sink.borrow_mut().push(p),
                move || flag.set(true),
            )
            .unwrap();

        assert_eq!(sequencer.current_group(job), Some("a"));
        assert!(sequencer.group_finished(job, true));
        assert_eq!(sequencer.current_group(job), Some("b"));
        assert!(sequencer.group_finished(job, false));
        assert!(!done.get());
        assert!(!sequencer.group_finished(job, true));

        assert!(done.get());
        assert_eq!(*progress.borrow(), vec![0.0, 1.0 / 3.0, 2.0 / 3.0]);
        assert!(!sequencer.is_active(job));
        assert_eq!(sequencer.current_group(job), None);
    }

    #[test]
    fn test_jobs_are_independent() {
        let mut sequencer = PreloadSequencer::new();
        let first = sequencer.start(groups(&["a"]), |_| {}, || {}).unwrap();
        let second = sequencer.start(groups(&["b", "c"]), |_| {}, || {}).unwrap();
        assert_eq!(sequencer.active_jobs(), 2);

        assert!(!sequencer.group_finished(first, true));
        assert_eq!(sequencer.current_group(second), Some("b"));
        assert_eq!(sequencer.active_jobs(), 1);
        assert!(!sequencer.group_finished(first, true));
    }
}
