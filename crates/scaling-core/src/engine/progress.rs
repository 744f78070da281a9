/// Events emitted while a relation is being built.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// A batch of `total_steps` species fits is about to start.
    TaskStart { total_steps: u64 },
    /// One species was fitted. Sent from worker threads under `parallel`.
    TaskIncrement,
    TaskFinish,
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional callback.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

impl std::fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::PhaseFinish);
    }

    #[test]
    fn reporter_forwards_events_in_order() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));

        reporter.report(Progress::PhaseStart { name: "Fitting" });
        reporter.report(Progress::TaskStart { total_steps: 2 });
        reporter.report(Progress::TaskIncrement);
        drop(reporter);

        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                Progress::PhaseStart { name: "Fitting" },
                Progress::TaskStart { total_steps: 2 },
                Progress::TaskIncrement,
            ]
        );
    }
}
