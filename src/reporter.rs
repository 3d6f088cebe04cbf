use std::io::Write;

use crate::error::StaticError;

pub trait Reporter {
    fn report(&mut self, error: &StaticError);
}

// A reporter that renders error messages to the output
pub struct WriteReporter<W> {
    writer: W,
}

impl<W> WriteReporter<W> {
    pub fn new(writer: W) -> WriteReporter<W> {
        WriteReporter { writer }
    }
}

impl<W> Reporter for WriteReporter<W>
where
    W: Write,
{
    fn report(&mut self, error: &StaticError) {
        // If the write fails, we don't care
        _ = writeln!(self.writer, "{}", error);
    }
}

/// Keeps every reported error so the caller can hand them back as data
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub errors: Vec<StaticError>,
}

impl Reporter for CollectingReporter {
    fn report(&mut self, error: &StaticError) {
        self.errors.push(error.clone());
    }
}

pub struct NoopReporter {}

impl Reporter for NoopReporter {
    fn report(&mut self, _error: &StaticError) {}
}

/// Track whether or not an error actually occurred and delegate to another error reporter
/// Stages use this to decide whether the next stage may run
pub struct StateTrackingReporter<'a, R: ?Sized> {
    reporter: &'a mut R,
    errored: bool,
}

impl<'a, R> StateTrackingReporter<'a, R>
where
    R: Reporter + ?Sized,
{
    pub fn new(reporter: &'a mut R) -> StateTrackingReporter<'a, R> {
        StateTrackingReporter {
            reporter,
            errored: false,
        }
    }

    pub fn errored(&self) -> bool {
        self.errored
    }
}

impl<'a, R> Reporter for StateTrackingReporter<'a, R>
where
    R: Reporter + ?Sized,
{
    fn report(&mut self, error: &StaticError) {
        self.errored = true;
        self.reporter.report(error);
    }
}
