//! Test cases and their outcomes.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use benchlink_core::error::{Error, ErrorKind, Result};
use benchlink_core::time::TimeValue;

use crate::bench::Bench;
use crate::params::Params;

/// A boxed, sendable future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The body of a test: gets the bench and its parameters.
pub type TestFn =
    Arc<dyn for<'a> Fn(&'a mut Bench, &'a Params) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Terminal state of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    Failed,
    /// Failed because a trigger was still waiting at the deadline.
    TimedOut,
    Skipped,
}

impl Status {
    /// Summary label; a timeout reports as a failure.
    pub fn label(self) -> &'static str {
        match self {
            Status::Passed => "PASS",
            Status::Failed | Status::TimedOut => "FAIL",
            Status::Skipped => "SKIP",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failed | Status::TimedOut)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A registered test.
///
/// ```
/// use benchlink_runner::TestCase;
/// use benchlink_core::{TimeUnit, TimeValue};
///
/// let test = TestCase::new("reset_clears_counter", |bench, _params| {
///     Box::pin(async move {
///         bench.write("rst_n", 0).await?;
///         Ok(())
///     })
/// })
/// .timeout(TimeValue::new(5, TimeUnit::Ms))
/// .stage(1);
/// assert_eq!(test.name(), "reset_clears_counter");
/// ```
#[derive(Clone)]
pub struct TestCase {
    name: String,
    body: TestFn,
    params: Params,
    timeout: Option<TimeValue>,
    expect_fail: bool,
    expect_error: Option<HashSet<ErrorKind>>,
    skip: bool,
    stage: i32,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("timeout", &self.timeout)
            .field("expect_fail", &self.expect_fail)
            .field("expect_error", &self.expect_error)
            .field("skip", &self.skip)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut Bench, &'a Params) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            body: Arc::new(body),
            params: Params::new(),
            timeout: None,
            expect_fail: false,
            expect_error: None,
            skip: false,
            stage: 0,
        }
    }

    /// Fail with a timeout once logical time passes `limit`.
    pub fn timeout(mut self, limit: TimeValue) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// The test is expected to fail.
    pub fn expect_fail(mut self, expect: bool) -> Self {
        self.expect_fail = expect;
        self
    }

    /// The test is expected to fail with one of these kinds.
    pub fn expect_error(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.expect_error = Some(kinds.into_iter().collect());
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Lower stages run first; registration order breaks ties.
    pub fn stage(mut self, stage: i32) -> Self {
        self.stage = stage;
        self
    }

    pub(crate) fn derive(&self, params: Params) -> Self {
        let mut test = self.clone();
        if !params.is_empty() {
            test.name = format!("{}/{}", self.name, params);
        }
        test.params = params;
        test
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &TestFn {
        &self.body
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn timeout_limit(&self) -> Option<TimeValue> {
        self.timeout
    }

    pub fn is_expect_fail(&self) -> bool {
        self.expect_fail
    }

    pub fn expected_errors(&self) -> Option<&HashSet<ErrorKind>> {
        self.expect_error.as_ref()
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn stage_number(&self) -> i32 {
        self.stage
    }

    fn expects_failure(&self) -> bool {
        self.expect_fail || self.expect_error.is_some()
    }

    /// Map the body's result to a status and message.
    pub fn classify(&self, outcome: &Result<()>) -> (Status, String) {
        match outcome {
            Ok(()) if self.expects_failure() => {
                (Status::Failed, "expected failure did not occur".to_string())
            }
            Ok(()) => (Status::Passed, String::new()),
            Err(e) if self.expects_failure() => {
                if self.kind_expected(e) {
                    (Status::Passed, format!("failed as expected: {e}"))
                } else {
                    (Status::Failed, format!("failed with unexpected {} error: {e}", e.kind()))
                }
            }
            Err(e) if e.is_test_timeout() => (Status::TimedOut, e.to_string()),
            Err(e) => (Status::Failed, e.to_string()),
        }
    }

    fn kind_expected(&self, e: &Error) -> bool {
        self.expect_error
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&e.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> TestCase {
        TestCase::new(name, |_, _| Box::pin(async { Ok(()) }))
    }

    fn timeout_error() -> Error {
        Error::TestTimeout {
            at: TimeValue::from_steps(10),
            limit: TimeValue::from_steps(5),
        }
    }

    #[test]
    fn plain_test_outcomes() {
        let t = noop("t");
        assert_eq!(t.classify(&Ok(())).0, Status::Passed);
        let (status, msg) = t.classify(&Err(Error::Assertion("x != 1".into())));
        assert_eq!(status, Status::Failed);
        assert!(msg.contains("x != 1"));
        let (status, msg) = t.classify(&Err(timeout_error()));
        assert_eq!(status, Status::TimedOut);
        assert!(msg.starts_with("timed out"));
        assert_eq!(status.label(), "FAIL");
    }

    #[test]
    fn expect_fail_inverts() {
        let t = noop("t").expect_fail(true);
        let (status, msg) = t.classify(&Err(Error::Assertion("boom".into())));
        assert_eq!(status, Status::Passed);
        assert!(msg.starts_with("failed as expected"));
        let (status, msg) = t.classify(&Ok(()));
        assert_eq!(status, Status::Failed);
        assert_eq!(msg, "expected failure did not occur");
        assert_eq!(t.classify(&Err(timeout_error())).0, Status::Passed);
    }

    #[test]
    fn expect_error_checks_kind() {
        let t = noop("t").expect_error([ErrorKind::Timeout]);
        assert_eq!(t.classify(&Err(timeout_error())).0, Status::Passed);
        let (status, msg) = t.classify(&Err(Error::Assertion("nope".into())));
        assert_eq!(status, Status::Failed);
        assert!(msg.contains("assertion"));
        assert_eq!(t.classify(&Ok(())).0, Status::Failed);
    }

    #[test]
    fn derived_name_carries_params() {
        let t = noop("count").timeout(TimeValue::from_steps(9)).stage(2);
        let d = t.derive(Params::new().with("n", 4).with("fast", false));
        assert_eq!(d.name(), "count/n=4/fast=false");
        assert_eq!(d.params().int("n").unwrap(), 4);
        assert_eq!(d.stage_number(), 2);
        assert_eq!(d.timeout_limit(), Some(TimeValue::from_steps(9)));
        assert_eq!(t.derive(Params::new()).name(), "count");
    }
}
