//! Runner -- executes a registry against a bench and summarizes.
//!
//! Tests run one after another in stage order (registration order within a
//! stage). Before each test, logical time is reset, background tasks of the
//! previous test are dropped and the test's deadline is armed. A failing test
//! never stops the run. The summary lists every test in registration order.

use std::fmt;

use tracing::{error, info, warn};

use benchlink_core::error::Result;
use benchlink_core::time::TimeValue;

use crate::bench::Bench;
use crate::registry::Registry;
use crate::testcase::{Status, TestCase};

/// Outcome of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// Test name, parameters included.
    pub name: String,
    pub status: Status,
    /// Logical time when the test finished.
    pub elapsed: TimeValue,
    /// Failure or skip reason; empty on a pass.
    pub message: String,
}

/// Outcomes of a run, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    entries: Vec<SummaryEntry>,
}

impl Summary {
    /// Every outcome, in run order.
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    /// Outcome of the named test.
    pub fn get(&self, name: &str) -> Option<&SummaryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Tests that passed.
    pub fn passed(&self) -> usize {
        self.count(|s| s == Status::Passed)
    }

    /// Failures, timeouts included.
    pub fn failed(&self) -> usize {
        self.count(Status::is_failure)
    }

    /// Tests skipped before they ran.
    pub fn skipped(&self) -> usize {
        self.count(|s| s == Status::Skipped)
    }

    /// True when nothing failed. Skips do not count against the run.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn count(&self, f: impl Fn(Status) -> bool) -> usize {
        self.entries.iter().filter(|e| f(e.status)).count()
    }
}

/// One line per test: `\tPASS\tname\telapsed\tmessage`.
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            if entry.status == Status::Skipped {
                writeln!(f, "\t{}\t{}", entry.status, entry.name)?;
                continue;
            }
            write!(f, "\t{}\t{}\t{}", entry.status, entry.name, entry.elapsed.rebased())?;
            if !entry.message.is_empty() {
                write!(f, "\t{}", entry.message)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Runs the tests of a registry.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    registry: Registry,
}

impl Runner {
    /// A runner over `registry`.
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every registered test on `bench`.
    ///
    /// Only a failure of the DUT's `testing_will_begin` hook aborts the run.
    pub async fn run(&self, bench: &mut Bench) -> Result<Summary> {
        bench.dut_mut().testing_will_begin().await?;
        let base = bench
            .dut()
            .monitor()
            .reset_time_hint()
            .unwrap_or(TimeValue::zero());
        bench.time_mut().set_reset_time(base);

        let tests = self.registry.tests();
        let total = tests.len();
        let mut order: Vec<usize> = (0..total).collect();
        order.sort_by_key(|&i| tests[i].stage_number());

        let mut results: Vec<Option<SummaryEntry>> = vec![None; total];
        for (count, &i) in order.iter().enumerate() {
            let test = &tests[i];
            info!("*** Running test {}/{}: {} ***", count + 1, total, test.name());
            let entry = if test.is_skipped() {
                warn!(test = test.name(), "skipped");
                SummaryEntry {
                    name: test.name().to_string(),
                    status: Status::Skipped,
                    elapsed: TimeValue::zero(),
                    message: String::new(),
                }
            } else {
                run_one(bench, test).await
            };
            results[i] = Some(entry);
        }

        if let Err(e) = bench.dut_mut().testing_done().await {
            error!(error = %e, "testing done hook failed");
        }

        let summary = Summary {
            entries: results.into_iter().flatten().collect(),
        };
        if summary.all_passed() {
            info!("All {} tests passed", summary.len() - summary.skipped());
        } else {
            warn!("{}/{} tests failed", summary.failed(), summary.len());
        }
        info!("*** Summary ***");
        for line in summary.to_string().lines() {
            info!("{line}");
        }
        Ok(summary)
    }
}

async fn run_one(bench: &mut Bench, test: &TestCase) -> SummaryEntry {
    bench.clear_tasks();
    bench.clear_observations();
    bench.time_mut().reset();
    match test.timeout_limit() {
        Some(limit) => {
            let deadline = bench.now() + limit;
            bench.time_mut().set_timeout(deadline);
        }
        None => bench.time_mut().clear_timeout(),
    }

    let now = bench.now();
    let (status, message) = match bench.dut_mut().testing_unit_start(test.name(), now).await {
        Ok(()) => {
            let body = test.body().clone();
            let outcome = body(bench, test.params()).await;
            if let Err(e) = &outcome {
                error!(test = test.name(), error = %e, "test raised");
            }
            test.classify(&outcome)
        }
        Err(e) => {
            error!(test = test.name(), error = %e, "unit start failed");
            (Status::Failed, format!("unit start failed: {e}"))
        }
    };

    let elapsed = bench.now();
    bench.clear_tasks();
    if let Err(e) = bench.dut_mut().testing_unit_done(test.name(), elapsed).await {
        warn!(test = test.name(), error = %e, "unit done hook failed");
    }
    bench.time_mut().clear_timeout();

    match status {
        Status::Passed if message.is_empty() => info!("*** Test '{}' PASS ***", test.name()),
        Status::Passed => warn!("*** Test '{}' PASS: {} ***", test.name(), message),
        _ => error!("*** Test '{}' FAIL: {} ***", test.name(), message),
    }

    SummaryEntry {
        name: test.name().to_string(),
        status,
        elapsed,
        message,
    }
}
