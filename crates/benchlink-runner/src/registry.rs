//! The test registry.

use tracing::debug;

use benchlink_core::error::{Error, Result};

use crate::params::Parametrize;
use crate::testcase::TestCase;

/// Tests in registration order.
///
/// Owned by the program entry point and handed to a
/// [`Runner`](crate::Runner); there is no global registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tests: Vec<TestCase>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test. Names must be unique.
    pub fn register(&mut self, test: TestCase) -> Result<()> {
        if self.get(test.name()).is_some() {
            return Err(Error::Configuration(format!(
                "test '{}' is already registered",
                test.name()
            )));
        }
        debug!(test = test.name(), "registering test");
        self.tests.push(test);
        Ok(())
    }

    /// Add one test per parameter combination, named
    /// `template/a=1/b=2`. Returns how many were added.
    pub fn register_parametrized(
        &mut self,
        template: TestCase,
        parametrize: &Parametrize,
    ) -> Result<usize> {
        let derived: Vec<TestCase> = parametrize
            .combinations()
            .into_iter()
            .map(|params| template.derive(params))
            .collect();
        if let Some(dup) = derived.iter().find(|t| self.get(t.name()).is_some()) {
            return Err(Error::Configuration(format!(
                "test '{}' is already registered",
                dup.name()
            )));
        }
        let count = derived.len();
        for test in derived {
            self.register(test)?;
        }
        Ok(count)
    }

    /// Look a test up by its full name.
    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.tests.iter().find(|t| t.name() == name)
    }

    /// All tests, in registration order.
    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(TestCase::name)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
