//! Property results and the checker trait shared by all invariant sets.

use crate::counterexample::Counterexample;

/// Outcome of checking a single named property.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name (e.g. `FifoOrder`)
    pub name: &'static str,
    /// Whether the property holds
    pub holds: bool,
    /// Violation message when the property fails
    pub violation: Option<String>,
    /// Failure path, if the checker could build one
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A property that holds.
    #[must_use]
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    /// A property that was violated.
    #[must_use]
    pub fn fail(
        name: &'static str,
        violation: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            name,
            holds: false,
            violation: Some(violation.into()),
            counterexample,
        }
    }

    /// One-line summary, `[PASS] Name` or `[FAIL] Name: message`.
    #[must_use]
    pub fn format(&self) -> String {
        match &self.violation {
            None => format!("[PASS] {}", self.name),
            Some(msg) => format!("[FAIL] {}: {}", self.name, msg),
        }
    }
}

/// Anything that can check a set of properties.
pub trait PropertyChecker {
    /// Check every property and return all results.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True when every property holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Only the failing results.
    fn violations(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.holds).collect()
    }
}
