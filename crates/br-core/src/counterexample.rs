//! Counterexample representation and rendering.
//!
//! When a buffer property fails, a counterexample shows the sequence of
//! producer/consumer actions and ring states that led to the failure.

use std::fmt;

/// A counterexample showing the failure path.
///
/// Contains ring snapshots and the role interleaving that led to an
/// invariant violation. Can be rendered as a per-role step diagram.
#[derive(Debug, Clone)]
pub struct Counterexample {
    /// Sequence of state snapshots
    pub states: Vec<StateSnapshot>,
    /// Role interleaving that caused the failure
    pub interleaving: Vec<RoleAction>,
    /// Slot bookkeeping problems detected
    pub ring_issues: Vec<RingIssue>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    /// Human-readable description of the failure
    pub description: Option<String>,
}

/// Snapshot of buffer state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
    /// Variable values at this point
    pub variables: Vec<(String, String)>,
}

/// Action taken by a producer or consumer.
#[derive(Debug, Clone)]
pub struct RoleAction {
    /// Role identifier (0 = producer, 1 = consumer by convention)
    pub role_id: u64,
    /// Step number when this action occurred
    pub step: u64,
    /// Description of the action
    pub action: String,
    /// Whether the action completed (false for timed out / cancelled)
    pub success: bool,
}

/// Slot bookkeeping problem detected in a ring layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingIssue {
    /// Write cursor outside `[0, capacity)`
    CursorOutOfRange { write_cursor: u64, capacity: u64 },
    /// Live count above capacity
    CountOverflow { count: u64, capacity: u64 },
    /// Slot inside the live window holds nothing
    HoleInLiveRange { slot: u64, read_cursor: u64 },
    /// Slot outside the live window still holds an element
    StrayElement { slot: u64, read_cursor: u64 },
}

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            interleaving: Vec::new(),
            ring_issues: Vec::new(),
            dst_seed: None,
            description: None,
        }
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        Self {
            dst_seed: Some(seed),
            ..Self::new()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Add a state snapshot.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Add a role action.
    pub fn add_action(&mut self, action: RoleAction) {
        self.interleaving.push(action);
    }

    /// Add a ring bookkeeping issue.
    pub fn add_ring_issue(&mut self, issue: RingIssue) {
        self.ring_issues.push(issue);
    }

    /// Render the counterexample as a human-readable role diagram.
    ///
    /// Format:
    /// ```text
    /// DST_SEED=12345
    ///
    /// Step | Producer | Consumer | State
    /// -----|----------|----------|-------
    ///    1 | add(10)  |          | count=1
    ///    2 |          | take()   | count=0
    ///    3 |          | take() [FAIL] | count=0
    /// ```
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.dst_seed {
            output.push_str(&format!("DST_SEED={}\n\n", seed));
        }

        if let Some(ref desc) = self.description {
            output.push_str("Failure: ");
            output.push_str(desc);
            output.push_str("\n\n");
        }

        let mut roles: Vec<u64> = self.interleaving.iter().map(|a| a.role_id).collect();
        roles.sort_unstable();
        roles.dedup();

        if roles.is_empty() {
            output.push_str("(no role actions recorded)\n");
        } else {
            output.push_str("Step |");
            for role in &roles {
                output.push_str(&format!(" {} |", role_label(*role)));
            }
            output.push_str(" State\n");

            output.push_str("-----|");
            for _ in &roles {
                output.push_str("----------|");
            }
            output.push_str("------\n");

            let max_step = self.interleaving.iter().map(|a| a.step).max().unwrap_or(0);

            for step in 1..=max_step {
                output.push_str(&format!("{:4} |", step));

                for role in &roles {
                    let action = self
                        .interleaving
                        .iter()
                        .find(|a| a.step == step && a.role_id == *role);

                    match action {
                        Some(a) => {
                            let status = if a.success { "" } else { " [FAIL]" };
                            output.push_str(&format!(" {}{} |", a.action, status));
                        }
                        None => output.push_str("          |"),
                    }
                }

                if let Some(state) = self.states.iter().find(|s| s.step == step) {
                    output.push_str(&format!(" {}", state.description));
                }

                output.push('\n');
            }
        }

        if !self.ring_issues.is_empty() {
            output.push_str("\nRing Issues:\n");
            for issue in &self.ring_issues {
                output.push_str(&format!("  - {}\n", issue));
            }
        }

        output
    }
}

impl Default for Counterexample {
    fn default() -> Self {
        Self::new()
    }
}

fn role_label(role_id: u64) -> String {
    match role_id {
        0 => "Producer".to_string(),
        1 => "Consumer".to_string(),
        other => format!("Role {}", other),
    }
}

impl fmt::Display for RingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingIssue::CursorOutOfRange {
                write_cursor,
                capacity,
            } => write!(
                f,
                "Write cursor {} outside [0, {})",
                write_cursor, capacity
            ),
            RingIssue::CountOverflow { count, capacity } => {
                write!(f, "Live count {} exceeds capacity {}", count, capacity)
            }
            RingIssue::HoleInLiveRange { slot, read_cursor } => write!(
                f,
                "Slot {} is empty but lies in the live window starting at {}",
                slot, read_cursor
            ),
            RingIssue::StrayElement { slot, read_cursor } => write!(
                f,
                "Slot {} holds an element outside the live window starting at {}",
                slot, read_cursor
            ),
        }
    }
}
