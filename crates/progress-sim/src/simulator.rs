use std::collections::VecDeque;

/// Generic filler appended once the narrated steps run out.
pub const OVERFLOW_STEPS: [&str; 8] = [
    "Analyzing historical data...",
    "Reviewing recent developments...",
    "Checking statistical patterns...",
    "Evaluating expert predictions...",
    "Assessing market conditions...",
    "Cross-referencing sources...",
    "Calculating probability model...",
    "Compiling research findings...",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Active,
    Pending,
}

impl StepStatus {
    pub fn marker(self) -> &'static str {
        match self {
            StepStatus::Done => "✓",
            StepStatus::Active => "▸",
            StepStatus::Pending => "○",
        }
    }
}

/// Snapshot handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressView {
    pub steps: Vec<String>,
    /// Number of steps shown as done.
    pub completed: usize,
    pub complete: bool,
}

impl ProgressView {
    pub fn status(&self, index: usize) -> StepStatus {
        if index < self.completed {
            StepStatus::Done
        } else if index == self.completed {
            StepStatus::Active
        } else {
            StepStatus::Pending
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{} {}", self.status(i).marker(), step))
            .collect()
    }
}

/// Completed-count cursor over a step list.
///
/// The cursor stops one short of the end on its own. Past that point each
/// tick pulls a step from the overflow pool so the list keeps growing; only
/// [`mark_complete`](Self::mark_complete) finishes the last step.
#[derive(Debug, Clone)]
pub struct ProgressSimulator {
    steps: Vec<String>,
    cursor: usize,
    overflow: VecDeque<String>,
    complete: bool,
}

impl ProgressSimulator {
    pub fn new(steps: Vec<String>) -> Self {
        Self {
            steps,
            cursor: 0,
            overflow: OVERFLOW_STEPS.iter().map(|s| s.to_string()).collect(),
            complete: false,
        }
    }

    /// Advances one step. Returns whether anything changed.
    pub fn tick(&mut self) -> bool {
        if self.complete {
            return false;
        }
        if self.steps.is_empty() {
            return match self.overflow.pop_front() {
                Some(step) => {
                    self.steps.push(step);
                    true
                }
                None => false,
            };
        }
        if self.cursor + 1 < self.steps.len() {
            self.cursor += 1;
            return true;
        }
        match self.overflow.pop_front() {
            Some(step) => {
                self.steps.push(step);
                self.cursor += 1;
                true
            }
            None => false,
        }
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
        self.cursor = self.steps.len();
    }

    pub fn reset(&mut self, steps: Vec<String>) {
        *self = Self::new(steps);
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            steps: self.steps.clone(),
            completed: self.cursor,
            complete: self.complete,
        }
    }
}
