use std::path::Path;
use std::slice;

use tracing::debug;

use crate::agent::{Agent, StepStream};
use crate::error::Result;
use crate::model::{RunRequest, Step, TokenUsage};
use crate::trace::{TraceRecord, load_trace};

#[derive(Debug, Clone, Default)]
pub struct ReplayAgent {
    records: Vec<TraceRecord>,
    memory: Vec<RunRequest>,
}

impl ReplayAgent {
    pub fn new(records: Vec<TraceRecord>) -> Self {
        Self {
            records,
            memory: Vec::new(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(load_trace(path)?))
    }

    pub fn memory(&self) -> &[RunRequest] {
        &self.memory
    }

    pub fn recorded_task(&self) -> Option<&str> {
        self.records.iter().find_map(|record| match &record.step {
            Step::Task(task) if !task.task.trim().is_empty() => Some(task.task.as_str()),
            _ => None,
        })
    }
}

impl Agent for ReplayAgent {
    fn run(&mut self, request: &RunRequest) -> Result<Box<dyn StepStream + '_>> {
        if request.reset_memory {
            self.memory.clear();
        }
        self.memory.push(request.clone());
        debug!(
            steps = self.records.len(),
            remembered_runs = self.memory.len(),
            "replaying trace"
        );

        Ok(Box::new(ReplayStream {
            records: self.records.iter(),
            last_usage: None,
        }))
    }
}

struct ReplayStream<'a> {
    records: slice::Iter<'a, TraceRecord>,
    last_usage: Option<TokenUsage>,
}

impl StepStream for ReplayStream<'_> {
    fn next_step(&mut self) -> Option<Result<Step>> {
        let record = self.records.next()?;
        self.last_usage = record.usage;
        Some(Ok(record.step.clone()))
    }

    fn last_token_usage(&self) -> Option<TokenUsage> {
        self.last_usage
    }
}
