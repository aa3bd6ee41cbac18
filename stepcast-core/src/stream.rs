use std::collections::VecDeque;

use tracing::debug;

use crate::agent::{Agent, StepStream};
use crate::config::TranscriptConfig;
use crate::error::{Result, StepcastError};
use crate::final_answer::{DefaultClassifier, OutputClassifier, render_final_answer};
use crate::model::{Message, RunRequest, Step, TokenTotals, TranscriptEvent};
use crate::render::extract_step_events;

pub struct TranscriptStreamer {
    config: TranscriptConfig,
    classifier: Box<dyn OutputClassifier>,
}

impl TranscriptStreamer {
    pub fn new(config: TranscriptConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: Box::new(DefaultClassifier),
        })
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: impl OutputClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn config(&self) -> &TranscriptConfig {
        &self.config
    }

    /// Starts a run. Each call runs the agent again; the returned stream can
    /// only be consumed once.
    pub fn stream<'a>(
        &'a self,
        agent: &'a mut dyn Agent,
        request: &RunRequest,
    ) -> Result<TranscriptStream<'a>> {
        debug!(
            task = %request.task,
            reset_memory = request.reset_memory,
            "starting agent run"
        );
        let steps = agent.run(request)?;

        Ok(TranscriptStream {
            steps,
            code_tool: &self.config.code_tool,
            classifier: self.classifier.as_ref(),
            pending: VecDeque::new(),
            last_step: None,
            steps_seen: 0,
            totals: TokenTotals::default(),
            finished: false,
        })
    }
}

pub struct TranscriptStream<'a> {
    steps: Box<dyn StepStream + 'a>,
    code_tool: &'a str,
    classifier: &'a dyn OutputClassifier,
    pending: VecDeque<TranscriptEvent>,
    last_step: Option<Step>,
    steps_seen: usize,
    totals: TokenTotals,
    finished: bool,
}

impl TranscriptStream<'_> {
    pub fn totals(&self) -> TokenTotals {
        self.totals
    }

    pub fn steps_seen(&self) -> usize {
        self.steps_seen
    }

    fn observe_step(&mut self, mut step: Step) {
        self.steps_seen += 1;

        if let Some(usage) = self.steps.last_token_usage() {
            self.totals.add(usage);
            // Per-call counts, not the running totals.
            if let Some(action) = step.as_action_mut() {
                action.input_token_count = Some(usage.input_tokens);
                action.output_token_count = Some(usage.output_tokens);
            }
        }

        let events = extract_step_events(&step, self.code_tool);
        debug!(
            step = self.steps_seen,
            events = events.len(),
            "extracted step events"
        );
        self.pending.extend(events);
        self.last_step = Some(step);
    }

    fn final_message(&mut self) -> Result<Message> {
        let last_step = self.last_step.take().ok_or(StepcastError::EmptyRun)?;
        let answer = self.classifier.classify(&last_step)?;
        debug!(
            steps = self.steps_seen,
            input_tokens = self.totals.input_tokens,
            output_tokens = self.totals.output_tokens,
            "agent run finished"
        );
        Ok(render_final_answer(&answer))
    }
}

impl Iterator for TranscriptStream<'_> {
    type Item = Result<TranscriptEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }

            if self.finished {
                return None;
            }

            match self.steps.next_step() {
                Some(Ok(step)) => self.observe_step(step),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    return Some(self.final_message().map(TranscriptEvent::Message));
                }
            }
        }
    }
}
