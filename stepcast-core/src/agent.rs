use crate::error::Result;
use crate::model::{RunRequest, Step, TokenUsage};

pub trait Agent {
    fn run(&mut self, request: &RunRequest) -> Result<Box<dyn StepStream + '_>>;
}

pub trait StepStream {
    fn next_step(&mut self) -> Option<Result<Step>>;

    fn last_token_usage(&self) -> Option<TokenUsage> {
        None
    }
}
