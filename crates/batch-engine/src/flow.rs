//! Job flow definition
//!
//! A job is a named set of steps plus a transition table routing on exit
//! codes. Patterns support `*` (any run) and `?` (any single character);
//! when several patterns match, the most specific one wins. Steps listed
//! without an explicit COMPLETED transition chain to the next step in
//! declaration order.

use crate::error::{EngineError, Result};
use crate::step::Step;
use batch_core::{BatchStatus, ExitStatus};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

/// Where a matched transition sends the flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionTarget {
    /// Continue with the named step.
    Step(String),
    /// End the job as COMPLETED.
    End,
    /// End the job as FAILED.
    Fail,
    /// End the job as STOPPED; a restart resumes after this point.
    Stop,
}

/// Exit-code pattern with `*` and `?` wildcards.
#[derive(Clone, Debug)]
pub struct ExitPattern {
    pattern: String,
    literals: usize,
    stars: usize,
    questions: usize,
}

impl ExitPattern {
    pub fn new(pattern: &str) -> Self {
        let stars = pattern.bytes().filter(|b| *b == b'*').count();
        let questions = pattern.bytes().filter(|b| *b == b'?').count();
        Self {
            pattern: pattern.to_string(),
            literals: pattern.len() - stars - questions,
            stars,
            questions,
        }
    }

    pub fn matches(&self, exit_code: &str) -> bool {
        wildcard_match(self.pattern.as_bytes(), exit_code.as_bytes())
    }

    /// More literal characters means more specific; among equals, fewer
    /// `*` wildcards, then fewer `?`. Exact codes therefore always beat
    /// prefix patterns, which beat the bare `*` fallback.
    fn specificity(&self) -> (Reverse<usize>, usize, usize) {
        (Reverse(self.literals), self.stars, self.questions)
    }
}

fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            wildcard_match(&pattern[1..], text)
                || (!text.is_empty() && wildcard_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => wildcard_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => wildcard_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct Transition {
    pub pattern: ExitPattern,
    pub target: TransitionTarget,
}

/// One step plus its outgoing transitions.
pub struct StepNode {
    pub step: Arc<dyn Step>,
    pub transitions: Vec<Transition>,
}

impl StepNode {
    /// Resolve the transition for an exit code: most specific matching
    /// pattern wins, declaration order breaks ties.
    pub fn next_for(&self, exit_code: &str) -> Option<&TransitionTarget> {
        self.transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.pattern.matches(exit_code))
            .min_by_key(|(index, t)| (t.pattern.specificity(), *index))
            .map(|(_, t)| &t.target)
    }
}

/// Immutable, validated description of a job's steps and flow.
pub struct JobDefinition {
    name: String,
    restartable: bool,
    steps: Vec<StepNode>,
}

impl JobDefinition {
    pub fn builder(name: &str) -> JobBuilder {
        JobBuilder {
            name: name.to_string(),
            restartable: true,
            steps: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_restartable(&self) -> bool {
        self.restartable
    }

    pub fn first_step(&self) -> &StepNode {
        // Non-empty is enforced at build time
        &self.steps[0]
    }

    pub fn node(&self, step_name: &str) -> Option<&StepNode> {
        self.steps.iter().find(|n| n.step.name() == step_name)
    }
}

/// How an ended flow maps onto the job execution.
pub fn end_state(target: &TransitionTarget) -> Option<(BatchStatus, ExitStatus)> {
    match target {
        TransitionTarget::End => Some((BatchStatus::Completed, ExitStatus::completed())),
        TransitionTarget::Fail => Some((BatchStatus::Failed, ExitStatus::failed())),
        TransitionTarget::Stop => Some((BatchStatus::Stopped, ExitStatus::stopped())),
        TransitionTarget::Step(_) => None,
    }
}

pub struct JobBuilder {
    name: String,
    restartable: bool,
    steps: Vec<StepNode>,
    transitions: Vec<(String, Transition)>,
}

impl JobBuilder {
    pub fn step(self, step: impl Step + 'static) -> Self {
        self.step_arc(Arc::new(step))
    }

    fn step_arc(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(StepNode {
            step,
            transitions: Vec::new(),
        });
        self
    }

    /// Route `from` to `target` whenever its exit code matches `pattern`.
    pub fn transition(mut self, from: &str, pattern: &str, target: TransitionTarget) -> Self {
        self.transitions.push((
            from.to_string(),
            Transition {
                pattern: ExitPattern::new(pattern),
                target,
            },
        ));
        self
    }

    pub fn restartable(mut self, restartable: bool) -> Self {
        self.restartable = restartable;
        self
    }

    pub fn build(mut self) -> Result<JobDefinition> {
        if self.steps.is_empty() {
            return Err(EngineError::EmptyJob(self.name));
        }

        let mut names = HashSet::new();
        for node in &self.steps {
            if !names.insert(node.step.name().to_string()) {
                return Err(EngineError::DuplicateStep(node.step.name().to_string()));
            }
        }

        for (from, transition) in self.transitions {
            if let TransitionTarget::Step(to) = &transition.target {
                if !names.contains(to) {
                    return Err(EngineError::UnknownStep {
                        from,
                        to: to.clone(),
                    });
                }
            }
            let node = self
                .steps
                .iter_mut()
                .find(|n| n.step.name() == from)
                .ok_or(EngineError::UnknownTransitionSource(from.clone()))?;
            node.transitions.push(transition);
        }

        // Sequential chaining: a step with no transition covering COMPLETED
        // flows into the next step in declaration order
        for i in 0..self.steps.len() - 1 {
            let next_name = self.steps[i + 1].step.name().to_string();
            let node = &mut self.steps[i];
            if !node
                .transitions
                .iter()
                .any(|t| t.pattern.matches(ExitStatus::COMPLETED))
            {
                node.transitions.push(Transition {
                    pattern: ExitPattern::new(ExitStatus::COMPLETED),
                    target: TransitionTarget::Step(next_name),
                });
            }
        }

        Ok(JobDefinition {
            name: self.name,
            restartable: self.restartable,
            steps: self.steps,
        })
    }
}
