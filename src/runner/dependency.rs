//! Dependency collection for a target step.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SessionError};
use crate::model::{Job, Step};

/// Steps of a job keyed by name.
#[derive(Debug, Clone)]
pub struct StepIndex<'a> {
    steps: HashMap<&'a str, &'a Step>,
}

impl<'a> StepIndex<'a> {
    /// Index every step of `job`.
    pub fn new(job: &'a Job) -> Self {
        Self::from_steps(&job.steps)
    }

    pub fn from_steps(steps: &'a [Step]) -> Self {
        Self {
            steps: steps.iter().map(|s| (s.name.as_str(), s)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Step> {
        self.steps.get(name).copied()
    }
}

/// Returns `target` and every step it transitively depends on, dependencies
/// first, each step once.
///
/// Dependencies are expanded depth-first in declaration order, keeping the
/// first position a step is seen at. Fails if any visited step has
/// step-level environments (those can only run alone in a session), if a
/// dependency names an unknown step, or if the dependencies form a cycle.
pub fn collect_required_steps<'a>(index: &StepIndex<'a>, target: &'a Step) -> Result<Vec<&'a Step>> {
    let mut path = Vec::new();
    let mut closures = HashMap::new();
    collect(index, target, &mut path, &mut closures)
}

/// Like [`collect_required_steps`], without `target` itself.
pub fn collect_dependencies<'a>(index: &StepIndex<'a>, target: &'a Step) -> Result<Vec<&'a Step>> {
    let mut steps = collect_required_steps(index, target)?;
    steps.pop();
    Ok(steps)
}

/// Closures already expanded, keyed by step name.
type Closures<'a> = HashMap<&'a str, Vec<&'a Step>>;

fn collect<'a>(
    index: &StepIndex<'a>,
    step: &'a Step,
    path: &mut Vec<&'a str>,
    closures: &mut Closures<'a>,
) -> Result<Vec<&'a Step>> {
    if !step.environments.is_empty() {
        return Err(SessionError::StepEnvironmentConflict {
            step: step.name.clone(),
        });
    }

    if !step.has_dependencies() {
        return Ok(vec![step]);
    }

    if let Some(closure) = closures.get(step.name.as_str()) {
        return Ok(closure.clone());
    }

    if let Some(start) = path.iter().position(|name| *name == step.name) {
        let mut cycle: Vec<&str> = path[start..].to_vec();
        cycle.push(&step.name);
        return Err(SessionError::CircularDependency {
            cycle: cycle.join(" -> "),
        });
    }
    path.push(&step.name);

    let mut required: Vec<&'a Step> = Vec::new();
    let mut seen: HashSet<&'a str> = HashSet::new();
    for dependency in &step.dependencies {
        let dep = index
            .get(&dependency.depends_on)
            .ok_or_else(|| SessionError::UnknownDependency {
                step: step.name.clone(),
                dependency: dependency.depends_on.clone(),
            })?;

        for collected in collect(index, dep, path, closures)? {
            if seen.insert(collected.name.as_str()) {
                required.push(collected);
            }
        }
    }

    path.pop();
    required.push(step);
    closures.insert(step.name.as_str(), required.clone());
    Ok(required)
}
