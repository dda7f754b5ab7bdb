// Copyright 2024 by the sepao developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with
// the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The assignment engine: a lexicographic sequence of mixed-integer programs
//! over a shared set of decision variables.
//!
//! The four objectives are optimized one after another, best first. After each
//! stage the achieved value is locked in as a constraint, so later stages can
//! only break ties (within a small documented tolerance) instead of trading
//! away earlier gains. The solver model is rebuilt per stage in a fixed
//! deterministic order, because the objective of a model is fixed at
//! construction; the accumulated lock-in constraints are re-added each time,
//! which leaves the observable staging behavior unchanged.
//!
//! The engine is constructed once per instance, driven either by `solve` (all
//! remaining stages) or by repeated `solve_next_objective` calls (one stage
//! per call, for callers that want to render progress), and discarded
//! afterwards.

pub(crate) mod constraints;
pub(crate) mod objectives;
pub mod score;
pub(crate) mod vars;


use std::sync::atomic::{AtomicI8, Ordering};
use std::sync::Arc;

use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{Expression, ProblemVariables, Solution as SolverSolution, SolverModel};
use log::{debug, info, warn};

use crate::{Instance, Solution};
use objectives::{LOCK_FACTORS, NUM_STAGES, STAGE_NAMES};
use vars::{ModelVars, Prep};

/// Tuning knobs handed through to the underlying MILP solver. They do not
/// change which assignments are optimal, only how the search for them runs.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Number of solver worker threads
    pub threads: u32,
    /// Wall-clock limit per stage, in seconds. A stage stopped by the limit
    /// counts as failed; there is no partial-result recovery.
    pub time_limit: Option<f64>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            threads: num_cpus::get() as u32,
            time_limit: None,
        }
    }
}

/// The staged assignment engine for one instance.
pub struct Engine {
    instance: Arc<Instance>,
    options: SolveOptions,
    prep: Prep,
    /// Completed stages, 0..=4
    stage: u32,
    failed: bool,
    /// Rounded achieved values of the completed maximization stages
    locked_values: Vec<f64>,
    best: Option<Solution>,
    progress: Arc<AtomicI8>,
}

impl Engine {
    pub fn new(instance: Arc<Instance>) -> Self {
        Self::with_options(instance, SolveOptions::default())
    }

    pub fn with_options(instance: Arc<Instance>, options: SolveOptions) -> Self {
        let prep = vars::build_prep(&instance);
        debug!(
            "Prepared model space: {} students, {} projects, {} role slots, {} friend pairs, {} students count for the rating objective",
            prep.num_students(),
            prep.num_projects(),
            prep.role_slots.len(),
            prep.friend_pairs.len(),
            prep.rated.iter().filter(|&&r| r).count(),
        );
        Engine {
            instance,
            options,
            prep,
            stage: 0,
            failed: false,
            locked_values: Vec::new(),
            best: None,
            progress: Arc::new(AtomicI8::new(0)),
        }
    }

    /// Number of completed stages (0..=4). 4 means all objectives are
    /// optimized; after a failed stage the counter stays put.
    pub fn stage(&self) -> u32 {
        self.stage
    }

    /// The shared progress cell: percent done (0, 25, 50, 75, 100), or -1
    /// once a stage failed. Written only by the engine; supervisors may poll
    /// it from other threads while a solve is running.
    pub fn progress_cell(&self) -> Arc<AtomicI8> {
        self.progress.clone()
    }

    /// Run all remaining stages and return the final assignment, or the last
    /// one cached before a failure (`None` if the very first stage failed).
    pub fn solve(&mut self) -> Option<Solution> {
        while self.stage < NUM_STAGES && !self.failed {
            self.solve_next_objective();
        }
        self.best.clone()
    }

    /// Run the next stage and return the best assignment found so far.
    ///
    /// Past the final stage this is a no-op returning the cached assignment;
    /// after a failed stage it keeps returning `None`.
    pub fn solve_next_objective(&mut self) -> Option<&Solution> {
        if self.failed {
            return None;
        }
        if self.stage >= NUM_STAGES {
            return self.best.as_ref();
        }
        let stage = self.stage as usize;
        info!(
            "Optimizing {} ({}/{})",
            STAGE_NAMES[stage],
            stage + 1,
            NUM_STAGES
        );

        let mut problem_vars = ProblemVariables::new();
        let v = vars::declare_variables(&self.prep, &mut problem_vars);
        let deviation = if stage == 3 {
            Some(objectives::declare_size_deviation_vars(
                &self.prep,
                &mut problem_vars,
            ))
        } else {
            None
        };

        let mut model = match &deviation {
            Some(deviation) => problem_vars.minimise(Expression::from(deviation.worst)),
            None => problem_vars.maximise(objectives::staged_objective(stage, &self.prep, &v)),
        }
        .using(coin_cbc);
        model.set_parameter("logLevel", "0");
        model.set_parameter("threads", &self.options.threads.to_string());
        if let Some(seconds) = self.options.time_limit {
            model.set_parameter("seconds", &seconds.to_string());
        }

        let mut model = constraints::add_base_constraints(model, &self.prep, &v);
        if let Some(deviation) = &deviation {
            model =
                objectives::add_size_deviation_constraints(model, &self.prep, &v, deviation);
        }
        // Preserve what the earlier stages achieved.
        for (locked_stage, &value) in self.locked_values.iter().enumerate() {
            let expression = objectives::staged_objective(locked_stage, &self.prep, &v);
            model = model.with(expression.geq(LOCK_FACTORS[locked_stage] * value));
        }

        match model.solve() {
            Ok(values) => {
                let achieved = match &deviation {
                    Some(deviation) => values.value(deviation.worst).round(),
                    None => {
                        // All objective coefficients are integers; rounding strips
                        // the solver's floating point noise before the value is
                        // locked in.
                        let achieved = values
                            .eval(objectives::staged_objective(stage, &self.prep, &v))
                            .round();
                        self.locked_values.push(achieved);
                        achieved
                    }
                };
                info!("Achieved {} value {}", STAGE_NAMES[stage], achieved);
                self.best = Some(self.extract_solution(&values, &v));
                self.stage += 1;
                self.progress
                    .store((self.stage * 25) as i8, Ordering::Relaxed);
                self.best.as_ref()
            }
            Err(e) => {
                warn!(
                    "No optimal solution for {} ({}/{}): {}",
                    STAGE_NAMES[stage],
                    stage + 1,
                    NUM_STAGES,
                    e
                );
                self.failed = true;
                self.progress.store(-1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Materialize a `Solution` from the solver's variable values: per-project
    /// student lists ordered by matriculation number, and one role entry per
    /// student (0 without a role).
    fn extract_solution(&self, values: &impl SolverSolution, v: &ModelVars) -> Solution {
        let mut projects = std::collections::BTreeMap::new();
        for (p, project) in self.prep.projects.iter().enumerate() {
            let mut members: Vec<&crate::Student> = (0..self.prep.num_students())
                .filter(|&s| values.value(v.x[[s, p]]) > 0.5)
                .map(|s| &self.instance.students[s])
                .collect();
            members.sort_by_key(|student| student.matr_number);
            projects.insert(project.id, members.into_iter().cloned().collect());
        }

        let mut roles: std::collections::BTreeMap<u32, u8> = self
            .instance
            .students
            .iter()
            .map(|student| (student.matr_number, 0))
            .collect();
        for (slot, &role) in self.prep.role_slots.iter().zip(&v.roles) {
            if values.value(role) > 0.5 {
                let student = &self.instance.students[slot.student];
                roles.insert(
                    student.matr_number,
                    self.prep.skills[[slot.student, slot.language]],
                );
            }
        }

        Solution { projects, roles }
    }
}
