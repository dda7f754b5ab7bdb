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

//! The four staged objectives, in priority order: project ratings, programming
//! roles, friend pairs, worst group-size deviation.
//!
//! The first three are plain linear expressions over the shared decision
//! variables and are rebuilt both as stage objectives and as the left-hand
//! sides of the lock-in constraints of later stages. The size-deviation
//! objective brings its own auxiliary integer variables and constraints and is
//! only ever the final stage, so it needs no lock-in form.

use good_lp::{variable, Expression, ProblemVariables, SolverModel, Variable};

use super::vars::{ModelVars, Prep};

/// Sum of the students' ratings for the project they are placed in.
///
/// Restricted to students with enough positive project choices; the remaining
/// students are still placed by the feasibility constraints but their
/// near-indifferent ratings do not steer the allocation.
pub(crate) fn rating_objective(prep: &Prep, v: &ModelVars) -> Expression {
    let mut objective = Expression::from(0.0);
    for s in 0..prep.num_students() {
        if !prep.rated[s] {
            continue;
        }
        for p in 0..prep.num_projects() {
            objective += f64::from(prep.ratings[[s, p]]) * v.x[[s, p]];
        }
    }
    objective
}

/// Sum of the skill levels of all filled role slots. Filling a slot with a
/// more skilled student scores higher.
pub(crate) fn programming_objective(prep: &Prep, v: &ModelVars) -> Expression {
    let mut objective = Expression::from(0.0);
    for (slot, role) in prep.role_slots.iter().zip(&v.roles) {
        objective += f64::from(prep.skills[[slot.student, slot.language]]) * *role;
    }
    objective
}

/// Number of friend pairs placed in the same project.
pub(crate) fn friends_objective(prep: &Prep, v: &ModelVars) -> Expression {
    let mut objective = Expression::from(0.0);
    for pair in &v.friends {
        for &y in pair {
            objective += y;
        }
    }
    objective
}

/// Auxiliary variables of the size-deviation stage: the absolute deviation of
/// every project's size from its optimal size, and the maximum over them.
pub(crate) struct SizeDeviationVars {
    pub deviations: Vec<Variable>,
    pub worst: Variable,
}

/// Declare the size-deviation auxiliaries. An empty project deviates by its
/// full optimal size, so the bound covers both directions.
pub(crate) fn declare_size_deviation_vars(
    prep: &Prep,
    vars: &mut ProblemVariables,
) -> SizeDeviationVars {
    let mut worst_bound = 0u32;
    let deviations = prep
        .projects
        .iter()
        .map(|project| {
            let bound = project.optimal_size().max(project.capacity - project.optimal_size());
            worst_bound = worst_bound.max(bound);
            vars.add(
                variable()
                    .integer()
                    .min(0)
                    .max(f64::from(bound))
                    .name(format!("dev_{}", project.id)),
            )
        })
        .collect();
    let worst = vars.add(
        variable()
            .integer()
            .min(0)
            .max(f64::from(worst_bound))
            .name("max_dev"),
    );
    SizeDeviationVars { deviations, worst }
}

/// Couple the auxiliaries to the group sizes: `dev[p] >= |size(p) - opt(p)|`
/// and `worst >= dev[p]`. Minimizing `worst` presses all of them down onto
/// the actual absolute values.
pub(crate) fn add_size_deviation_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
    deviation: &SizeDeviationVars,
) -> M {
    for (p, project) in prep.projects.iter().enumerate() {
        let mut size = Expression::from(0.0);
        for s in 0..prep.num_students() {
            size += v.x[[s, p]];
        }
        let opt = f64::from(project.optimal_size());
        let dev = deviation.deviations[p];
        model = model.with((size.clone() - dev).leq(opt));
        model = model.with((size + dev).geq(opt));
        model = model.with((Expression::from(dev) - deviation.worst).leq(0.0));
    }
    model
}

/// Number of lexicographic stages.
pub(crate) const NUM_STAGES: u32 = 4;

/// Stage names for log output, in priority order.
pub(crate) const STAGE_NAMES: [&str; NUM_STAGES as usize] =
    ["project rating", "programming roles", "friend pairs", "group size deviation"];

/// Lock-in factor per maximization stage: how much of the achieved value
/// later stages must preserve. Ratings are frozen exactly; the two middle
/// objectives leave one percent of slack so that later stages can still break
/// ties without numerical trouble.
pub(crate) const LOCK_FACTORS: [f64; 3] = [1.0, 0.99, 0.99];

/// The objective expression of one of the maximization stages (0..=2).
pub(crate) fn staged_objective(stage: usize, prep: &Prep, v: &ModelVars) -> Expression {
    match stage {
        0 => rating_objective(prep, v),
        1 => programming_objective(prep, v),
        2 => friends_objective(prep, v),
        _ => panic!("stage {} has no reusable objective expression", stage),
    }
}
