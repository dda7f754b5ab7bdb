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

//! Hard constraints of the assignment model.
//!
//! Every builder takes the prepared problem, the declared variables and a
//! solver model and returns the model with the constraints appended. The same
//! builders run for every stage of the lexicographic solve, so all stages
//! optimize over the identical feasible region.

use good_lp::{Expression, SolverModel};

use super::vars::{ModelVars, Prep};

/// Every student is placed in exactly one project.
pub(crate) fn add_single_assignment_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
) -> M {
    for s in 0..prep.num_students() {
        let mut sum = Expression::from(0.0);
        for p in 0..prep.num_projects() {
            sum += v.x[[s, p]];
        }
        model = model.with(sum.eq(1.0));
    }
    model
}

/// No project exceeds its capacity.
pub(crate) fn add_capacity_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
) -> M {
    for (p, project) in prep.projects.iter().enumerate() {
        let mut sum = Expression::from(0.0);
        for s in 0..prep.num_students() {
            sum += v.x[[s, p]];
        }
        model = model.with(sum.leq(f64::from(project.capacity)));
    }
    model
}

/// A project is either empty or holds at least `min_capacity` students.
///
/// The group size is coupled to the used-indicator on both sides:
/// `sum <= u * capacity` forces u to 1 as soon as anybody is placed, and
/// `sum >= u * min_capacity` then lifts the size to the minimum. With u = 0
/// both collapse to `sum = 0`.
pub(crate) fn add_empty_or_min_size_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
) -> M {
    for (p, project) in prep.projects.iter().enumerate() {
        let mut sum = Expression::from(0.0);
        for s in 0..prep.num_students() {
            sum += v.x[[s, p]];
        }
        model = model.with((sum.clone() - f64::from(project.capacity) * v.used[p]).leq(0.0));
        model = model.with((sum - f64::from(project.min_capacity) * v.used[p]).geq(0.0));
    }
    model
}

/// Vetoed students stay out of the vetoing project.
pub(crate) fn add_veto_constraints<M: SolverModel>(mut model: M, prep: &Prep, v: &ModelVars) -> M {
    for (p, vetoed) in prep.veto_indices.iter().enumerate() {
        if vetoed.is_empty() {
            continue;
        }
        let mut sum = Expression::from(0.0);
        for &s in vetoed {
            sum += v.x[[s, p]];
        }
        model = model.with(sum.eq(0.0));
    }
    model
}

/// A student fills at most one role, and only in the project they are placed
/// in.
pub(crate) fn add_single_role_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
) -> M {
    for (&(s, p), slots) in &prep.slots_by_student_project {
        let mut sum = Expression::from(0.0);
        for &slot in slots {
            sum += v.roles[slot];
        }
        model = model.with((sum - v.x[[s, p]]).leq(0.0));
    }
    model
}

/// No language slot of a project is credited more often than required.
pub(crate) fn add_role_capacity_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
) -> M {
    for (p, project_requirements) in prep.requirements.iter().enumerate() {
        for &(l, count) in project_requirements {
            let slots = match prep.slots_by_project_language.get(&(p, l)) {
                Some(slots) => slots,
                None => continue,
            };
            let mut sum = Expression::from(0.0);
            for &slot in slots {
                sum += v.roles[slot];
            }
            model = model.with(sum.leq(f64::from(count)));
        }
    }
    model
}

/// A friend pair only counts as together in a project when both students are
/// placed there. Maximization pushes the pair variable up to the AND of the
/// two clamps, so no explicit equality is needed.
pub(crate) fn add_friend_link_constraints<M: SolverModel>(
    mut model: M,
    prep: &Prep,
    v: &ModelVars,
) -> M {
    for (pair, &(a, b)) in prep.friend_pairs.iter().enumerate() {
        for p in 0..prep.num_projects() {
            let y = v.friends[pair][p];
            model = model.with((Expression::from(y) - v.x[[a, p]]).leq(0.0));
            model = model.with((Expression::from(y) - v.x[[b, p]]).leq(0.0));
        }
    }
    model
}

/// All hard constraints of the model, in declaration order.
pub(crate) fn add_base_constraints<M: SolverModel>(mut model: M, prep: &Prep, v: &ModelVars) -> M {
    model = add_single_assignment_constraints(model, prep, v);
    model = add_capacity_constraints(model, prep, v);
    model = add_empty_or_min_size_constraints(model, prep, v);
    model = add_veto_constraints(model, prep, v);
    model = add_single_role_constraints(model, prep, v);
    model = add_role_capacity_constraints(model, prep, v);
    model = add_friend_link_constraints(model, prep, v);
    model
}
