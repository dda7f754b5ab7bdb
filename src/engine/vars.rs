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

//! Index precomputation and decision-variable declaration for the assignment model.
//!
//! `Prep` is computed once per engine and turns the map-shaped instance data into
//! dense indexes (students by position, projects sorted by id, interned language
//! names), plus the derived data the model builders need: the rating and skill
//! matrices, the sparse role-slot list, the deduplicated friend pairs and the
//! set of students whose ratings count towards the rating objective.
//!
//! `ModelVars` is declared freshly for every solver run, in a fixed order, so
//! that repeated runs build bit-identical models.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use good_lp::{variable, ProblemVariables, Variable};

use crate::{Instance, Project};

/// One potential programming role: student `student` filling a slot for
/// language `language` in project `project`. Only combinations where the
/// project requires the language and the student has a skill rating for it
/// get a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RoleSlot {
    pub language: usize,
    pub student: usize,
    pub project: usize,
}

/// Precomputed problem definition, reused for every stage of the
/// lexicographic solve.
pub(crate) struct Prep {
    /// Projects in dense index order (ascending id)
    pub projects: Vec<Project>,
    /// matr_number -> student index
    pub student_index: HashMap<u32, usize>,
    /// Rating r[s, p] of student s for project p
    pub ratings: ndarray::Array2<u8>,
    /// Interned names of all languages required by at least one project
    pub languages: Vec<String>,
    /// Skill level of student s in language l (0 = no rating given)
    pub skills: ndarray::Array2<u8>,
    /// Per project: (language index, required slot count), count > 0
    pub requirements: Vec<Vec<(usize, u32)>>,
    /// All role slots, in variable declaration order
    pub role_slots: Vec<RoleSlot>,
    /// Indexes into `role_slots`, grouped by (student, project)
    pub slots_by_student_project: BTreeMap<(usize, usize), Vec<usize>>,
    /// Indexes into `role_slots`, grouped by (project, language)
    pub slots_by_project_language: BTreeMap<(usize, usize), Vec<usize>>,
    /// Unordered friend pairs as (smaller student index, larger student index)
    pub friend_pairs: Vec<(usize, usize)>,
    /// Students whose project ratings count towards the rating objective
    pub rated: Vec<bool>,
    /// Per project: student indexes banned from it
    pub veto_indices: Vec<Vec<usize>>,
}

impl Prep {
    pub fn num_students(&self) -> usize {
        self.ratings.dim().0
    }

    pub fn num_projects(&self) -> usize {
        self.projects.len()
    }
}

/// Share of the project list a student must rate positively (>= 3) for their
/// ratings to be considered in the rating objective. Students below the
/// threshold are close to indifferent, and their ratings would otherwise let
/// the solver shuffle them around for negligible gain at the expense of
/// students with clear preferences.
const POSITIVE_CHOICE_SHARE: f64 = 0.2;

/// Build the dense problem definition from a validated instance.
pub(crate) fn build_prep(instance: &Instance) -> Prep {
    let students = &instance.students;
    let projects: Vec<Project> = instance.projects.values().cloned().collect();
    let n = students.len();
    let m = projects.len();

    let student_index: HashMap<u32, usize> = students
        .iter()
        .enumerate()
        .map(|(s, student)| (student.matr_number, s))
        .collect();

    // Ratings are validated to be complete, so the lookup cannot fail.
    let mut ratings = ndarray::Array2::<u8>::zeros([n, m]);
    for (s, student) in students.iter().enumerate() {
        for (p, project) in projects.iter().enumerate() {
            ratings[[s, p]] = student.projects_ratings[&project.id];
        }
    }

    let languages: Vec<String> = projects
        .iter()
        .flat_map(|project| project.programming_requirements.keys().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    let language_index: HashMap<&str, usize> = languages
        .iter()
        .enumerate()
        .map(|(l, name)| (name.as_str(), l))
        .collect();

    let mut skills = ndarray::Array2::<u8>::zeros([n, languages.len()]);
    for (s, student) in students.iter().enumerate() {
        for (name, &level) in &student.programming_language_ratings {
            if let Some(&l) = language_index.get(name.as_str()) {
                skills[[s, l]] = level;
            }
        }
    }

    let requirements: Vec<Vec<(usize, u32)>> = projects
        .iter()
        .map(|project| {
            project
                .programming_requirements
                .iter()
                .filter(|(_, &count)| count > 0)
                .map(|(name, &count)| (language_index[name.as_str()], count))
                .collect()
        })
        .collect();

    let mut role_slots = Vec::new();
    let mut slots_by_student_project: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    let mut slots_by_project_language: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for (p, project_requirements) in requirements.iter().enumerate() {
        for &(l, _) in project_requirements {
            for s in 0..n {
                if skills[[s, l]] == 0 {
                    continue;
                }
                let slot = role_slots.len();
                role_slots.push(RoleSlot {
                    language: l,
                    student: s,
                    project: p,
                });
                slots_by_student_project.entry((s, p)).or_default().push(slot);
                slots_by_project_language.entry((p, l)).or_default().push(slot);
            }
        }
    }

    // A pair counts once, no matter whether one or both students listed the
    // other; self-references are dropped.
    let mut pair_set = BTreeSet::new();
    for (s, student) in students.iter().enumerate() {
        for friend in &student.friends {
            let f = student_index[friend];
            if f != s {
                pair_set.insert((s.min(f), s.max(f)));
            }
        }
    }
    let friend_pairs: Vec<(usize, usize)> = pair_set.into_iter().collect();

    let positive_threshold = POSITIVE_CHOICE_SHARE * m as f64;
    let rated: Vec<bool> = students
        .iter()
        .map(|student| {
            let positive_choices = student
                .projects_ratings
                .values()
                .filter(|&&rating| rating >= 3)
                .count();
            positive_choices as f64 >= positive_threshold
        })
        .collect();

    let veto_indices: Vec<Vec<usize>> = projects
        .iter()
        .map(|project| {
            project
                .veto
                .iter()
                .map(|student| student_index[&student.matr_number])
                .collect()
        })
        .collect();

    Prep {
        projects,
        student_index,
        ratings,
        languages,
        skills,
        requirements,
        role_slots,
        slots_by_student_project,
        slots_by_project_language,
        friend_pairs,
        rated,
        veto_indices,
    }
}

/// The decision variables of one solver run. All binary.
pub(crate) struct ModelVars {
    /// x[s, p]: student s is placed in project p
    pub x: ndarray::Array2<Variable>,
    /// u[p]: project p has at least one student
    pub used: Vec<Variable>,
    /// q[slot]: the role slot is filled, parallel to `Prep::role_slots`
    pub roles: Vec<Variable>,
    /// y[pair][p]: both students of `Prep::friend_pairs[pair]` are in project p
    pub friends: Vec<Vec<Variable>>,
}

/// Declare all decision variables, in a fixed order determined by `prep`.
pub(crate) fn declare_variables(prep: &Prep, vars: &mut ProblemVariables) -> ModelVars {
    let instance_students: Vec<u32> = {
        // Variable names carry matr number and project id for solver log output.
        let mut matr = vec![0u32; prep.num_students()];
        for (&matr_number, &s) in &prep.student_index {
            matr[s] = matr_number;
        }
        matr
    };

    let x = ndarray::Array2::from_shape_fn([prep.num_students(), prep.num_projects()], |(s, p)| {
        vars.add(
            variable()
                .binary()
                .name(format!("x_{}_{}", instance_students[s], prep.projects[p].id)),
        )
    });

    let used = prep
        .projects
        .iter()
        .map(|project| vars.add(variable().binary().name(format!("u_{}", project.id))))
        .collect();

    let roles = prep
        .role_slots
        .iter()
        .map(|slot| {
            vars.add(variable().binary().name(format!(
                "q_{}_{}_{}",
                prep.languages[slot.language],
                instance_students[slot.student],
                prep.projects[slot.project].id
            )))
        })
        .collect();

    let friends = prep
        .friend_pairs
        .iter()
        .map(|&(a, b)| {
            prep.projects
                .iter()
                .map(|project| {
                    vars.add(variable().binary().name(format!(
                        "y_{}_{}_{}",
                        instance_students[a], instance_students[b], project.id
                    )))
                })
                .collect()
        })
        .collect();

    ModelVars {
        x,
        used,
        roles,
        friends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{instance, project, student};

    #[test]
    fn role_slots_are_sparse() {
        // Project 0 requires Python; only students with a Python rating get a slot.
        let mut p0 = project(0, 5, 5);
        p0.programming_requirements.insert("Python".into(), 2);
        let mut s0 = student(1000000, &[(0, 5)]);
        s0.programming_language_ratings.insert("Python".into(), 3);
        let s1 = student(1000001, &[(0, 5)]);
        let instance = instance(vec![s0, s1], vec![p0]);

        let prep = build_prep(&instance);
        assert_eq!(prep.languages, vec!["Python".to_string()]);
        assert_eq!(
            prep.role_slots,
            vec![RoleSlot {
                language: 0,
                student: 0,
                project: 0
            }]
        );
    }

    #[test]
    fn zero_count_requirements_get_no_slots() {
        let mut p0 = project(0, 5, 5);
        p0.programming_requirements.insert("Java".into(), 0);
        let mut s0 = student(1000000, &[(0, 3)]);
        s0.programming_language_ratings.insert("Java".into(), 4);
        let instance = instance(vec![s0], vec![p0]);

        let prep = build_prep(&instance);
        assert!(prep.role_slots.is_empty());
        assert!(prep.requirements[0].is_empty());
    }

    #[test]
    fn friend_pairs_are_deduplicated() {
        let mut s0 = student(1000000, &[(0, 3)]);
        let mut s1 = student(1000001, &[(0, 3)]);
        let mut s2 = student(1000002, &[(0, 3)]);
        // Mutual pair, a one-sided pair and a self reference.
        s0.friends = vec![1000001];
        s1.friends = vec![1000000, 1000002];
        s2.friends = vec![1000002];
        let instance = instance(vec![s0, s1, s2], vec![project(0, 5, 5)]);

        let prep = build_prep(&instance);
        assert_eq!(prep.friend_pairs, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn rating_objective_membership_follows_positive_choices() {
        // 10 projects, so two ratings >= 3 are required for inclusion.
        let projects: Vec<_> = (0..10).map(|id| project(id, 5, 5)).collect();
        let ratings_low: Vec<(u32, u8)> = (0..10).map(|id| (id, if id == 5 { 2 } else { 1 })).collect();
        let ratings_high: Vec<(u32, u8)> = (0..10).map(|id| (id, if id < 2 { 3 } else { 1 })).collect();
        let s0 = student(1000000, &ratings_low);
        let s1 = student(1000001, &ratings_high);
        let instance = instance(vec![s0, s1], projects);

        let prep = build_prep(&instance);
        assert_eq!(prep.rated, vec![false, true]);
    }
}
