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

//! Independent re-check of all hard invariants of a produced assignment.
//!
//! This pass works on the plain instance and solution data and deliberately
//! shares no code with the solver layer: a violation reported here means the
//! engine (not the input) is broken, so the check must not inherit the
//! engine's view of the problem.

use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::{Instance, Solution};

/// A hard invariant violated by a produced assignment. Always a programming
/// error in the engine, never a data error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("student {matr_number} is placed in {count} projects instead of exactly one")]
    PlacementCountWrong { matr_number: u32, count: u32 },
    #[error("project {project} lists unknown student {matr_number}")]
    UnknownStudent { project: u32, matr_number: u32 },
    #[error("solution is missing project {project}")]
    MissingProject { project: u32 },
    #[error("solution contains unknown project {project}")]
    UnknownProject { project: u32 },
    #[error("project {project} holds {size} students, above its capacity {capacity}")]
    OverCapacity {
        project: u32,
        size: u32,
        capacity: u32,
    },
    #[error("project {project} holds {size} students, below its minimum size {min_capacity}")]
    BelowMinimumSize {
        project: u32,
        size: u32,
        min_capacity: u32,
    },
    #[error("student {matr_number} is placed in project {project} despite its veto")]
    VetoViolated { project: u32, matr_number: u32 },
    #[error("student {matr_number} has role level {role} not matching any skill usable in project {project}")]
    RoleWithoutMatchingSkill {
        project: u32,
        matr_number: u32,
        role: u8,
    },
    #[error("project {project} credits {count} roles for {language}, above its requirement {required}")]
    TooManyRoles {
        project: u32,
        language: String,
        count: u32,
        required: u32,
    },
}

/// Re-check a produced assignment against the raw instance data: every
/// student placed exactly once, group sizes empty or within bounds, vetoes
/// respected, and roles backed by a matching requirement and skill.
pub fn verify_solution(instance: &Instance, solution: &Solution) -> Result<(), VerifyError> {
    let known_students: HashSet<u32> = instance
        .students
        .iter()
        .map(|student| student.matr_number)
        .collect();

    for &project in solution.projects.keys() {
        if !instance.projects.contains_key(&project) {
            return Err(VerifyError::UnknownProject { project });
        }
    }

    let mut placement_counts: HashMap<u32, u32> = HashMap::new();
    let mut project_of: HashMap<u32, u32> = HashMap::new();
    for (&project, members) in &solution.projects {
        for student in members {
            if !known_students.contains(&student.matr_number) {
                return Err(VerifyError::UnknownStudent {
                    project,
                    matr_number: student.matr_number,
                });
            }
            *placement_counts.entry(student.matr_number).or_default() += 1;
            project_of.insert(student.matr_number, project);
        }
    }
    for student in &instance.students {
        let count = placement_counts
            .get(&student.matr_number)
            .copied()
            .unwrap_or(0);
        if count != 1 {
            return Err(VerifyError::PlacementCountWrong {
                matr_number: student.matr_number,
                count,
            });
        }
    }

    for project in instance.projects.values() {
        let members = solution
            .projects
            .get(&project.id)
            .ok_or(VerifyError::MissingProject {
                project: project.id,
            })?;
        let size = members.len() as u32;
        if size > project.capacity {
            return Err(VerifyError::OverCapacity {
                project: project.id,
                size,
                capacity: project.capacity,
            });
        }
        if size > 0 && size < project.min_capacity {
            return Err(VerifyError::BelowMinimumSize {
                project: project.id,
                size,
                min_capacity: project.min_capacity,
            });
        }
        for vetoed in &project.veto {
            if members
                .iter()
                .any(|student| student.matr_number == vetoed.matr_number)
            {
                return Err(VerifyError::VetoViolated {
                    project: project.id,
                    matr_number: vetoed.matr_number,
                });
            }
        }
    }

    // Roles: every non-zero role must be explainable as the student's own
    // skill level in some language their project requires, and per project
    // no language may be credited beyond its requirement.
    let mut credited: BTreeMap<(u32, &str), u32> = BTreeMap::new();
    for student in &instance.students {
        let role = solution
            .roles
            .get(&student.matr_number)
            .copied()
            .unwrap_or(0);
        if role == 0 {
            continue;
        }
        // Placement is already verified above, so the lookup succeeds.
        let project_id = project_of[&student.matr_number];
        let project = &instance.projects[&project_id];
        let language = project
            .programming_requirements
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(language, _)| language.as_str())
            .find(|language| {
                student.programming_language_ratings.get(*language).copied() == Some(role)
            });
        match language {
            Some(language) => {
                *credited.entry((project_id, language)).or_default() += 1;
            }
            None => {
                return Err(VerifyError::RoleWithoutMatchingSkill {
                    project: project_id,
                    matr_number: student.matr_number,
                    role,
                });
            }
        }
    }
    for ((project_id, language), count) in credited {
        let required = instance.projects[&project_id].programming_requirements[language];
        if count > required {
            return Err(VerifyError::TooManyRoles {
                project: project_id,
                language: language.to_string(),
                count,
                required,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{instance, project, student};
    use crate::Solution;

    fn five_students() -> Vec<crate::Student> {
        (0..5)
            .map(|i| student(1000000 + i, &[(0, 3)]))
            .collect()
    }

    fn solution_with_all_in_project_0(instance: &Instance) -> Solution {
        Solution {
            projects: vec![(0, instance.students.clone())].into_iter().collect(),
            roles: instance
                .students
                .iter()
                .map(|student| (student.matr_number, 0))
                .collect(),
        }
    }

    #[test]
    fn accepts_a_correct_assignment() {
        let instance = instance(five_students(), vec![project(0, 5, 5)]);
        let solution = solution_with_all_in_project_0(&instance);
        assert_eq!(verify_solution(&instance, &solution), Ok(()));
    }

    #[test]
    fn detects_missing_placement() {
        let instance = instance(five_students(), vec![project(0, 5, 5)]);
        let mut solution = solution_with_all_in_project_0(&instance);
        solution.projects.get_mut(&0).unwrap().pop();
        assert_eq!(
            verify_solution(&instance, &solution),
            Err(VerifyError::PlacementCountWrong {
                matr_number: 1000004,
                count: 0
            })
        );
    }

    #[test]
    fn detects_duplicate_placement() {
        let students = (0..5)
            .map(|i| student(1000000 + i, &[(0, 3), (1, 3)]))
            .collect();
        let instance = instance(students, vec![project(0, 5, 5), project(1, 5, 5)]);
        let mut solution = solution_with_all_in_project_0(&instance);
        solution
            .projects
            .insert(1, vec![instance.students[0].clone()]);
        let result = verify_solution(&instance, &solution);
        assert!(matches!(
            result,
            Err(VerifyError::PlacementCountWrong {
                matr_number: 1000000,
                count: 2
            }) | Err(VerifyError::BelowMinimumSize { .. })
        ));
    }

    #[test]
    fn detects_undersized_group() {
        let mut students = five_students();
        students.pop();
        let instance = instance(students, vec![project(0, 6, 5)]);
        let solution = solution_with_all_in_project_0(&instance);
        assert_eq!(
            verify_solution(&instance, &solution),
            Err(VerifyError::BelowMinimumSize {
                project: 0,
                size: 4,
                min_capacity: 5
            })
        );
    }

    #[test]
    fn detects_veto_violation() {
        let mut projects = vec![project(0, 5, 5)];
        let students = five_students();
        projects[0].veto.push(students[2].clone());
        let instance = instance(students, projects);
        let solution = solution_with_all_in_project_0(&instance);
        assert_eq!(
            verify_solution(&instance, &solution),
            Err(VerifyError::VetoViolated {
                project: 0,
                matr_number: 1000002
            })
        );
    }

    #[test]
    fn detects_role_without_requirement() {
        let instance = instance(five_students(), vec![project(0, 5, 5)]);
        let mut solution = solution_with_all_in_project_0(&instance);
        solution.roles.insert(1000001, 3);
        assert_eq!(
            verify_solution(&instance, &solution),
            Err(VerifyError::RoleWithoutMatchingSkill {
                project: 0,
                matr_number: 1000001,
                role: 3
            })
        );
    }

    #[test]
    fn detects_oversubscribed_language() {
        let mut projects = vec![project(0, 5, 5)];
        projects[0].programming_requirements.insert("Python".into(), 1);
        let mut students = five_students();
        for student in students.iter_mut() {
            student
                .programming_language_ratings
                .insert("Python".into(), 2);
        }
        let instance = instance(students, projects);
        let mut solution = solution_with_all_in_project_0(&instance);
        solution.roles.insert(1000000, 2);
        solution.roles.insert(1000001, 2);
        assert_eq!(
            verify_solution(&instance, &solution),
            Err(VerifyError::TooManyRoles {
                project: 0,
                language: "Python".to_string(),
                count: 2,
                required: 1
            })
        );
    }
}
