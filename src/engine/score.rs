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

//! Post-hoc evaluation of a finished assignment: the same four objective
//! values the engine optimizes, recomputed from the plain solution data.
//!
//! Used for operator-facing quality output and for checking that re-reading a
//! solution reproduces the staged objective values the solver reported.

use std::fmt::Display;

use serde::Serialize;

use crate::{Instance, Solution};

/// Number of positive project choices (rating >= 3) a student needs, relative
/// to the number of projects, to count towards the rating score. Must match
/// the engine's selection.
fn counts_for_rating(student: &crate::Student, num_projects: usize) -> bool {
    let positive_choices = student
        .projects_ratings
        .values()
        .filter(|&&rating| rating >= 3)
        .count();
    positive_choices as f64 >= 0.2 * num_projects as f64
}

/// Sum of the placed students' ratings for their project, restricted to the
/// students whose ratings the engine optimizes.
pub fn rating_total(instance: &Instance, solution: &Solution) -> u32 {
    let num_projects = instance.projects.len();
    solution
        .projects
        .iter()
        .flat_map(|(&project, members)| {
            members
                .iter()
                .filter(|student| counts_for_rating(student, num_projects))
                .map(move |student| u32::from(student.projects_ratings[&project]))
        })
        .sum()
}

/// Upper bound for `rating_total`: every counting student placed in a project
/// they gave their best rating.
pub fn theoretical_max_rating(instance: &Instance) -> u32 {
    let num_projects = instance.projects.len();
    instance
        .students
        .iter()
        .filter(|student| counts_for_rating(student, num_projects))
        .map(|student| {
            student
                .projects_ratings
                .values()
                .map(|&rating| u32::from(rating))
                .max()
                .unwrap_or(0)
        })
        .sum()
}

/// Sum of the skill levels of all assigned roles.
pub fn programming_total(solution: &Solution) -> u32 {
    solution.roles.values().map(|&role| u32::from(role)).sum()
}

/// Friend pairs placed in the same project, and the total number of pairs.
pub fn friend_pairs_together(instance: &Instance, solution: &Solution) -> (u32, u32) {
    let mut pairs = std::collections::BTreeSet::new();
    for student in &instance.students {
        for &friend in &student.friends {
            if friend != student.matr_number {
                pairs.insert((
                    student.matr_number.min(friend),
                    student.matr_number.max(friend),
                ));
            }
        }
    }

    let mut project_of = std::collections::HashMap::new();
    for (&project, members) in &solution.projects {
        for student in members {
            project_of.insert(student.matr_number, project);
        }
    }

    let together = pairs
        .iter()
        .filter(|(a, b)| match (project_of.get(a), project_of.get(b)) {
            (Some(pa), Some(pb)) => pa == pb,
            _ => false,
        })
        .count() as u32;
    (together, pairs.len() as u32)
}

/// The single worst distance of a project's group size from its optimal size.
/// Empty projects count with their full optimal size, matching the engine's
/// objective.
pub fn max_size_deviation(instance: &Instance, solution: &Solution) -> u32 {
    instance
        .projects
        .values()
        .map(|project| {
            let size = solution
                .projects
                .get(&project.id)
                .map(|members| members.len() as i64)
                .unwrap_or(0);
            (size - i64::from(project.optimal_size())).unsigned_abs() as u32
        })
        .max()
        .unwrap_or(0)
}

/// Mean utilization (size / capacity) of the non-empty projects.
pub fn average_utilization(instance: &Instance, solution: &Solution) -> f64 {
    let mut used = 0usize;
    let mut total = 0.0;
    for project in instance.projects.values() {
        let size = solution
            .projects
            .get(&project.id)
            .map(|members| members.len())
            .unwrap_or(0);
        if size > 0 {
            used += 1;
            total += size as f64 / f64::from(project.capacity);
        }
    }
    if used == 0 {
        0.0
    } else {
        total / used as f64
    }
}

/// Combined quality report for one solution, for log output and export.
#[derive(Debug, Serialize)]
pub struct QualityInfo {
    pub rating_total: u32,
    pub theoretical_max_rating: u32,
    pub programming_total: u32,
    pub friend_pairs_together: u32,
    pub friend_pairs_total: u32,
    pub max_size_deviation: u32,
    pub average_utilization: f64,
}

impl QualityInfo {
    pub fn calculate(instance: &Instance, solution: &Solution) -> Self {
        let (friend_pairs_together, friend_pairs_total) =
            friend_pairs_together(instance, solution);
        QualityInfo {
            rating_total: rating_total(instance, solution),
            theoretical_max_rating: theoretical_max_rating(instance),
            programming_total: programming_total(solution),
            friend_pairs_together,
            friend_pairs_total,
            max_size_deviation: max_size_deviation(instance, solution),
            average_utilization: average_utilization(instance, solution),
        }
    }
}

impl Display for QualityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rating total:          {: >6}
(best possible:        {: >6})
Programming total:     {: >6}
Friend pairs together: {: >6} of {}
Worst size deviation:  {: >6}
Average utilization:   {: >9.2}\n",
            self.rating_total,
            self.theoretical_max_rating,
            self.programming_total,
            self.friend_pairs_together,
            self.friend_pairs_total,
            self.max_size_deviation,
            self.average_utilization,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{instance, project, student};

    fn placed(instance: &Instance, placements: &[(u32, &[u32])]) -> Solution {
        let mut solution = Solution {
            projects: instance
                .projects
                .keys()
                .map(|&project| (project, Vec::new()))
                .collect(),
            roles: instance
                .students
                .iter()
                .map(|student| (student.matr_number, 0))
                .collect(),
        };
        for &(project, members) in placements {
            let list = solution.projects.get_mut(&project).unwrap();
            for &matr_number in members {
                let student = instance
                    .students
                    .iter()
                    .find(|student| student.matr_number == matr_number)
                    .unwrap();
                list.push(student.clone());
            }
        }
        solution
    }

    #[test]
    fn rating_total_skips_low_engagement_students() {
        // With two projects one positive choice suffices; student 1000001 has none.
        let s0 = student(1000000, &[(0, 5), (1, 2)]);
        let s1 = student(1000001, &[(0, 1), (1, 1)]);
        let instance = instance(vec![s0, s1], vec![project(0, 5, 5), project(1, 5, 5)]);
        let solution = placed(&instance, &[(0, &[1000000, 1000001])]);

        assert_eq!(rating_total(&instance, &solution), 5);
        assert_eq!(theoretical_max_rating(&instance), 5);
    }

    #[test]
    fn friend_pairs_are_counted_once() {
        let mut s0 = student(1000000, &[(0, 3)]);
        let mut s1 = student(1000001, &[(0, 3)]);
        s0.friends = vec![1000001];
        s1.friends = vec![1000000];
        let instance = instance(vec![s0, s1], vec![project(0, 5, 5)]);
        let solution = placed(&instance, &[(0, &[1000000, 1000001])]);

        assert_eq!(friend_pairs_together(&instance, &solution), (1, 1));
    }

    #[test]
    fn utilization_averages_over_used_projects_only() {
        use assert_float_eq::*;

        let students: Vec<_> = (0..4)
            .map(|i| student(1000000 + i, &[(0, 3), (1, 3)]))
            .collect();
        let instance = instance(students, vec![project(0, 5, 5), project(1, 8, 5)]);
        let solution = placed(&instance, &[(0, &[1000000, 1000001, 1000002, 1000003])]);

        // Project 1 is empty and must not drag the mean down.
        assert_f64_near!(average_utilization(&instance, &solution), 0.8);
    }

    #[test]
    fn empty_projects_deviate_by_their_optimal_size() {
        let instance = instance(
            vec![student(1000000, &[(0, 3), (1, 3)])],
            vec![project(0, 5, 5), project(1, 9, 5)],
        );
        let solution = placed(&instance, &[(0, &[1000000])]);

        // Project 1 is empty with optimal size (9 + 5) / 2 = 7.
        assert_eq!(max_size_deviation(&instance, &solution), 7);
    }
}
