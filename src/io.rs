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

//! JSON ingestion and serialization of instances and solutions, plus
//! human-readable solution formatting.
//!
//! The instance format is an object with a `students` list and a `projects`
//! map keyed by project id; the solution format is the `projects` map of
//! placed students plus the `roles` map per matriculation number. Instances
//! are validated on read, so everything behind this module can rely on the
//! invariants.

use std::fmt::Write;

use thiserror::Error;

use crate::{Instance, Solution, ValidationError};

/// Failure while reading an instance or solution from external input
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid instance: {0}")]
    Validation(#[from] ValidationError),
}

/// Read and validate an instance from its JSON representation.
pub fn read_instance<R: std::io::Read>(reader: R) -> Result<Instance, ReadError> {
    let instance: Instance = serde_json::from_reader(reader)?;
    instance.validate()?;
    Ok(instance)
}

/// Read a previously exported solution from its JSON representation.
pub fn read_solution<R: std::io::Read>(reader: R) -> Result<Solution, ReadError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Write an instance as indented JSON (e.g. for generated test data).
pub fn write_instance<W: std::io::Write>(
    writer: W,
    instance: &Instance,
) -> Result<(), serde_json::Error> {
    serde_json::to_writer_pretty(writer, instance)
}

/// Write a calculated solution as indented JSON.
pub fn write_solution<W: std::io::Write>(
    writer: W,
    solution: &Solution,
) -> Result<(), serde_json::Error> {
    serde_json::to_writer_pretty(writer, solution)
}

/// Format the calculated assignment into a human readable String (e.g. to
/// print it to stdout).
///
/// The output format will look like
/// ```text
/// ===== Database Tool =====
/// (6 students, optimal size 6)
/// - Anna Admin (1000001)
/// - Bernd Beispiel (1000002) [role level 4]
///
/// ===== Web Shop =====
/// …
/// ```
pub fn format_solution(solution: &Solution, instance: &Instance) -> String {
    let mut result = String::new();
    for project in instance.projects.values() {
        write!(result, "\n===== {} =====\n", project.name).unwrap();
        let members = solution
            .projects
            .get(&project.id)
            .map(|members| members.as_slice())
            .unwrap_or(&[]);
        writeln!(
            result,
            "({} students, optimal size {})",
            members.len(),
            project.optimal_size()
        )
        .unwrap();
        for student in members {
            let role = solution
                .roles
                .get(&student.matr_number)
                .copied()
                .unwrap_or(0);
            writeln!(
                result,
                "- {} {} ({}){}",
                student.first_name,
                student.last_name,
                student.matr_number,
                if role > 0 {
                    format!(" [role level {}]", role)
                } else {
                    String::new()
                }
            )
            .unwrap();
        }
    }

    result
}

pub fn debug_list_of_projects(instance: &Instance) -> String {
    instance
        .projects
        .values()
        .map(|project| {
            format!(
                "{:02} {} (size {}..={}, {} vetoes)",
                project.id,
                project.name,
                project.min_capacity,
                project.capacity,
                project.veto.len()
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE_JSON: &str = r#"{
        "students": [
            {
                "last_name": "Admin",
                "first_name": "Anna",
                "matr_number": 1000001,
                "projects_ratings": {"0": 5},
                "programming_language_ratings": {"Python": 3},
                "friends": []
            },
            {
                "last_name": "Beispiel",
                "first_name": "Bernd",
                "matr_number": 1000002,
                "projects_ratings": {"0": 2},
                "programming_language_ratings": {"Java": 1}
            }
        ],
        "projects": {
            "0": {
                "id": 0,
                "name": "Database Tool",
                "capacity": 6,
                "min_capacity": 5,
                "veto": [],
                "programming_requirements": {"Python": 1}
            }
        }
    }"#;

    #[test]
    fn reads_and_validates_an_instance() {
        let instance = read_instance(INSTANCE_JSON.as_bytes()).unwrap();
        assert_eq!(instance.students.len(), 2);
        assert_eq!(instance.projects[&0].name, "Database Tool");
        assert_eq!(instance.students[1].friends.len(), 0);
        assert_eq!(instance.projects[&0].optimal_size(), 5);
    }

    #[test]
    fn rejects_an_invalid_instance() {
        let broken = INSTANCE_JSON.replace("\"matr_number\": 1000002", "\"matr_number\": 1000001");
        match read_instance(broken.as_bytes()) {
            Err(ReadError::Validation(ValidationError::DuplicateMatrNumber(1000001))) => {}
            other => panic!("expected a duplicate matr number error, got {:?}", other),
        }
    }

    #[test]
    fn solution_roundtrips_through_json() {
        let instance = read_instance(INSTANCE_JSON.as_bytes()).unwrap();
        let solution = Solution {
            projects: vec![(0, instance.students.clone())].into_iter().collect(),
            roles: vec![(1000001, 3), (1000002, 0)].into_iter().collect(),
        };
        let mut buffer = Vec::new();
        write_solution(&mut buffer, &solution).unwrap();
        let reread = read_solution(buffer.as_slice()).unwrap();
        assert_eq!(reread.projects[&0].len(), 2);
        assert_eq!(reread.roles[&1000001], 3);
    }

    #[test]
    fn formats_a_solution_for_humans() {
        let instance = read_instance(INSTANCE_JSON.as_bytes()).unwrap();
        let solution = Solution {
            projects: vec![(0, instance.students.clone())].into_iter().collect(),
            roles: vec![(1000001, 3), (1000002, 0)].into_iter().collect(),
        };
        let text = format_solution(&solution, &instance);
        assert!(text.contains("===== Database Tool ====="));
        assert!(text.contains("- Anna Admin (1000001) [role level 3]"));
        assert!(text.contains("- Bernd Beispiel (1000002)\n"));
    }
}
