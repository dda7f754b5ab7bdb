
pub mod engine;
pub mod gen;
pub mod io;
pub mod verify;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Representation of a student registered for the software engineering course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    /// Student's last name. Mainly used for info/debug output
    pub last_name: String,
    /// Student's first name
    pub first_name: String,
    /// The 7-digit matriculation number. Identity of a student within an instance
    pub matr_number: u32,
    /// Preference rating (1..=5) per project id. Must contain an entry for every project
    pub projects_ratings: BTreeMap<u32, u8>,
    /// Self-assessed skill level (1..=4) per programming language name
    pub programming_language_ratings: BTreeMap<String, u8>,
    /// Matriculation numbers of up to two preferred partners
    #[serde(default)]
    pub friends: Vec<u32>,
}

/// Representation of a course project that student groups can be assigned to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project id. Identity of a project within an instance
    pub id: u32,
    /// Project's display name
    pub name: String,
    /// Maximum number of students
    pub capacity: u32,
    /// Minimum number of students, unless the project stays empty
    pub min_capacity: u32,
    /// Students who must not be placed in this project
    #[serde(default)]
    pub veto: Vec<Student>,
    /// Required number of role slots per programming language name
    #[serde(default)]
    pub programming_requirements: BTreeMap<String, u32>,
    /// Target group size. Derived from the capacities if not configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_size: Option<u32>,
}

impl Project {
    /// The target group size used by the size-deviation objective: the configured
    /// `opt_size`, or the midpoint of `min_capacity` and `capacity` (rounded down).
    pub fn optimal_size(&self) -> u32 {
        self.opt_size
            .unwrap_or((self.capacity + self.min_capacity) / 2)
    }
}

/// A full, self-contained assignment problem: the student cohort and the
/// offered projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub students: Vec<Student>,
    pub projects: BTreeMap<u32, Project>,
}

/// A calculated assignment: the placed students per project and the
/// programming role per student.
///
/// A role entry is either 0 (no role) or the student's skill level in the
/// language they fill a slot for within their project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub projects: BTreeMap<u32, Vec<Student>>,
    pub roles: BTreeMap<u32, u8>,
}

/// Violation of one of the instance invariants, detected at ingestion
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("matriculation number {0} has more than 7 digits")]
    MatrNumberTooLarge(u32),
    #[error("duplicate matriculation number {0}")]
    DuplicateMatrNumber(u32),
    #[error("student {matr_number} rates unknown project {project}")]
    UnknownRatedProject { matr_number: u32, project: u32 },
    #[error("student {matr_number} has no rating for project {project}")]
    MissingProjectRating { matr_number: u32, project: u32 },
    #[error("student {matr_number} rates project {project} with {rating}, must be 1..=5")]
    RatingOutOfRange {
        matr_number: u32,
        project: u32,
        rating: u8,
    },
    #[error("student {matr_number} has skill level {level} for {language}, must be 1..=4")]
    SkillOutOfRange {
        matr_number: u32,
        language: String,
        level: u8,
    },
    #[error("student {0} lists more than two friends")]
    TooManyFriends(u32),
    #[error("student {matr_number} lists unknown friend {friend}")]
    UnknownFriend { matr_number: u32, friend: u32 },
    #[error("project key {key} does not match project id {id}")]
    ProjectIdMismatch { key: u32, id: u32 },
    #[error("capacity {capacity} of project {project} is too small, must be at least 5")]
    CapacityTooSmall { project: u32, capacity: u32 },
    #[error("minimum capacity {min_capacity} of project {project} is too small, must be at least 5")]
    MinCapacityTooSmall { project: u32, min_capacity: u32 },
    #[error("minimum capacity {min_capacity} of project {project} exceeds its capacity {capacity}")]
    MinAboveCapacity {
        project: u32,
        min_capacity: u32,
        capacity: u32,
    },
    #[error("optimal size {opt_size} of project {project} is outside [{min_capacity}, {capacity}]")]
    OptSizeOutOfRange {
        project: u32,
        opt_size: u32,
        min_capacity: u32,
        capacity: u32,
    },
    #[error("project {project} vetoes unknown student {matr_number}")]
    UnknownVetoStudent { project: u32, matr_number: u32 },
    #[error("{students} students exceed the total project capacity of {capacity}")]
    InsufficientCapacity { students: u32, capacity: u32 },
}

impl Instance {
    /// Check all instance invariants. The engine relies on them, so this must be
    /// called on every instance built from external input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut matr_numbers = std::collections::HashSet::new();
        for student in &self.students {
            if student.matr_number > 9_999_999 {
                return Err(ValidationError::MatrNumberTooLarge(student.matr_number));
            }
            if !matr_numbers.insert(student.matr_number) {
                return Err(ValidationError::DuplicateMatrNumber(student.matr_number));
            }
        }

        for student in &self.students {
            for (&project, &rating) in &student.projects_ratings {
                if !self.projects.contains_key(&project) {
                    return Err(ValidationError::UnknownRatedProject {
                        matr_number: student.matr_number,
                        project,
                    });
                }
                if !(1..=5).contains(&rating) {
                    return Err(ValidationError::RatingOutOfRange {
                        matr_number: student.matr_number,
                        project,
                        rating,
                    });
                }
            }
            // The assignment variables carry one rating weight per (student, project)
            // pair, so partial rating maps cannot be solved.
            for &project in self.projects.keys() {
                if !student.projects_ratings.contains_key(&project) {
                    return Err(ValidationError::MissingProjectRating {
                        matr_number: student.matr_number,
                        project,
                    });
                }
            }
            for (language, &level) in &student.programming_language_ratings {
                if !(1..=4).contains(&level) {
                    return Err(ValidationError::SkillOutOfRange {
                        matr_number: student.matr_number,
                        language: language.clone(),
                        level,
                    });
                }
            }
            if student.friends.len() > 2 {
                return Err(ValidationError::TooManyFriends(student.matr_number));
            }
            for &friend in &student.friends {
                if !matr_numbers.contains(&friend) {
                    return Err(ValidationError::UnknownFriend {
                        matr_number: student.matr_number,
                        friend,
                    });
                }
            }
        }

        for (&key, project) in &self.projects {
            if key != project.id {
                return Err(ValidationError::ProjectIdMismatch {
                    key,
                    id: project.id,
                });
            }
            if project.capacity < 5 {
                return Err(ValidationError::CapacityTooSmall {
                    project: project.id,
                    capacity: project.capacity,
                });
            }
            if project.min_capacity < 5 {
                return Err(ValidationError::MinCapacityTooSmall {
                    project: project.id,
                    min_capacity: project.min_capacity,
                });
            }
            if project.min_capacity > project.capacity {
                return Err(ValidationError::MinAboveCapacity {
                    project: project.id,
                    min_capacity: project.min_capacity,
                    capacity: project.capacity,
                });
            }
            if let Some(opt_size) = project.opt_size {
                if opt_size < project.min_capacity || opt_size > project.capacity {
                    return Err(ValidationError::OptSizeOutOfRange {
                        project: project.id,
                        opt_size,
                        min_capacity: project.min_capacity,
                        capacity: project.capacity,
                    });
                }
            }
            for vetoed in &project.veto {
                if !matr_numbers.contains(&vetoed.matr_number) {
                    return Err(ValidationError::UnknownVetoStudent {
                        project: project.id,
                        matr_number: vetoed.matr_number,
                    });
                }
            }
        }

        let total_capacity: u32 = self.projects.values().map(|p| p.capacity).sum();
        if self.students.len() as u32 > total_capacity {
            return Err(ValidationError::InsufficientCapacity {
                students: self.students.len() as u32,
                capacity: total_capacity,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_instance() -> Instance {
        let student = Student {
            last_name: "Doe".into(),
            first_name: "Joe".into(),
            matr_number: 1000000,
            projects_ratings: vec![(0, 3)].into_iter().collect(),
            programming_language_ratings: vec![("Python".to_string(), 2)].into_iter().collect(),
            friends: vec![],
        };
        let project = Project {
            id: 0,
            name: "Project 0".into(),
            capacity: 5,
            min_capacity: 5,
            veto: vec![],
            programming_requirements: BTreeMap::new(),
            opt_size: None,
        };
        Instance {
            students: vec![student],
            projects: vec![(0, project)].into_iter().collect(),
        }
    }

    #[test]
    fn valid_instance_passes() {
        assert_eq!(minimal_instance().validate(), Ok(()));
    }

    #[test]
    fn optimal_size_is_derived_when_absent() {
        let mut project = minimal_instance().projects[&0].clone();
        project.capacity = 12;
        project.min_capacity = 5;
        assert_eq!(project.optimal_size(), 8);
        project.opt_size = Some(6);
        assert_eq!(project.optimal_size(), 6);
    }

    #[test]
    fn duplicate_matr_number_is_rejected() {
        let mut instance = minimal_instance();
        let duplicate = instance.students[0].clone();
        instance.students.push(duplicate);
        assert_eq!(
            instance.validate(),
            Err(ValidationError::DuplicateMatrNumber(1000000))
        );
    }

    #[test]
    fn missing_rating_is_rejected() {
        let mut instance = minimal_instance();
        instance.students[0].projects_ratings.clear();
        assert_eq!(
            instance.validate(),
            Err(ValidationError::MissingProjectRating {
                matr_number: 1000000,
                project: 0
            })
        );
    }

    #[test]
    fn rating_for_unknown_project_is_rejected() {
        let mut instance = minimal_instance();
        instance.students[0].projects_ratings.insert(7, 4);
        assert_eq!(
            instance.validate(),
            Err(ValidationError::UnknownRatedProject {
                matr_number: 1000000,
                project: 7
            })
        );
    }

    #[test]
    fn capacity_bounds_are_checked() {
        let mut instance = minimal_instance();
        instance.projects.get_mut(&0).unwrap().min_capacity = 9;
        assert_eq!(
            instance.validate(),
            Err(ValidationError::MinAboveCapacity {
                project: 0,
                min_capacity: 9,
                capacity: 5
            })
        );
    }

    #[test]
    fn unknown_veto_student_is_rejected() {
        let mut instance = minimal_instance();
        let mut ghost = instance.students[0].clone();
        ghost.matr_number = 4242424;
        instance.projects.get_mut(&0).unwrap().veto.push(ghost);
        assert_eq!(
            instance.validate(),
            Err(ValidationError::UnknownVetoStudent {
                project: 0,
                matr_number: 4242424
            })
        );
    }

    #[test]
    fn too_many_students_are_rejected() {
        let mut instance = minimal_instance();
        for i in 0..6 {
            let mut student = instance.students[0].clone();
            student.matr_number = 2000000 + i;
            instance.students.push(student);
        }
        assert_eq!(
            instance.validate(),
            Err(ValidationError::InsufficientCapacity {
                students: 7,
                capacity: 5
            })
        );
    }
}
