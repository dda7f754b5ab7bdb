
//! Synthetic instance generation for benchmarks and manual testing.
//!
//! Instances follow the shape of real course data: a handful of student skill
//! archetypes, per-project rating distributions of varying popularity,
//! disjoint friend groups of two or three and rare, small veto lists. All
//! randomness comes from a seedable RNG, so a (students, projects, seed)
//! triple always produces the same instance.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Instance, Project, Student};

/// The fixed language set of the course
const LANGUAGES: [&str; 5] = ["Python", "Java", "C/C++", "SQL", "PHP"];

/// Skill levels per archetype, in `LANGUAGES` order, with their sampling weight
const ARCHETYPES: [([u8; 5], f64); 5] = [
    // all-round expert
    ([4, 4, 4, 4, 4], 0.2),
    // solid basics
    ([2, 3, 3, 1, 2], 0.1),
    // Python-centric
    ([4, 2, 2, 2, 1], 0.4),
    // web developer
    ([3, 2, 2, 4, 4], 0.1),
    // beginner
    ([1, 1, 1, 1, 1], 0.2),
];

/// Rating probabilities for one project: at least 10% on every rating, the
/// rest of the mass centered on the project's average popularity.
fn rating_weights(average: f64) -> [f64; 5] {
    let mut kernel = [0.0f64; 5];
    let mut kernel_total = 0.0;
    for (i, weight) in kernel.iter_mut().enumerate() {
        let rating = (i + 1) as f64;
        *weight = (1.0 - (rating - average).abs() / 2.0).max(0.0);
        kernel_total += *weight;
    }
    let mut weights = [0.1f64; 5];
    if kernel_total > 0.0 {
        for (weight, kernel_weight) in weights.iter_mut().zip(&kernel) {
            *weight += 0.5 * kernel_weight / kernel_total;
        }
    }
    weights
}

fn sample_rating(rng: &mut ChaCha8Rng, weights: &[f64; 5]) -> u8 {
    let total: f64 = weights.iter().sum();
    let mut remaining = rng.gen::<f64>() * total;
    for (i, weight) in weights.iter().enumerate() {
        remaining -= weight;
        if remaining <= 0.0 {
            return (i + 1) as u8;
        }
    }
    5
}

fn sample_skills(rng: &mut ChaCha8Rng) -> BTreeMap<String, u8> {
    let mut remaining = rng.gen::<f64>();
    let mut skills = ARCHETYPES[ARCHETYPES.len() - 1].0;
    for (archetype_skills, weight) in &ARCHETYPES {
        remaining -= weight;
        if remaining <= 0.0 {
            skills = *archetype_skills;
            break;
        }
    }
    LANGUAGES
        .iter()
        .zip(&skills)
        .map(|(language, &level)| (language.to_string(), level))
        .collect()
}

/// Disjoint friend groups of size 2 or 3 with mutual references, at most
/// `num_students / 4` groups so most students stay unattached.
fn sample_friend_groups(rng: &mut ChaCha8Rng, num_students: usize) -> Vec<Vec<u32>> {
    let mut friends = vec![Vec::new(); num_students];
    let mut pool: Vec<u32> = (0..num_students as u32).collect();
    pool.shuffle(rng);
    for _ in 0..(num_students / 4) {
        let size = rng.gen_range(2..=3usize);
        if pool.len() < size {
            break;
        }
        let group: Vec<u32> = pool.split_off(pool.len() - size);
        for &member in &group {
            friends[member as usize] = group
                .iter()
                .copied()
                .filter(|&other| other != member)
                .collect();
        }
    }
    friends
}

/// Generate a reproducible synthetic instance with `num_students` students
/// and `num_projects` projects. Project capacities are topped up until the
/// whole cohort fits, so the result always validates.
pub fn generate_instance(num_students: usize, num_projects: usize, seed: u64) -> Instance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut projects: Vec<Project> = (0..num_projects as u32)
        .map(|id| {
            let capacity = rng.gen_range(5..=16u32);
            let min_capacity = rng.gen_range(5..=capacity);
            let programming_requirements = LANGUAGES
                .iter()
                .map(|language| (language.to_string(), rng.gen_range(0..=3u32)))
                .collect();
            Project {
                id,
                name: format!("Project {}", id),
                capacity,
                min_capacity,
                veto: Vec::new(),
                programming_requirements,
                opt_size: None,
            }
        })
        .collect();
    let mut total_capacity: u32 = projects.iter().map(|project| project.capacity).sum();
    'top_up: while (total_capacity as usize) < num_students {
        for project in projects.iter_mut() {
            let extra = rng.gen_range(1..=6u32);
            project.capacity += extra;
            total_capacity += extra;
            if total_capacity as usize >= num_students {
                break 'top_up;
            }
        }
    }

    let popularity: Vec<[f64; 5]> = (0..num_projects)
        .map(|_| {
            let average = (3.0 + rng.gen_range(-2.0..=2.0f64)).clamp(1.0, 5.0);
            rating_weights(average)
        })
        .collect();

    let friend_groups = sample_friend_groups(&mut rng, num_students);
    let students: Vec<Student> = (0..num_students as u32)
        .map(|matr_number| {
            let projects_ratings = projects
                .iter()
                .map(|project| {
                    (
                        project.id,
                        sample_rating(&mut rng, &popularity[project.id as usize]),
                    )
                })
                .collect();
            Student {
                last_name: "Doe".to_string(),
                first_name: "Joe".to_string(),
                matr_number,
                projects_ratings,
                programming_language_ratings: sample_skills(&mut rng),
                friends: friend_groups[matr_number as usize].clone(),
            }
        })
        .collect();

    for project in projects.iter_mut() {
        if rng.gen::<f64>() <= 0.1 {
            let count = ((num_students as f64).log10().ceil() as usize + 1).min(num_students);
            project.veto = students
                .choose_multiple(&mut rng, count)
                .cloned()
                .collect();
        }
    }

    Instance {
        students,
        projects: projects
            .into_iter()
            .map(|project| (project.id, project))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_instances_validate() {
        for &(students, projects) in &[(20, 3), (100, 10), (57, 8)] {
            let instance = generate_instance(students, projects, 42);
            assert_eq!(instance.students.len(), students);
            assert_eq!(instance.projects.len(), projects);
            assert_eq!(instance.validate(), Ok(()));
        }
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let a = generate_instance(30, 4, 7);
        let b = generate_instance(30, 4, 7);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        let c = generate_instance(30, 4, 8);
        assert_ne!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&c).unwrap()
        );
    }

    #[test]
    fn friend_groups_are_mutual_and_small() {
        let instance = generate_instance(60, 6, 3);
        for student in &instance.students {
            assert!(student.friends.len() <= 2);
            for &friend in &student.friends {
                let other = &instance.students[friend as usize];
                assert!(other.friends.contains(&student.matr_number));
            }
        }
    }
}
