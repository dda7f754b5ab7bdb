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

use std::fs::File;
use std::sync::Arc;

use log::{debug, error, info, warn};

use sepao::engine::score::QualityInfo;
use sepao::engine::{Engine, SolveOptions};

fn main() {
    // Setup logging & parse command line arguments
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!(
        "This is the SEP Assignment Optimizer (sepao), version {}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    let args = parse_cli_args();

    // Generator mode: write a synthetic instance and exit
    if let Some(size) = args.get_one::<String>("generate") {
        let (num_students, num_projects) = parse_generate_size(size);
        let seed = args.get_one("seed").map_or(42, |s: &String| {
            s.parse().unwrap_or_else(|e| {
                error!("Could not parse seed: {}", e);
                std::process::exit(exitcode::DATAERR)
            })
        });
        // A single positional argument binds to INPUT, so accept either slot.
        let outpath: &String = args
            .get_one("OUTPUT")
            .or_else(|| args.get_one("INPUT"))
            .unwrap_or_else(|| {
                error!("An output file is required to store the generated instance.");
                std::process::exit(exitcode::USAGE)
            });
        let instance = sepao::gen::generate_instance(num_students, num_projects, seed);
        if cfg!(debug_assertions) {
            instance
                .validate()
                .expect("generated instance must be valid");
        }
        let file = File::create(outpath).unwrap_or_else(|e| {
            error!("Could not open output file {}: {}", outpath, e);
            std::process::exit(exitcode::CANTCREAT)
        });
        match sepao::io::write_instance(file, &instance) {
            Ok(_) => info!(
                "Generated instance with {} students and {} projects at {}.",
                num_students, num_projects, outpath
            ),
            Err(e) => {
                error!("Could not write instance to {}: {}.", outpath, e);
                std::process::exit(exitcode::IOERR)
            }
        }
        return;
    }

    if args.get_one::<String>("OUTPUT").is_none() && !args.get_flag("print") {
        warn!(
            "No OUTPUT file and no --print option given. Assignment will not be exported anywhere."
        );
    }

    // Open & read input file
    let inpath: &String = args.get_one("INPUT").unwrap();
    debug!("Opening input file {} ...", inpath);
    let file = File::open(inpath).unwrap_or_else(|e| {
        error!("Could not open input file {}: {}", inpath, e);
        std::process::exit(exitcode::NOINPUT)
    });
    let instance = sepao::io::read_instance(file).unwrap_or_else(|e| {
        error!("Could not read input file: {}", e);
        std::process::exit(exitcode::DATAERR)
    });

    info!(
        "Found {} projects and {} students for project assignment.",
        instance.projects.len(),
        instance.students.len()
    );
    debug!("Projects:\n{}", sepao::io::debug_list_of_projects(&instance));

    if instance.students.is_empty() {
        error!("Calculating project assignments is only possible with 1 or more students.");
        std::process::exit(exitcode::DATAERR);
    }

    // Execute assignment engine
    let options = SolveOptions {
        threads: *args
            .get_one("num_threads")
            .unwrap_or(&(num_cpus::get() as u32)),
        time_limit: args.get_one("time_limit").map(|t: &String| {
            t.parse().unwrap_or_else(|e| {
                error!("Could not parse time limit: {}", e);
                std::process::exit(exitcode::DATAERR)
            })
        }),
    };
    let instance = Arc::new(instance);
    let mut engine = Engine::with_options(instance.clone(), options);
    let progress = engine.progress_cell();
    if args.get_flag("streaming") {
        // One stage per call, so supervisors tailing the log see the stage
        // boundaries and the progress cell move.
        while engine.stage() < 4 && engine.solve_next_objective().is_some() {
            info!(
                "Progress: {}%",
                progress.load(std::sync::atomic::Ordering::Relaxed)
            );
        }
    }
    let result = engine.solve();

    if let Some(solution) = result {
        if engine.stage() < 4 {
            warn!(
                "Only {} of 4 objectives could be optimized; exporting the best assignment found.",
                engine.stage()
            );
        } else {
            info!("Finished solving project assignment.");
        }
        if let Err(e) = sepao::verify::verify_solution(&instance, &solution) {
            error!("The engine produced an invalid assignment: {}", e);
            std::process::exit(exitcode::SOFTWARE);
        }
        info!(
            "Solution quality:\n{}",
            QualityInfo::calculate(&instance, &solution)
        );

        if let Some(outpath) = args.get_one::<String>("OUTPUT") {
            debug!("Opening output file {} ...", outpath);
            match File::create(outpath) {
                Err(e) => error!("Could not open output file {}: {}.", outpath, e),
                Ok(file) => match sepao::io::write_solution(file, &solution) {
                    Ok(_) => debug!("Assignment written to {}.", outpath),
                    Err(e) => error!("Could not write assignment to {}: {}.", outpath, e),
                },
            }
        }

        if args.get_flag("print") {
            print!(
                "The assignment is:\n{}",
                sepao::io::format_solution(&solution, &instance)
            );
        }
    } else {
        warn!(
            "No feasible assignment found (stopped during stage {}).",
            engine.stage() + 1
        );
        std::process::exit(1);
    }
}

/// Parse the "STUDENTS,PROJECTS" argument of the generator mode
fn parse_generate_size(size: &str) -> (usize, usize) {
    let parts: Vec<Result<usize, std::num::ParseIntError>> =
        size.split(',').map(|part| part.parse()).collect();
    match parts.as_slice() {
        [Ok(students), Ok(projects)] if *students > 0 && *projects > 0 => (*students, *projects),
        _ => {
            error!(
                "Could not parse instance size {:?}, expected STUDENTS,PROJECTS.",
                size
            );
            std::process::exit(exitcode::DATAERR)
        }
    }
}

/// Helper function to construct and execute parser for command line options
fn parse_cli_args() -> clap::ArgMatches {
    clap::command!()
        .arg(
            clap::Arg::new("streaming")
                .short('s')
                .long("streaming")
                .help(
                    "Solve one objective per engine call instead of all at once and log the \
                     progress after every stage. The resulting assignment is the same.",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("num_threads")
                .long("num-threads")
                .help("Number of solver worker threads. Defaults to number of detected CPU cores.")
                .value_name("THREADS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            clap::Arg::new("time_limit")
                .short('t')
                .long("time-limit")
                .help(
                    "Wall-clock limit per optimization stage, in seconds. A stage stopped by \
                     the limit counts as failed, so use generous values.",
                )
                .value_name("SECONDS"),
        )
        .arg(
            clap::Arg::new("generate")
                .short('g')
                .long("generate")
                .help(
                    "Do not solve anything; generate a random instance with the given number \
                     of students and projects and write it to the given file.",
                )
                .value_name("STUDENTS,PROJECTS"),
        )
        .arg(
            clap::Arg::new("seed")
                .long("seed")
                .help("Random seed for --generate. The same seed reproduces the same instance.")
                .value_name("SEED"),
        )
        .arg(
            clap::Arg::new("print")
                .short('p')
                .long("print")
                .help(
                    "Print the calculated project assignment to stdout in a human readable format",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("INPUT")
                .help("Sets the input file to use")
                .required_unless_present("generate")
                .index(1),
        )
        .arg(
            clap::Arg::new("OUTPUT")
                .help("Sets the output file to use")
                .index(2),
        )
        .get_matches()
}
