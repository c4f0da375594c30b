extern crate cpq;
extern crate env_logger;
#[macro_use]
extern crate log;

use clap::{App, Arg, ArgMatches};
use cpq::benchmark::{BenchmarkBuilder, BenchmarkError, KeyOrder, Result, Workload};
use std::str::FromStr;
use std::time::Duration;

fn app() -> App<'static, 'static> {
    App::new("cpq_bench")
        .about("Compares the skiplist priority queue with a single-lock heap")
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .short("t")
                .takes_value(true)
                .default_value("4")
                .help("Worker threads per queue"),
        )
        .arg(
            Arg::with_name("duration")
                .long("duration")
                .short("d")
                .takes_value(true)
                .default_value("5")
                .help("Seconds each timed run lasts"),
        )
        .arg(
            Arg::with_name("keys")
                .long("keys")
                .short("k")
                .takes_value(true)
                .possible_values(&["ascending", "descending", "uniform"])
                .default_value("uniform")
                .help("Order in which keys are generated"),
        )
        .arg(
            Arg::with_name("workload")
                .long("workload")
                .short("w")
                .takes_value(true)
                .possible_values(&["timed", "uniform", "enqueue-dequeue"])
                .default_value("timed"),
        )
        .arg(
            Arg::with_name("count")
                .long("count")
                .short("n")
                .takes_value(true)
                .default_value("100000")
                .help("Keys in the fixed workloads, key span in timed runs"),
        )
        .arg(
            Arg::with_name("height")
                .long("height")
                .takes_value(true)
                .default_value("20"),
        )
        .arg(
            Arg::with_name("delete-threshold")
                .long("delete-threshold")
                .takes_value(true)
                .default_value("10"),
        )
        .arg(
            Arg::with_name("warmup")
                .long("warmup")
                .takes_value(true)
                .default_value("1")
                .help("Warm-up rounds before measuring"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .default_value("0")
                .help("Seed for uniform fixed key sets"),
        )
}

fn value<T>(matches: &ArgMatches, name: &'static str) -> Result<T>
where
    T: FromStr,
    BenchmarkError: From<T::Err>,
{
    match matches.value_of(name) {
        Some(value) => Ok(value.parse()?),
        None => Err(BenchmarkError::InvalidArgument(name, String::new())),
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let benchmark = BenchmarkBuilder::default()
        .threads(value(matches, "threads")?)
        .duration(Duration::from_secs(value(matches, "duration")?))
        .key_order(value::<KeyOrder>(matches, "keys")?)
        .workload(value::<Workload>(matches, "workload")?)
        .count(value(matches, "count")?)
        .height(value(matches, "height")?)
        .delete_threshold(value(matches, "delete-threshold")?)
        .warmup_rounds(value(matches, "warmup")?)
        .seed(value(matches, "seed")?)
        .build()?;

    let result = benchmark.run()?;
    println!("{}", result);
    Ok(())
}

fn main() {
    env_logger::init();

    let matches = app().get_matches();
    if let Err(err) = run(&matches) {
        error!("{}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let matches = app().get_matches_from(vec!["cpq_bench"]);
        assert_eq!(value::<usize>(&matches, "threads").unwrap(), 4);
        assert_eq!(value::<KeyOrder>(&matches, "keys").unwrap(), KeyOrder::Uniform);
        assert_eq!(value::<Workload>(&matches, "workload").unwrap(), Workload::Timed);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let matches = app().get_matches_from(vec!["cpq_bench", "--threads", "many"]);
        match value::<usize>(&matches, "threads") {
            Err(BenchmarkError::ParseInt(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn small_fixed_run() {
        let matches = app().get_matches_from(vec![
            "cpq_bench",
            "--threads",
            "2",
            "--workload",
            "uniform",
            "--count",
            "500",
            "--warmup",
            "0",
        ]);
        assert!(run(&matches).is_ok());
    }
}
