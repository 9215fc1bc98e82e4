mod debug_report;

use soundshift::{Engine, Options, SeedMode, Step};
use std::io::{self, IsTerminal, Read};

fn main() {
    env_logger::init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(config: &CliConfig) -> soundshift::Result<()> {
    let mut options = Options::default();
    for define in &config.defines {
        options.define(define);
    }
    if let Some(seed) = config.seed {
        options.seed = seed;
    }

    let mut engine = Engine::new(options);
    engine.compile_source(&config.file)?;

    if config.defs {
        debug_report::print_definitions(&engine, config.color);
        return Ok(());
    }
    if !config.quiet {
        debug_report::print_counts(&config.file, &engine.counts(), config.color);
    }

    let tracer = debug_report::Tracer::new(config.color, config.all);
    let mut on_step = |step: &Step<'_>| tracer.step(step);

    for word in &config.words {
        let observer: Option<&mut dyn FnMut(&Step<'_>)> = if config.trace { Some(&mut on_step) } else { None };
        let run = engine.process_word_with(word, config.dialects.as_deref(), config.assert, observer)?;
        debug_report::print_word(word, &run.words, config.color);
        if config.stats {
            debug_report::print_stats(&run.metrics, config.color);
        }
    }
    Ok(())
}

struct CliConfig {
    file: String,
    words: Vec<String>,
    dialects: Option<String>,
    defines: Vec<String>,
    seed: Option<SeedMode>,
    assert: bool,
    trace: bool,
    all: bool,
    defs: bool,
    stats: bool,
    quiet: bool,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut file: Option<String> = None;
    let mut words = Vec::new();
    let mut dialects = None;
    let mut defines = Vec::new();
    let mut seed = None;
    let (mut assert, mut trace, mut all, mut defs, mut stats, mut quiet) = (false, false, false, false, false, false);
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("soundshift {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--assert" => assert = true,
            "--trace" => trace = true,
            "--all" => {
                trace = true;
                all = true;
            }
            "--defs" => defs = true,
            "--stats" => stats = true,
            "-q" | "--quiet" => quiet = true,
            "-f" | "--file" => {
                let value = args.next().ok_or_else(|| "error: --file expects a value".to_string())?;
                file = Some(value);
            }
            "-d" | "--dialects" => {
                let value = args.next().ok_or_else(|| "error: --dialects expects a value".to_string())?;
                dialects = Some(value);
            }
            "-D" | "--define" => {
                let value = args.next().ok_or_else(|| "error: --define expects a value".to_string())?;
                defines.push(value);
            }
            "--seed" => {
                let value = args.next().ok_or_else(|| "error: --seed expects a value".to_string())?;
                seed = Some(SeedMode::parse(&value));
            }
            "--" => {
                words.extend(args.by_ref());
                break;
            }
            _ if arg.starts_with("--seed=") => seed = Some(SeedMode::parse(arg.trim_start_matches("--seed="))),
            _ if arg.starts_with("-D") && arg.len() > 2 => defines.push(arg[2..].to_string()),
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => words.push(arg),
        }
    }

    let file = file.ok_or_else(|| format!("error: no sound change file given\n\n{}", help_text()))?;

    if words.is_empty() && !defs {
        words = read_stdin_words()?;
    }

    Ok(CliConfig { file, words, dialects, defines, seed, assert, trace, all, defs, stats, quiet, color })
}

fn read_stdin_words() -> Result<Vec<String>, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer.split_whitespace().map(str::to_string).collect())
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "soundshift {version}

Apply sound changes to words.

Usage:
  soundshift -f <rules> [OPTIONS] [--] <word...>
  soundshift -f <rules> [OPTIONS] < words.txt

Options:
  -f, --file <path>          Sound change file ('.sca' is added when there is
                             no extension).
  -d, --dialects <codes>     Dialects to produce. Default: all declared.
  -D, --define <var[=value]> Define a variable for !skipif, !skipunless and
                             group parameters.
  --seed <time|word|N>       Random seed. Default: word (reseed per word).
  --assert                   Check every !assert before processing.
  --trace                    Show each rule that changes a word.
  --all                      Like --trace, including rules that change nothing.
  --defs                     List the definitions and exit.
  --stats                    Show counters after each word.
  -q, --quiet                Do not print the rule counts banner.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Logging:
  RUST_LOG=soundshift=debug  Log compiled rules and directives to stderr.

Exit codes:
  0  Success.
  1  Compilation or processing error.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
