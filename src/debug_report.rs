use soundshift::{Counts, DefinitionKind, DialectWords, Engine, OutcomeKind, RunMetrics, Step};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// Prints processing steps as they happen.
pub struct Tracer {
    palette: ansi::Palette,
    /// Also show rules that left the word unchanged.
    all: bool,
}

impl Tracer {
    pub fn new(color: bool, all: bool) -> Self {
        Tracer { palette: ansi::Palette::new(color), all }
    }

    pub fn step(&self, step: &Step<'_>) {
        let palette = &self.palette;
        match *step {
            Step::Heading { level, text } => {
                let bar = ["########", "========", "--------"][usize::from(level.min(2))];
                println!("{}", palette.bold(palette.paint(format!("{bar} {text} {bar}"), ansi::MAGENTA)));
            }
            Step::Rule { rule, dialect, outcome, before, after, persistent } => {
                if outcome == OutcomeKind::NotApplicable || (before == after && !self.all) {
                    return;
                }
                let color = match outcome {
                    OutcomeKind::Exception => ansi::YELLOW,
                    _ if before == after => ansi::GRAY,
                    _ if persistent => ansi::CYAN,
                    _ => ansi::GREEN,
                };
                let marker = if outcome == OutcomeKind::Exception { " *" } else { "" };
                println!(
                    "  {} {} {:<20} {} {}",
                    palette.dim(format!("[{:>4}]", rule.line())),
                    palette.paint(dialect.to_string(), ansi::BLUE),
                    palette.paint(format!("{after}{marker}"), color),
                    palette.dim("│"),
                    rule,
                );
            }
        }
    }
}

pub fn print_word(input: &str, words: &DialectWords, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("{} {}", palette.paint(">", ansi::GRAY), palette.bold(input));
    for (dialect, word) in words.iter() {
        println!("{} {}", palette.paint(dialect.to_string(), ansi::BLUE), palette.paint(word, ansi::GREEN));
    }
}

pub fn print_definitions(engine: &Engine, color: bool) {
    let palette = ansi::Palette::new(color);
    for kind in DefinitionKind::ALL {
        let entries = engine.definitions(kind);
        if entries.is_empty() {
            continue;
        }
        println!("\n{}", palette.paint(format!("━━━ {} ━━━", kind.label()), ansi::GRAY));
        for (name, value) in entries {
            println!("  {} {} {}", palette.paint(&name, ansi::CYAN), palette.dim("="), value);
        }
    }
    println!();
}

pub fn print_counts(file: &str, counts: &Counts, color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("{} {}", palette.dim("Using"), palette.bold(file));
    eprintln!("{}", palette.dim(counts.to_string()));
}

pub fn print_stats(metrics: &RunMetrics, color: bool) {
    let palette = ansi::Palette::new(color);
    println!(
        "  {} {}  │  tried: {}  applied: {}  changed: {}  exceptions: {}  persistent passes: {}",
        palette.dim("time:"),
        palette.paint(format!("{:?}", metrics.total), ansi::GREEN),
        palette.paint(metrics.rules_tried.to_string(), ansi::YELLOW),
        palette.paint(metrics.applications.to_string(), ansi::YELLOW),
        palette.paint(metrics.changes.to_string(), ansi::GREEN),
        palette.paint(metrics.exceptions.to_string(), ansi::YELLOW),
        palette.paint(metrics.persistent_passes.to_string(), ansi::CYAN),
    );
}
