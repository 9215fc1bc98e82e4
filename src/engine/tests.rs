use crate::{Engine, Error, OutcomeKind, Options, SeedMode, Step};
use std::fs;

fn engine(source: &str) -> Engine {
    let mut engine = Engine::new(Options::default());
    engine.compile_str("test.sca", source).unwrap();
    engine
}

fn first(engine: &mut Engine, word: &str) -> String {
    engine.process_word(word, None).unwrap().first().unwrap_or_default().to_string()
}

fn seeded(seed: u64, source: &str) -> Engine {
    let mut engine = Engine::new(Options { seed: SeedMode::Fixed(seed), ..Options::default() });
    engine.compile_str("test.sca", source).unwrap();
    engine
}

#[test]
fn initial_vowel_fronting() {
    let mut engine = engine("V = aeiou\n* a e #_\n");
    assert_eq!(first(&mut engine, "apple"), "epple");
    assert_eq!(first(&mut engine, "banana"), "banana");
}

#[test]
fn lists_correspond_by_position() {
    let mut engine = engine("list L = [ab,cd]\nlist M = xy,zz\n* L M _\n");
    assert_eq!(first(&mut engine, "abcd"), "xyzz");
    assert_eq!(first(&mut engine, "cdab"), "zzxy");
}

#[test]
fn feature_devoicing() {
    let mut engine = engine("feature Voice = ptk|bdg\n* [+Voice] [-Voice] _#\n");
    assert_eq!(first(&mut engine, "dog"), "dok");
    assert_eq!(first(&mut engine, "bed"), "bet");
    assert_eq!(first(&mut engine, "dogs"), "dogs");
}

#[test]
fn shuffled_group_picks_one_rule_per_seed() {
    let source = "!group shuffle max=1\n* a b _\n* a c _\n* a d _\n!endgroup\n";
    for seed in 0..20 {
        let run = |seed| {
            let mut engine = Engine::new(Options { seed: SeedMode::Fixed(seed), ..Options::default() });
            engine.compile_str("test.sca", source).unwrap();
            let result = engine.process_word_verbose("a", None).unwrap();
            (result.words.first().unwrap_or_default().to_string(), result.metrics.applications)
        };
        let (word, applications) = run(seed);
        assert!(["b", "c", "d"].contains(&word.as_str()), "seed {seed} gave '{word}'");
        assert_eq!(applications, 1);
        assert_eq!(run(seed).0, word);
    }
}

#[test]
fn persistent_rules_follow_every_rule() {
    let mut engine = engine("* b c _ P\n* a b _\n* o a _\n");
    let mut steps = Vec::new();
    let mut record = |step: &Step<'_>| {
        if let Step::Rule { before, after, persistent, .. } = *step {
            steps.push((before.to_string(), after.to_string(), persistent));
        }
    };
    let result = engine.process_word_with("oa", None, false, Some(&mut record)).unwrap();

    assert_eq!(result.words.first(), Some("ac"));
    assert_eq!(result.metrics.persistent_passes, 2);
    let expected = [("oa", "ob", false), ("ob", "oc", true), ("oc", "ac", false), ("ac", "ac", true)];
    let expected: Vec<_> = expected.iter().map(|&(b, a, p)| (b.to_string(), a.to_string(), p)).collect();
    assert_eq!(steps, expected);
}

#[test]
fn headings_are_reported_but_not_counted() {
    let mut engine = engine("!group max=1\n!heading Vowels\n* a e _\n* e i _\n!endgroup\n");
    let mut headings = Vec::new();
    let mut record = |step: &Step<'_>| {
        if let Step::Heading { level, text } = *step {
            headings.push((level, text.to_string()));
        }
    };
    let result = engine.process_word_with("a", None, false, Some(&mut record)).unwrap();
    assert_eq!(result.words.first(), Some("e"));
    assert_eq!(headings, vec![(0, "Vowels".to_string())]);
}

#[test]
fn exceptions_leave_words_alone() {
    let mut engine = engine("!exception round mama,tata\n* a o _ @round\n");
    let mut outcomes = Vec::new();
    let mut record = |step: &Step<'_>| {
        if let Step::Rule { outcome, .. } = *step {
            outcomes.push(outcome);
        }
    };
    let result = engine.process_word_with("mama", None, false, Some(&mut record)).unwrap();
    assert_eq!(result.words.first(), Some("mama"));
    assert_eq!(result.metrics.exceptions, 1);
    assert_eq!(outcomes, vec![OutcomeKind::Exception]);

    assert_eq!(first(&mut engine, "mama"), "mama");
    assert_eq!(first(&mut engine, "papa"), "popo");
}

#[test]
fn dialects_are_processed_independently() {
    let mut engine = engine("!dialects A B C\nB a o _\nAC p b #_\n");
    let words = engine.process_word("pa", None).unwrap();
    assert_eq!(words.to_string(), "ba po ba");
    assert_eq!(words.get('B'), Some("po"));

    let words = engine.process_word("pa", Some("CB")).unwrap();
    assert_eq!(words.iter().map(|(d, _)| d).collect::<String>(), "CB");
    assert!(engine.process_word("pa", Some("AZ")).is_err());
}

#[test]
fn prefix_applies_to_following_rules() {
    let mut engine = engine("!dialects AB\n!prefix B\na o _\n!prefix\n* p b _\n");
    let words = engine.process_word("pa", None).unwrap();
    assert_eq!(words.to_string(), "ba bo");
}

#[test]
fn group_repeats_and_stops() {
    let mut twice = engine("!group times=2\n* a b _ F\n!endgroup\n");
    assert_eq!(first(&mut twice, "aaa"), "bba");

    let mut capped = engine("!group max=1\n* a b _\n* b c _\n!endgroup\n");
    assert_eq!(first(&mut capped, "a"), "b");

    let mut plain = engine("!group\n* a b _\n* b c _\n!endgroup\n");
    assert_eq!(first(&mut plain, "a"), "c");
}

#[test]
fn defines_control_skipping_and_parameters() {
    let source = "!skipif archaic\n* a e _\n!noskip\n* o u _\n!group times=&n:1\n* i y _ F\n!endgroup\n";

    let mut plain = engine(source);
    assert_eq!(first(&mut plain, "aoii"), "euyi");

    let mut options = Options::default();
    options.define("archaic");
    options.define("n=2");
    let mut defined = Engine::new(options);
    defined.compile_str("test.sca", source).unwrap();
    assert_eq!(first(&mut defined, "aoii"), "auyy");
}

#[test]
fn skip_and_end_directives() {
    let mut engine = engine("* a e _\n!skip\n* e i _\n!noskip\n* p b _\n!end\n* b m _\n");
    assert_eq!(first(&mut engine, "pa"), "be");
    assert_eq!(engine.counts().rules, 2);
}

#[test]
fn assertions_are_checked_on_request() {
    let mut engine = engine("* a e #_\n!assert A apple epple\n* o u _\n!assert A otter xtter\n");
    assert_eq!(engine.process_word("apple", None).unwrap().first(), Some("epple"));

    let err = engine.process_word_with("apple", None, true, None).unwrap_err();
    match err {
        Error::AssertionFailed { line, expected, actual, .. } => {
            assert_eq!(line, 4);
            assert_eq!(expected, "xtter");
            assert_eq!(actual, "utter");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn errors_carry_their_location() {
    let mut engine = Engine::new(Options::default());
    let err = engine.compile_str("main.sca", "V = aeiou\n\n* a e\n").unwrap_err();
    assert!(matches!(err, Error::At { line: 3, .. }));
    assert!(matches!(err.root(), Error::MalformedSpec(_)));

    let err = engine.compile_str("main.sca", "colour X = ab\n").unwrap_err();
    assert!(matches!(err.root(), Error::UnknownDefinitionKind(kind) if kind == "colour"));

    let err = engine.compile_str("main.sca", "V = ei\n").unwrap_err();
    assert!(matches!(err.root(), Error::DuplicateDefinition { kind: "category", .. }));
}

#[test]
fn includes_and_exception_files_resolve_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("extra.sca"), "V = aeiou\n").unwrap();
    fs::write(dir.path().join("words.txt"), "# kept as is\n@front\napple\n").unwrap();
    fs::write(dir.path().join("main.sca"), "!include extra\n!exceptfile words.txt\n* V e #_ @front\n").unwrap();

    let mut engine = Engine::new(Options::default());
    engine.compile_source(dir.path().join("main")).unwrap();
    assert_eq!(first(&mut engine, "apple"), "apple");
    assert_eq!(first(&mut engine, "otter"), "etter");
    assert_eq!(engine.exceptions().len(), 1);
}

#[test]
fn errors_in_included_files_name_both_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.sca"), "* a\n").unwrap();
    fs::write(dir.path().join("main.sca"), "V = aeiou\n!include bad.sca\n").unwrap();

    let mut engine = Engine::new(Options::default());
    let err = engine.compile_source(dir.path().join("main.sca")).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("line 2"), "{text}");
    assert!(text.contains("bad.sca"), "{text}");
    assert!(matches!(err.root(), Error::MalformedSpec(_)));

    let err = Engine::new(Options::default()).compile_source(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn self_inclusion_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("loop.sca"), "!include loop.sca\n").unwrap();
    let err = Engine::new(Options::default()).compile_source(dir.path().join("loop.sca")).unwrap_err();
    assert!(err.to_string().contains("already being included"));
}

#[test]
fn counts_split_persistent_rules() {
    let engine = engine("V = aeiou\nlist L = ab,cd\n* a e _\n* e i _ P\n");
    let counts = engine.counts();
    assert_eq!((counts.rules, counts.persistent), (1, 1));
    assert_eq!(engine.rules().len(), 2);
    assert_eq!(engine.persistent_group().rule_count(), 1);
    assert!(counts.to_string().starts_with("rules: 1  persistent: 1"));
}

#[test]
fn single_lines_and_queries() {
    let mut engine = Engine::new(Options::default());
    engine.compile_line("V = aeiou").unwrap();
    engine.compile_line("* V 0 _# @apocope").unwrap();
    assert_eq!(first(&mut engine, "kasa"), "kas");

    let rule = engine.rule("apocope").unwrap();
    assert_eq!(rule.line(), 1);
    assert_eq!(rule.to_string(), "V -> 0 / _#");
    assert_eq!(engine.definitions(crate::DefinitionKind::Category), vec![("V".to_string(), "aeiou".to_string())]);
    assert!(matches!(engine.compile_line("* a"), Err(Error::At { line: 1, .. })));
}

#[test]
fn raw_definitions_keep_items_in_step() {
    let mut engine = engine("list L == (a|b),c\nV = xy\nW = uv\n* LV LW _\n");
    assert_eq!(first(&mut engine, "bx"), "bu");
    assert_eq!(first(&mut engine, "cy"), "cv");
}

#[test]
fn overlapping_reverse_scan() {
    let mut engine = engine("* a b a_ R\n");
    assert_eq!(first(&mut engine, "aaaa"), "abbb");
}

#[test]
fn decay_shortens_repeated_groups() {
    let mut steady = engine("!group times=20 prob=100\n* a ab _ F\n!endgroup\n");
    assert_eq!(first(&mut steady, "a"), format!("a{}", "b".repeat(20)));

    let mut decaying = engine("!group times=20 prob=100 reduce=0.5\n* a ab _ F\n!endgroup\n");
    let word = first(&mut decaying, "a");
    assert!(word.starts_with("ab"), "{word}");
    assert!(word.len() < 11, "{word}");

    let mut gated = engine("!group times=3 ruleprob=100 reduce=0\n* a ab _ F\n!endgroup\n");
    assert_eq!(first(&mut gated, "a"), "ab");
}

#[test]
fn decay_carries_across_outer_repeats() {
    let source = "!group times=3\n!group prob=100 reduce=0\n* a ab _ F\n!endgroup\n!endgroup\n";
    let mut nested = engine(source);
    assert_eq!(first(&mut nested, "a"), "ab");

    let mut undecayed = engine("!group times=3\n!group prob=100\n* a ab _ F\n!endgroup\n!endgroup\n");
    assert_eq!(first(&mut undecayed, "a"), "abbb");
}

#[test]
fn group_probability_gates_iterations() {
    let source = "!group prob=50\n* a b _\n!endgroup\n";
    let results: Vec<String> = (0..40).map(|seed| first(&mut seeded(seed, source), "a")).collect();
    assert!(results.iter().all(|w| w == "a" || w == "b"));
    assert!(results.iter().any(|w| w == "a"));
    assert!(results.iter().any(|w| w == "b"));
    for (seed, word) in results.iter().enumerate() {
        assert_eq!(&first(&mut seeded(seed as u64, source), "a"), word);
    }
}

#[test]
fn random_picks_stay_in_their_set() {
    let cases: [(&str, &[&str]); 2] =
        [("V = aeiou\n* x <@V> _\n", &["a", "e", "i", "o", "u"]), ("list L = ab,cd\n* x [@L] _\n", &["ab", "cd"])];
    for (source, allowed) in cases {
        let picks: Vec<String> = (0..40).map(|seed| first(&mut seeded(seed, source), "x")).collect();
        assert!(picks.iter().all(|p| allowed.contains(&p.as_str())), "{picks:?}");
        assert!(picks.iter().any(|p| *p != picks[0]), "{picks:?}");
        assert_eq!(first(&mut seeded(7, source), "x"), picks[7]);
    }
}

#[test]
fn percentage_flag_skips_failed_rolls() {
    let mut seen = Vec::new();
    for seed in 0..40 {
        let mut engine = seeded(seed, "* a b _ 50\n");
        let mut outcome = None;
        let mut record = |step: &Step<'_>| {
            if let Step::Rule { outcome: kind, .. } = *step {
                outcome = Some(kind);
            }
        };
        let result = engine.process_word_with("a", None, false, Some(&mut record)).unwrap();
        let word = result.words.first().unwrap_or_default().to_string();
        match outcome {
            Some(OutcomeKind::Applied) => assert_eq!(word, "b"),
            Some(OutcomeKind::NotApplicable) => {
                assert_eq!(word, "a");
                assert_eq!(result.metrics.not_applicable, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        seen.push(outcome);
    }
    assert!(seen.contains(&Some(OutcomeKind::Applied)));
    assert!(seen.contains(&Some(OutcomeKind::NotApplicable)));
}
