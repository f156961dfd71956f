use proptest::prelude::*;

use dataapi::script::expr::eval_str;
use dataapi::script::scan::{split_arguments, split_call, split_top_level};
use dataapi::script::{EvalContext, EvalError, Label, ReportTree, Value};

/// Bracket-heavy data code fragments.
fn code() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just("[".to_owned()),
            Just("]".to_owned()),
            Just(",".to_owned()),
            Just("(".to_owned()),
            Just(")".to_owned()),
            "[a-zA-Z0-9 \"_]{0,6}",
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

/// Balanced `[Name(args)]` calls, possibly nested.
fn call() -> impl Strategy<Value = String> {
    let leaf = "[a-z0-9]{1,5}";
    leaf.prop_recursive(3, 16, 3, |inner| {
        ("[A-Z][a-z]{0,5}", proptest::collection::vec(inner, 0..3))
            .prop_map(|(name, args)| format!("[{name}({})]", args.join(", ")))
    })
}

fn report_tree() -> impl Strategy<Value = ReportTree> {
    let leaf = prop_oneof![
        Just(ReportTree::new(Label::Pass)),
        "[a-z]{1,4}".prop_map(|s| ReportTree::new(s)),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        ("[a-z]{1,4}", proptest::collection::vec(inner, 0..4)).prop_map(|(label, children)| {
            let mut t = ReportTree::new(label);
            t.children = children;
            t
        })
    })
}

struct NoVars;

impl EvalContext for NoVars {
    fn get_var(&self, _name: &str) -> Option<Value> {
        None
    }

    fn call_fn(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, EvalError> {
        Err(EvalError::FunctionNotFound(name.to_owned()))
    }
}

proptest! {
    /// Scanning never drops or invents text.
    #[test]
    fn top_level_tokens_concatenate_to_input(s in code()) {
        prop_assert_eq!(split_top_level(&s).concat(), s);
    }

    /// Argument splitting always yields something and keeps every byte
    /// except the separating commas.
    #[test]
    fn arguments_rejoin_to_input(s in code()) {
        let args = split_arguments(&s);
        prop_assert!(!args.is_empty());
        prop_assert_eq!(args.join(","), s);
    }

    /// Each top-level call of a balanced sequence is its own token.
    #[test]
    fn balanced_calls_split_one_per_token(calls in proptest::collection::vec(call(), 1..5)) {
        let calls: Vec<String> = calls.into_iter().filter(|c| c.starts_with('[')).collect();
        prop_assume!(!calls.is_empty());
        let line = calls.concat();
        prop_assert_eq!(split_top_level(&line), calls.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// Nested calls stay inside a single argument.
    #[test]
    fn nested_call_is_one_argument(inner in call(), plain in "[a-z]{1,4}") {
        let line = format!("[Outer({plain}, {inner})]");
        let call = split_call(&line).unwrap();
        prop_assert_eq!(call.name, "Outer");
        let args = split_arguments(call.raw_params);
        prop_assert_eq!(args.len(), 2);
        prop_assert_eq!(args[1].trim(), inner.as_str());
    }

    /// The classifier tolerates any tree shape.
    #[test]
    fn classifier_does_not_panic(tree in report_tree()) {
        let failures = tree.failures();
        let successes = tree.successes();
        if tree.passes() {
            prop_assert!(failures.is_empty());
        }
        for line in failures.iter().chain(&successes) {
            prop_assert!(line.contains(": "));
        }
        let _ = tree.depth();
    }

    /// Integer arithmetic matches Rust's for the operators it supports.
    #[test]
    fn arithmetic_agrees(a in -1000i64..1000, b in 1i64..1000) {
        let mut ctx = NoVars;
        prop_assert_eq!(eval_str(&format!("{a} + {b}"), &mut ctx), Ok(Value::Int(a + b)));
        prop_assert_eq!(eval_str(&format!("{a} * {b}"), &mut ctx), Ok(Value::Int(a * b)));
        prop_assert_eq!(eval_str(&format!("({a} < {b})"), &mut ctx), Ok(Value::Bool(a < b)));
    }

    /// Arbitrary text either evaluates or errors; it never panics.
    #[test]
    fn expressions_do_not_panic(s in "\\PC{0,40}") {
        let _ = eval_str(&s, &mut NoVars);
    }
}

#[test]
fn pass_tree_passes() {
    let mut t = ReportTree::new("a.txt");
    t.add("a.txt", "[Pass()]");
    t.add("[Pass()]", Label::Pass);
    assert!(t.passes());
    assert!(t.failures().is_empty());
}
