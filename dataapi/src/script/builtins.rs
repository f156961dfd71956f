//! Built-in data code functions.
//!
//! Every built-in receives the raw, unevaluated argument text of its call and
//! decides itself which arguments to evaluate, how often, and as what type.
//! That is what lets `If` skip its body and `For` re-run its condition.
//!
//! Array-valued arguments use `___` between elements.  `Post` headers are
//! `key___value` pairs separated by `,`; `ParallelPost` header sets are
//! `key:::value` pairs joined by `---`.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use serde_json::Value as Json;
use tracing::{info, warn};

use super::{
    env::{parallel_slot, Environment, RESPONSE_KEY},
    error::{EvalError, Result},
    interp::Interpreter,
    report::ReportTree,
    runner,
    scan::split_arguments,
    value::Value,
};
use crate::transport::{Headers, Method};

/// Delimiter between elements of an array-valued argument.
pub const ARRAY_DELIMITER: &str = "___";

/// Signature shared by every built-in.
pub type Builtin = fn(&mut Interpreter, &str) -> Result<Value>;

/// Name → built-in lookup table.
pub struct Registry {
    fns: HashMap<&'static str, Builtin>,
}

impl Registry {
    /// The full set of built-ins.
    pub fn standard() -> Self {
        let entries: [(&'static str, Builtin); 19] = [
            ("Set", set),
            ("If", if_),
            ("For", for_),
            ("AssertEquals", assert_equals),
            ("AssertContains", assert_contains),
            ("AssertStringArrEquals", assert_string_arr_equals),
            ("AssertSuccess", assert_success),
            ("AssertFailure", assert_failure),
            ("Post", post),
            ("Get", get),
            ("ParallelPost", parallel_post),
            ("PrintF", print_f),
            ("ReadFile", read_file),
            ("Res", res),
            ("Sleep", sleep),
            ("Fail", fail),
            ("Pass", pass),
            ("Evaluate", evaluate),
            ("Bool", bool_),
        ];
        Self {
            fns: entries.into_iter().collect(),
        }
    }

    /// Process-wide registry, built on first use.
    pub fn global() -> &'static Registry {
        static REGISTRY: OnceLock<Registry> = OnceLock::new();
        REGISTRY.get_or_init(Registry::standard)
    }

    pub fn get(&self, name: &str) -> Option<Builtin> {
        self.fns.get(name).copied()
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

/// Split `raw` and require exactly `n` arguments.
fn exact<'a>(name: &'static str, raw: &'a str, n: usize, expected: &'static str) -> Result<Vec<&'a str>> {
    let params = split_arguments(raw);
    if params.len() != n {
        return Err(EvalError::ArityMismatch {
            name,
            expected,
            got: params.len(),
        });
    }
    Ok(params)
}

/// Trim an unevaluated name argument and drop one pair of surrounding quotes.
fn bare(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

/// Decode a JSON object argument, undoing `\"` escaping first.
fn json_object(text: &str) -> Result<Json> {
    let text = text.replace("\\\"", "\"");
    match serde_json::from_str::<Json>(&text)? {
        obj @ Json::Object(_) => Ok(obj),
        other => Err(EvalError::InvalidJson(format!("expected a JSON object but got {other}"))),
    }
}

/// Parse `key<pair>value` entries joined by `sep`.  Empty entries are skipped.
fn parse_headers(text: &str, sep: &str, pair: &str, format: &'static str) -> Result<Headers> {
    let mut headers = Headers::new();
    for entry in text.split(sep).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(pair).collect();
        let [key, value] = parts.as_slice() else {
            return Err(EvalError::InvalidHeader(format));
        };
        headers.insert((*key).to_owned(), (*value).to_owned());
    }
    Ok(headers)
}

/// Elements of the last stored response.
///
/// A JSON array yields its elements as text; any other body is a single
/// element.  An empty body yields no elements.
fn response_elements(env: &Environment) -> Result<Vec<String>> {
    let raw = match env.response() {
        Some(Value::Str(s)) => s.trim().to_owned(),
        Some(other) => other.to_string(),
        None => {
            return Err(EvalError::Response(format!(
                "no response is stored under \"{RESPONSE_KEY}\""
            )))
        }
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Json>(&raw) {
        Ok(Json::Array(items)) => Ok(items
            .into_iter()
            .map(|item| match item {
                Json::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        _ => Ok(vec![raw]),
    }
}

fn render_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

// ── Variables and control flow ────────────────────────────────────────────────

/// `[Set(name, value, type)]`
///
/// Extra middle arguments are re-joined with `,`, so values may contain
/// commas.
fn set(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = split_arguments(raw);
    if params.len() < 3 {
        return Err(EvalError::ArityMismatch {
            name: "Set",
            expected: "3",
            got: params.len(),
        });
    }
    let name = bare(params[0]);
    let value_expr = params[1..params.len() - 1].join(",");
    let value = match bare(params[params.len() - 1]) {
        "string" => Value::Str(interp.eval_string(&value_expr)?),
        "int" => Value::Int(interp.eval_int(&value_expr)?),
        "boolean" | "bool" => Value::Bool(interp.eval_bool(&value_expr)?),
        other => return Err(EvalError::UnknownType(other.to_owned())),
    };
    interp.env.set(name, value);
    Ok(Value::Pass)
}

/// `[If(cond, body)]`
fn if_(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("If", raw, 2, "2")?;
    if interp.eval_bool(params[0])? {
        interp.eval(params[1])?;
    }
    Ok(Value::Pass)
}

/// `[For(cond, body)]`: re-check `cond` before every run of `body`.
fn for_(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("For", raw, 2, "2")?;
    while interp.eval_bool(params[0])? {
        interp.eval(params[1])?;
    }
    Ok(Value::Pass)
}

/// `[Bool(expr)]`: evaluate `expr` as a boolean value.
fn bool_(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    Ok(Value::Bool(interp.eval_bool(raw)?))
}

// ── Assertions ────────────────────────────────────────────────────────────────

fn assert_equals(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("AssertEquals", raw, 2, "2")?;
    let got = interp.eval_string(params[0])?;
    let expected = interp.eval_string(params[1])?;
    if got != expected {
        return Err(EvalError::AssertionFailed(format!(
            "Expected {expected} but got {got}"
        )));
    }
    Ok(Value::Pass)
}

fn assert_contains(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("AssertContains", raw, 2, "2")?;
    let haystack = interp.eval_string(params[0])?;
    let needle = interp.eval_string(params[1])?;
    if !haystack.contains(&needle) {
        return Err(EvalError::AssertionFailed(format!(
            "parameter 0: [{haystack}] does not contain parameter 1: [{needle}]"
        )));
    }
    Ok(Value::Pass)
}

/// `[AssertStringArrEquals(a, b, orderMatters)]`
fn assert_string_arr_equals(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("AssertStringArrEquals", raw, 3, "3")?;
    let a_raw = interp.eval_string(params[0])?;
    let b_raw = interp.eval_string(params[1])?;
    let order_matters = interp.eval_bool(params[2])?;
    let a: Vec<&str> = a_raw.split(ARRAY_DELIMITER).collect();
    let b: Vec<&str> = b_raw.split(ARRAY_DELIMITER).collect();

    if a.len() != b.len() {
        return Err(EvalError::AssertionFailed("array sizes differ".into()));
    }
    if order_matters {
        if let Some((x, y)) = a.iter().zip(&b).find(|(x, y)| x != y) {
            return Err(EvalError::AssertionFailed(format!(
                "[{x}] does not equal [{y}]"
            )));
        }
        return Ok(Value::Pass);
    }
    if let Some(missing) = b.iter().find(|v| !a.contains(v)) {
        return Err(EvalError::AssertionFailed(format!(
            "[{missing}] was not found in array a"
        )));
    }
    if let Some(missing) = a.iter().find(|v| !b.contains(v)) {
        return Err(EvalError::AssertionFailed(format!(
            "[{missing}] was not found in array b"
        )));
    }
    Ok(Value::Pass)
}

/// `[AssertSuccess()]`: the last response must not start with an error
/// code.  The response is consumed.
fn assert_success(interp: &mut Interpreter, _raw: &str) -> Result<Value> {
    let elements = response_elements(&interp.env);
    interp.env.take(RESPONSE_KEY);
    let elements = elements?;
    match elements.first() {
        None => Err(EvalError::Response("response is empty".into())),
        Some(first) if first.starts_with('-') => Err(EvalError::AssertionFailed(format!(
            "expected success but failed with response: {}",
            render_list(&elements)
        ))),
        Some(_) => Ok(Value::Pass),
    }
}

/// `[AssertFailure(code)]`: the last response must start with `code`.
fn assert_failure(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("AssertFailure", raw, 1, "1")?;
    let code = interp.eval_string(params[0])?;
    let elements = response_elements(&interp.env)?;
    match elements.first() {
        None => Err(EvalError::Response("response is empty".into())),
        Some(first) if *first != code => Err(EvalError::AssertionFailed(format!(
            "expected to fail with error: [{code}] but got response: {}",
            render_list(&elements)
        ))),
        Some(_) => Ok(Value::Pass),
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// `[Post(url, jsonBody, headers)]`
fn post(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("Post", raw, 3, "3")?;
    let url = interp.eval_string(params[0])?;
    let body = json_object(&interp.eval_string(params[1])?)?;
    let headers = parse_headers(&interp.eval_string(params[2])?, ",", "___", "key___value")?;

    let response = interp
        .transport()
        .send(&url, &headers, Method::Post, Some(&body))?;
    interp.env.set(RESPONSE_KEY, Value::Str(response));
    Ok(Value::Pass)
}

/// `[Get(url, headers)]`
fn get(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("Get", raw, 2, "2")?;
    let url = interp.eval_string(params[0])?;
    let headers = parse_headers(&interp.eval_string(params[1])?, ",", "___", "key___value")?;

    let response = interp.transport().send(&url, &headers, Method::Get, None)?;
    interp.env.set(RESPONSE_KEY, Value::Str(response));
    Ok(Value::Pass)
}

/// `[ParallelPost(files, headers, jsonBodies, urls)]`
///
/// Sends every request on its own thread and waits for all of them.  Each
/// outcome lands in its own `ParallelPost<i>` slot, so a failing request
/// never fails the call.
fn parallel_post(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("ParallelPost", raw, 4, "4")?;
    // Multipart attachments are not sent; the list is only evaluated.
    interp.eval_string(params[0])?;

    let headers_raw = interp.eval_string(params[1])?;
    let mut header_sets = Vec::new();
    if !headers_raw.is_empty() {
        for set in headers_raw.split(ARRAY_DELIMITER) {
            header_sets.push(parse_headers(set, "---", ":::", "key:::value")?);
        }
    }

    let mut bodies = Vec::new();
    for body in interp.eval_string(params[2])?.split(ARRAY_DELIMITER) {
        bodies.push(json_object(body)?);
    }

    let urls_raw = interp.eval_string(params[3])?;
    let urls: Vec<&str> = urls_raw.split(ARRAY_DELIMITER).collect();
    if urls.len() != bodies.len() {
        return Err(EvalError::LengthMismatch(format!(
            "number of URLs ({}) does not align with the number of JSON bodies ({})",
            urls.len(),
            bodies.len()
        )));
    }
    if header_sets.is_empty() {
        header_sets.resize_with(urls.len(), Headers::new);
    } else if header_sets.len() != urls.len() {
        return Err(EvalError::LengthMismatch(format!(
            "number of header sets ({}) does not align with the number of URLs ({})",
            header_sets.len(),
            urls.len()
        )));
    }

    let transport = interp.transport();
    let env = Mutex::new(&mut interp.env);
    thread::scope(|s| {
        for (i, ((url, headers), body)) in urls.iter().zip(&header_sets).zip(&bodies).enumerate() {
            let env = &env;
            let transport = &transport;
            s.spawn(move || {
                let outcome = match transport.send(url, headers, Method::Post, Some(body)) {
                    Ok(response) => Value::Str(response),
                    Err(e) => {
                        warn!(index = i, url = *url, error = %e, "parallel request failed");
                        Value::Error(format!("error sending POST request to URL {url}: {e}"))
                    }
                };
                let mut env = env.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                env.set(parallel_slot(i), outcome);
            });
        }
    });
    Ok(Value::Pass)
}

/// `[Res(field)]`: a member of the last JSON-object response, or else the
/// variable `field`.
fn res(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("Res", raw, 1, "1")?;
    let field = interp.eval_string(params[0])?;

    if let Some(Value::Str(body)) = interp.env.response() {
        if let Ok(Json::Object(map)) = serde_json::from_str::<Json>(body) {
            if let Some(member) = map.get(&field) {
                return Ok(Value::from_json(member));
            }
        }
    }
    if let Some(Value::Json(map)) = interp.env.response() {
        if let Some(member) = map.get(&field) {
            return Ok(Value::from_json(member));
        }
    }
    interp
        .env
        .get(&field)
        .cloned()
        .ok_or(EvalError::MissingField(field))
}

// ── Output, files, timing ─────────────────────────────────────────────────────

/// `[PrintF(format, args...)]`
fn print_f(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = split_arguments(raw);
    let format = interp.eval_string(params[0])?;
    let mut args = Vec::with_capacity(params.len() - 1);
    for p in &params[1..] {
        args.push(interp.eval_string(p)?);
    }

    let line = format_line(&format, &args);
    info!(target: "dataapi::printf", "{line}");
    interp.output.push(line);
    Ok(Value::Pass)
}

/// Substitute `%v`, `%s`, and `%d` in order.  `%%` is a literal percent.
/// Placeholders without a matching argument are left as they are.
pub fn format_line(format: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(verb @ ('v' | 's' | 'd')) => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(arg),
                    None => {
                        out.push('%');
                        out.push(verb);
                    }
                }
            }
            _ => out.push('%'),
        }
    }
    out
}

/// `[ReadFile(varName, path)]`
fn read_file(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("ReadFile", raw, 2, "2")?;
    let name = interp.eval_string(params[0])?;
    let path = interp.eval_string(params[1])?;
    let data = interp
        .scripts()
        .read_to_string(&path)
        .map_err(|e| EvalError::Io(format!("{path}: {e}")))?;
    interp.env.set(name, Value::Str(data.clone()));
    Ok(Value::Str(data))
}

/// `[Sleep(seconds)]`; negative durations do not sleep.
fn sleep(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let params = exact("Sleep", raw, 1, "1")?;
    let seconds = interp.eval_int(params[0])?;
    thread::sleep(Duration::from_secs(seconds.max(0) as u64));
    Ok(Value::Pass)
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// `[Fail(message)]`; falls back to the raw text when it does not evaluate.
fn fail(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let message = interp
        .eval_string(raw)
        .unwrap_or_else(|_| raw.trim().to_owned());
    Err(EvalError::Fail(message))
}

fn pass(_interp: &mut Interpreter, _raw: &str) -> Result<Value> {
    Ok(Value::Pass)
}

/// `[Evaluate(path)]`: run a script file or directory and hand its report
/// back to the enclosing line.
fn evaluate(interp: &mut Interpreter, raw: &str) -> Result<Value> {
    let raw = raw.trim();
    let quoted = if raw.starts_with('"') || raw.ends_with('"') {
        raw.to_owned()
    } else {
        format!("\"{raw}\"")
    };
    match interp.eval_string(&quoted) {
        Ok(path) => Ok(Value::Report(runner::run_path(interp, &path))),
        Err(e) => {
            let mut report = ReportTree::new(raw);
            report.add(raw, e.to_string());
            Ok(Value::Report(report))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::DiskScripts;
    use crate::transport::{Transport, TransportError};
    use std::sync::Arc;

    /// Answers every request with its URL; URLs containing "fail" get a 500.
    struct Echo {
        sent: Mutex<Vec<(String, Headers, Method, Option<Json>)>>,
    }

    impl Transport for Echo {
        fn send(
            &self,
            url: &str,
            headers: &Headers,
            method: Method,
            body: Option<&Json>,
        ) -> std::result::Result<String, TransportError> {
            self.sent.lock().unwrap().push((
                url.to_owned(),
                headers.clone(),
                method,
                body.cloned(),
            ));
            if url.contains("fail") {
                return Err(TransportError::Status {
                    method,
                    url: url.to_owned(),
                    status: 500,
                    body: "nope".into(),
                });
            }
            Ok(format!("[\"0\",\"{url}\"]"))
        }
    }

    fn interp_with(transport: Arc<Echo>) -> Interpreter {
        Interpreter::new(transport, Arc::new(DiskScripts::new(".")))
    }

    fn interp() -> Interpreter {
        interp_with(Arc::new(Echo {
            sent: Mutex::new(Vec::new()),
        }))
    }

    #[test]
    fn registry_has_every_builtin() {
        let reg = Registry::global();
        for name in [
            "Set", "If", "For", "AssertEquals", "AssertContains", "AssertStringArrEquals",
            "AssertSuccess", "AssertFailure", "Post", "Get", "ParallelPost", "PrintF",
            "ReadFile", "Res", "Sleep", "Fail", "Pass", "Evaluate", "Bool",
        ] {
            assert!(reg.get(name).is_some(), "{name} missing");
        }
        assert!(reg.get("set").is_none());
    }

    #[test]
    fn set_types() {
        let mut it = interp();
        it.eval("[Set(s, \"hello world!\", string)]").unwrap();
        it.eval("[Set(i, 41 + 1, int)]").unwrap();
        it.eval("[Set(b, i == 42, boolean)]").unwrap();
        assert_eq!(it.env.get("s"), Some(&Value::from("hello world!")));
        assert_eq!(it.env.get("i"), Some(&Value::Int(42)));
        assert_eq!(it.env.get("b"), Some(&Value::Bool(true)));
    }

    #[test]
    fn set_rejoins_values_with_commas() {
        let mut it = interp();
        it.eval("[Set(s, \"a, b, c\", string)]").unwrap();
        assert_eq!(it.env.get("s"), Some(&Value::from("a, b, c")));
    }

    #[test]
    fn set_errors() {
        let mut it = interp();
        assert_eq!(
            it.eval("[Set(i, 1)]"),
            Err(EvalError::ArityMismatch { name: "Set", expected: "3", got: 2 })
        );
        assert_eq!(
            it.eval("[Set(i, 1, float)]"),
            Err(EvalError::UnknownType("float".into()))
        );
        assert!(matches!(
            it.eval("[Set(i, \"abc\", int)]"),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn if_runs_body_only_when_true() {
        let mut it = interp();
        it.eval("[Set(i, 1, int)]").unwrap();
        it.eval("[If((i > 5), [Set(hit, true, boolean)])]").unwrap();
        assert!(it.env.get("hit").is_none());
        it.eval("[If((i < 5), [Set(hit, true, boolean)])]").unwrap();
        assert_eq!(it.env.get("hit"), Some(&Value::Bool(true)));
    }

    #[test]
    fn if_surfaces_body_failure() {
        let mut it = interp();
        assert_eq!(
            it.eval("[If(true, [Fail(\"inner\")])]"),
            Err(EvalError::Fail("inner".into()))
        );
        assert!(matches!(
            it.eval("[If(\"maybe\", [Pass()])]"),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert_eq!(
            it.eval("[If(true)]"),
            Err(EvalError::ArityMismatch { name: "If", expected: "2", got: 1 })
        );
    }

    #[test]
    fn for_loops_until_condition_is_false() {
        let mut it = interp();
        it.eval("[Set(i, 0, int)]").unwrap();
        it.eval("[For((i < 3), [PrintF(\"Hello World %v\", i)][Set(i, i+1, int)])]")
            .unwrap();
        assert_eq!(it.env.get("i"), Some(&Value::Int(3)));
        assert_eq!(
            it.output,
            vec!["Hello World 0", "Hello World 1", "Hello World 2"]
        );
    }

    #[test]
    fn for_aborts_on_body_failure() {
        let mut it = interp();
        it.eval("[Set(i, 0, int)]").unwrap();
        let err = it
            .eval("[For((i < 3), [Set(i, i+1, int)][AssertEquals(i, 5)])]")
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected 5 but got 1");
        assert_eq!(it.env.get("i"), Some(&Value::Int(1)));
    }

    #[test]
    fn assert_equals_and_contains() {
        let mut it = interp();
        assert_eq!(it.eval("[AssertEquals(\"foo\", \"foo\")]"), Ok(Value::Pass));
        assert_eq!(
            it.eval("[AssertEquals(\"foo\", \"bar\")]"),
            Err(EvalError::AssertionFailed("Expected bar but got foo".into()))
        );
        assert_eq!(it.eval("[AssertContains(\"foobar\", \"bar\")]"), Ok(Value::Pass));
        assert_eq!(
            it.eval("[AssertContains(\"foo\", \"bar\")]").unwrap_err().to_string(),
            "parameter 0: [foo] does not contain parameter 1: [bar]"
        );
    }

    #[test]
    fn string_arrays_ordered_and_unordered() {
        let mut it = interp();
        it.eval("[Set(a, \"1___2___3\", string)]").unwrap();
        it.eval("[Set(b, \"3___2___1\", string)]").unwrap();
        assert_eq!(it.eval("[AssertStringArrEquals(a, b, false)]"), Ok(Value::Pass));
        assert_eq!(
            it.eval("[AssertStringArrEquals(a, b, true)]").unwrap_err().to_string(),
            "[1] does not equal [3]"
        );
        it.eval("[Set(c, \"1___2\", string)]").unwrap();
        assert_eq!(
            it.eval("[AssertStringArrEquals(a, c, false)]").unwrap_err().to_string(),
            "array sizes differ"
        );
        it.eval("[Set(d, \"1___2___4\", string)]").unwrap();
        assert_eq!(
            it.eval("[AssertStringArrEquals(a, d, false)]").unwrap_err().to_string(),
            "[4] was not found in array a"
        );
    }

    #[test]
    fn assert_success_consumes_response() {
        let mut it = interp();
        it.env.set(RESPONSE_KEY, Value::from("[\"0\", \"ok\"]"));
        assert_eq!(it.eval("[AssertSuccess()]"), Ok(Value::Pass));
        assert!(it.env.response().is_none());
        assert!(matches!(it.eval("[AssertSuccess()]"), Err(EvalError::Response(_))));

        it.env.set(RESPONSE_KEY, Value::from("[\"-22\", \"insufficient funds\"]"));
        assert_eq!(
            it.eval("[AssertSuccess()]").unwrap_err().to_string(),
            "expected success but failed with response: [-22, insufficient funds]"
        );

        it.env.set(RESPONSE_KEY, Value::from(""));
        assert_eq!(
            it.eval("[AssertSuccess()]"),
            Err(EvalError::Response("response is empty".into()))
        );
    }

    #[test]
    fn assert_failure_checks_first_element() {
        let mut it = interp();
        it.env.set(RESPONSE_KEY, Value::from("[\"-22\"]"));
        assert_eq!(it.eval("[AssertFailure(\"-22\")]"), Ok(Value::Pass));
        assert!(it.env.response().is_some());
        assert!(matches!(
            it.eval("[AssertFailure(\"-7\")]"),
            Err(EvalError::AssertionFailed(_))
        ));
    }

    #[test]
    fn post_sends_json_and_stores_response() {
        let transport = Arc::new(Echo {
            sent: Mutex::new(Vec::new()),
        });
        let mut it = interp_with(Arc::clone(&transport));
        it.eval("[Set(url, \"http://api/pay\", string)]").unwrap();
        it.eval("[Set(body, \"{\\\"Amount\\\": \\\"2000\\\"}\", string)]").unwrap();
        it.eval("[Set(headers, \"Authorization___Bearer 9m1,Monkey___Madness\", string)]")
            .unwrap();
        assert_eq!(it.eval("[Post(url, body, headers)]"), Ok(Value::Pass));
        assert_eq!(
            it.env.response(),
            Some(&Value::from("[\"0\",\"http://api/pay\"]"))
        );

        let sent = transport.sent.lock().unwrap();
        let (url, headers, method, body) = &sent[0];
        assert_eq!(url, "http://api/pay");
        assert_eq!(*method, Method::Post);
        assert_eq!(headers.get("Monkey").map(String::as_str), Some("Madness"));
        assert_eq!(headers.len(), 2);
        assert_eq!(body.as_ref().unwrap()["Amount"], Json::from("2000"));
    }

    #[test]
    fn post_rejects_bad_input() {
        let mut it = interp();
        assert!(matches!(
            it.eval("[Post(\"http://api\", \"not json\", \"\")]"),
            Err(EvalError::InvalidJson(_))
        ));
        assert_eq!(
            it.eval("[Post(\"http://api\", \"{}\", \"broken\")]"),
            Err(EvalError::InvalidHeader("key___value"))
        );
        assert!(matches!(
            it.eval("[Post(\"http://fail\", \"{}\", \"\")]"),
            Err(EvalError::Transport(TransportError::Status { status: 500, .. }))
        ));
    }

    #[test]
    fn get_stores_response() {
        let mut it = interp();
        assert_eq!(it.eval("[Get(\"http://api/status\", \"\")]"), Ok(Value::Pass));
        assert_eq!(
            it.env.response(),
            Some(&Value::from("[\"0\",\"http://api/status\"]"))
        );
    }

    #[test]
    fn parallel_post_fills_every_slot() {
        let mut it = interp();
        it.eval("[Set(files, \"a.txt___b.txt___c.txt\", string)]").unwrap();
        it.eval("[Set(headers, \"K:::1___K:::2---L:::3___K:::4\", string)]").unwrap();
        it.eval("[Set(jsons, \"{}___{}___{}\", string)]").unwrap();
        it.eval("[Set(urls, \"http://a___http://fail___http://c\", string)]").unwrap();
        assert_eq!(it.eval("[ParallelPost(files, headers, jsons, urls)]"), Ok(Value::Pass));

        assert_eq!(it.env.get("ParallelPost0"), Some(&Value::from("[\"0\",\"http://a\"]")));
        assert!(matches!(it.env.get("ParallelPost1"), Some(Value::Error(_))));
        assert_eq!(it.env.get("ParallelPost2"), Some(&Value::from("[\"0\",\"http://c\"]")));
    }

    #[test]
    fn parallel_post_length_mismatch() {
        let mut it = interp();
        assert!(matches!(
            it.eval("[ParallelPost(\"\", \"\", \"{}___{}\", \"http://a\")]"),
            Err(EvalError::LengthMismatch(_))
        ));
        assert!(matches!(
            it.eval("[ParallelPost(\"\", \"K:::1\", \"{}___{}\", \"http://a___http://b\")]"),
            Err(EvalError::LengthMismatch(_))
        ));
    }

    #[test]
    fn res_prefers_response_members() {
        let mut it = interp();
        it.env.set(RESPONSE_KEY, Value::from("{\"status\": \"ok\", \"code\": 7}"));
        it.env.set("status", Value::from("shadowed"));
        it.env.set("other", Value::from("from env"));
        assert_eq!(it.eval("[Res(\"status\")]"), Ok(Value::from("ok")));
        assert_eq!(it.eval("[Res(\"code\")]"), Ok(Value::Int(7)));
        assert_eq!(it.eval("[Res(\"other\")]"), Ok(Value::from("from env")));
        assert_eq!(
            it.eval("[Res(\"missing\")]"),
            Err(EvalError::MissingField("missing".into()))
        );
    }

    #[test]
    fn printf_formats() {
        assert_eq!(
            format_line("%v-%s-%d 100%%", &["a".into(), "b".into(), "3".into()]),
            "a-b-3 100%"
        );
        assert_eq!(format_line("%v %v", &["x".into()]), "x %v");
    }

    #[test]
    fn read_file_binds_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("expected.txt"), "hello").unwrap();
        let mut it = Interpreter::new(
            Arc::new(Echo {
                sent: Mutex::new(Vec::new()),
            }),
            Arc::new(DiskScripts::new(dir.path())),
        );
        assert_eq!(
            it.eval("[ReadFile(\"expected\", \"expected.txt\")]"),
            Ok(Value::from("hello"))
        );
        assert_eq!(it.env.get("expected"), Some(&Value::from("hello")));
        assert!(matches!(
            it.eval("[ReadFile(\"x\", \"nope.txt\")]"),
            Err(EvalError::Io(_))
        ));
    }

    #[test]
    fn sleep_accepts_zero_and_negative() {
        let mut it = interp();
        assert_eq!(it.eval("[Sleep(0)]"), Ok(Value::Pass));
        assert_eq!(it.eval("[Sleep(-3)]"), Ok(Value::Pass));
    }

    #[test]
    fn fail_and_pass() {
        let mut it = interp();
        assert_eq!(
            it.eval("[Fail(\"custom\")]"),
            Err(EvalError::Fail("custom".into()))
        );
        assert_eq!(
            it.eval("[Fail(not an expression)]"),
            Err(EvalError::Fail("not an expression".into()))
        );
        assert_eq!(it.eval("[Pass()]"), Ok(Value::Pass));
    }
}
