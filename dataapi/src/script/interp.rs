//! Data code evaluator.
//!
//! The [`Interpreter`] owns the [`Environment`] of one script run and the
//! capabilities built-ins reach out through (transport and script files).
//! It implements [`EvalContext`] so the expression evaluator can call back
//! into it for variable lookups and function calls.

use std::sync::Arc;

use tracing::debug;

use super::{
    builtins::Registry,
    env::{Environment, PARAMS_KEY, VALUE_KEY},
    error::{EvalError, Result},
    expr::{eval_str, EvalContext},
    report::ReportTree,
    runner,
    scan::{split_call, split_top_level},
    value::Value,
};
use crate::scripts::ScriptFs;
use crate::transport::Transport;

pub struct Interpreter {
    /// Variables of the current run.
    pub env: Environment,
    /// Lines produced by `PrintF`, in order.
    pub output: Vec<String>,
    registry: &'static Registry,
    transport: Arc<dyn Transport>,
    scripts: Arc<dyn ScriptFs>,
    /// Script paths currently being run, outermost first.
    active: Vec<String>,
}

impl Interpreter {
    pub fn new(transport: Arc<dyn Transport>, scripts: Arc<dyn ScriptFs>) -> Self {
        Self {
            env: Environment::new(),
            output: Vec::new(),
            registry: Registry::global(),
            transport,
            scripts,
            active: Vec::new(),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn scripts(&self) -> Arc<dyn ScriptFs> {
        Arc::clone(&self.scripts)
    }

    /// Run a script file or directory (relative to the script root) and
    /// return its report.
    pub fn run(&mut self, path: &str) -> ReportTree {
        runner::run_path(self, path)
    }

    /// Mark `path` as running.  Returns `false` if it already is.
    pub(crate) fn enter(&mut self, path: &str) -> bool {
        if self.active.iter().any(|p| p == path) {
            return false;
        }
        self.active.push(path.to_owned());
        true
    }

    pub(crate) fn leave(&mut self) {
        self.active.pop();
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate one line (or argument) of data code.
    ///
    /// Every top-level token is evaluated in order.  A nested report is
    /// returned as soon as it appears.  Failures are collected rather than
    /// aborting, and come back as one error once every token has run.  On
    /// success the value of the last token is returned, which is
    /// [`Value::Pass`] when that token had nothing to report.
    pub fn eval(&mut self, expr: &str) -> Result<Value> {
        let mut errors = Vec::new();
        let mut last = Value::Pass;

        for token in split_top_level(expr) {
            match self.eval_token(token) {
                Ok(Value::Report(tree)) => return Ok(Value::Report(tree)),
                Ok(Value::Error(msg)) => errors.push(EvalError::Fail(msg)),
                Ok(Value::Pass) => last = Value::Pass,
                Ok(value) => {
                    self.env.set(VALUE_KEY, value.clone());
                    last = value;
                }
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(last),
            1 => Err(errors.remove(0)),
            _ => Err(EvalError::Cascade(errors)),
        }
    }

    fn eval_token(&mut self, token: &str) -> Result<Value> {
        if !token.contains(['[', ']']) {
            return eval_str(token, self);
        }
        let call = split_call(token)?;
        self.env.set(PARAMS_KEY, Value::Str(call.raw_params.to_owned()));
        self.dispatch(call.name, call.raw_params)
    }

    /// Invoke a built-in by name with unevaluated argument text.
    pub fn dispatch(&mut self, name: &str, raw_params: &str) -> Result<Value> {
        let builtin = self
            .registry
            .get(name)
            .ok_or_else(|| EvalError::FunctionNotFound(name.to_owned()))?;
        debug!(name, params = raw_params, "dispatch");
        builtin(self, raw_params)
    }

    /// Evaluate `expr` and render the result as text.
    pub fn eval_string(&mut self, expr: &str) -> Result<String> {
        match self.eval(expr)? {
            v @ (Value::Str(_) | Value::Int(_) | Value::Bool(_) | Value::Json(_)) => Ok(v.to_string()),
            other => Err(mismatch("a string", &other)),
        }
    }

    pub fn eval_int(&mut self, expr: &str) -> Result<i64> {
        let v = self.eval(expr)?;
        match v {
            Value::Int(n) => Ok(n),
            Value::Str(_) => v.as_int().ok_or_else(|| mismatch("an int", &v)),
            other => Err(mismatch("an int", &other)),
        }
    }

    pub fn eval_bool(&mut self, expr: &str) -> Result<bool> {
        let v = self.eval(expr)?;
        match v {
            Value::Bool(b) => Ok(b),
            Value::Str(_) => v.as_bool().ok_or_else(|| mismatch("a boolean", &v)),
            other => Err(mismatch("a boolean", &other)),
        }
    }

    /// Render evaluated call arguments back into argument text.
    ///
    /// Plain scalars become literals.  Anything the scanner would split or
    /// nest on is parked in the environment under `params<i>` and passed by
    /// name instead.
    fn call_args(&mut self, args: Vec<Value>) -> String {
        let mut parts = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let literal = match &arg {
                Value::Int(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Str(s) if !s.contains([',', '[', ']']) => Some(quote(s)),
                _ => None,
            };
            match literal {
                Some(text) => parts.push(text),
                None => {
                    let key = format!("{PARAMS_KEY}{i}");
                    self.env.set(key.clone(), arg);
                    parts.push(key);
                }
            }
        }
        parts.join(", ")
    }
}

fn mismatch(expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: match found {
            Value::Str(s) => format!("\"{s}\""),
            other => other.type_name().to_owned(),
        },
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ── EvalContext impl ──────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.env.get(name).cloned()
    }

    fn call_fn(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let raw = self.call_args(args);
        self.env.set(PARAMS_KEY, Value::Str(raw.clone()));
        self.dispatch(name, &raw)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
