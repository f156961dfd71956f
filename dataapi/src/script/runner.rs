//! Script runner: turns a script file or directory into a [`ReportTree`].
//!
//! A file report has one child per evaluated line:
//!
//! ```text
//! suite/a.txt
//! ├── [Set(i, 1, int)]
//! │   └── [Pass()]
//! └── [AssertEquals(i, 2)]
//!     └── Expected 2 but got 1
//! ```
//!
//! A directory report has one child per entry, each carrying that entry's
//! own report.  Lines that produce a plain value (e.g. `ReadFile`) are not
//! recorded.

use tracing::{info, warn};

use super::{interp::Interpreter, report::Label, report::ReportTree, value::Value};

/// Recorded when a script cannot be read.
pub const COULD_NOT_OPEN: &str = "could not open file";
/// Recorded when a script has no content.
pub const NO_DATA: &str = "there is no data in the input file to evaluate";
/// Recorded when no script path was given.
pub const EMPTY_TARGET: &str = "target path is empty";
/// Recorded when a script (directly or indirectly) evaluates itself.
pub const RECURSIVE: &str = "recursive evaluation";

/// Run `path` (relative to the script root) and return its report.
///
/// Never fails: an empty path, unreadable or empty files, a script that
/// re-enters itself through `Evaluate`, and failing lines all become report
/// entries.
pub fn run_path(interp: &mut Interpreter, path: &str) -> ReportTree {
    let path = path.trim().trim_end_matches('/');
    let mut report = ReportTree::new(path);
    if path.is_empty() {
        report.add(path, COULD_NOT_OPEN);
        report.add(COULD_NOT_OPEN, EMPTY_TARGET);
        return report;
    }
    if !interp.enter(path) {
        warn!(path, "recursive evaluation");
        report.add(path, RECURSIVE);
        report.add(RECURSIVE, format!("{path} is already being evaluated"));
        return report;
    }
    let report = run_target(interp, path);
    interp.leave();
    report
}

fn run_target(interp: &mut Interpreter, path: &str) -> ReportTree {
    info!(path, "evaluating");
    let scripts = interp.scripts();
    let mut report = ReportTree::new(path);

    if scripts.is_dir(path) {
        let names = match scripts.list_dir(path) {
            Ok(names) => names,
            Err(e) => {
                report.add(path, e.to_string());
                return report;
            }
        };
        for name in names {
            let child = run_path(interp, &format!("{path}/{name}"));
            report.add(path, child.label.clone());
            report.add_tree(child);
        }
        return report;
    }

    let data = match scripts.read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            report.add(path, COULD_NOT_OPEN);
            report.add(COULD_NOT_OPEN, e.to_string());
            return report;
        }
    };
    if data.is_empty() {
        report.add(path, NO_DATA);
        return report;
    }

    for line in data.lines() {
        let line = line.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match interp.eval(line) {
            Ok(Value::Pass) => {
                report.add(path, line);
                report.add(line, Label::Pass);
            }
            Ok(Value::Report(sub)) => {
                report.add(path, sub.label.clone());
                report.add_tree(sub);
            }
            Ok(_) => {}
            Err(e) => {
                report.add(path, line);
                report.add(line, e.to_string());
            }
        }
    }
    report
}

// ── Tests ─────────────────────────────────────────────────────────────────────
