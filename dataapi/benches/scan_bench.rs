use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dataapi::script::expr::eval_str;
use dataapi::script::scan::{split_arguments, split_call, split_top_level};
use dataapi::script::{EvalContext, EvalError, Value};

struct Vars;

impl EvalContext for Vars {
    fn get_var(&self, name: &str) -> Option<Value> {
        (name == "i").then_some(Value::Int(2))
    }

    fn call_fn(&mut self, name: &str, _args: Vec<Value>) -> Result<Value, EvalError> {
        Err(EvalError::FunctionNotFound(name.to_owned()))
    }
}

fn make_line(calls: usize) -> String {
    let call = "[Post(\"http://api/transfer\", \"{\\\"amount\\\": 10}\", \"Auth___token\")][AssertSuccess()]";
    call.repeat(calls)
}

fn nested_call(depth: usize) -> String {
    let mut s = "[Pass()]".to_owned();
    for _ in 0..depth {
        s = format!("[If((i < 3), {s}, [Set(i, i+1, int)])]");
    }
    s
}

fn bench_scan(c: &mut Criterion) {
    let short = make_line(1);
    let long = make_line(50);
    let nested = nested_call(20);

    let mut g = c.benchmark_group("scan");

    g.bench_function("top_level_short", |b| {
        b.iter(|| split_top_level(black_box(&short)))
    });
    g.bench_function("top_level_long", |b| {
        b.iter(|| split_top_level(black_box(&long)))
    });
    g.bench_function("call_and_arguments_nested", |b| {
        b.iter(|| {
            let call = split_call(black_box(&nested)).map(|c| split_arguments(c.raw_params).len());
            black_box(call)
        })
    });

    g.finish();
}

fn bench_expr(c: &mut Criterion) {
    let mut g = c.benchmark_group("expr");

    g.bench_function("relational", |b| {
        b.iter(|| eval_str(black_box("(i < 3) && !(i == 5)"), &mut Vars))
    });
    g.bench_function("arithmetic", |b| {
        b.iter(|| eval_str(black_box("i * 21 + (100 - i) % 7"), &mut Vars))
    });
    g.bench_function("regex_match", |b| {
        b.iter(|| eval_str(black_box("\"txn-00042\" =/ \"^txn-[0-9]+$\""), &mut Vars))
    });

    g.finish();
}

criterion_group!(benches, bench_scan, bench_expr);
criterion_main!(benches);
