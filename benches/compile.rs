//! End-to-end compilation throughput benchmark.
//!
//! Measures the full pipeline (lex through emission) on programs of a few
//! characteristic shapes: straight-line arithmetic, loop-heavy control
//! flow, and many small functions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Build a straight-line program with `n` chained arithmetic statements.
fn arithmetic_program(n: usize) -> String {
    let mut src = String::from("int main(void) {\n    int acc = 1;\n");
    for i in 0..n {
        src.push_str(&format!(
            "    acc = acc * {} + {} % ({} + 1);\n",
            i % 7 + 1,
            i,
            i % 5 + 1
        ));
    }
    src.push_str("    return acc;\n}\n");
    src
}

/// Build a program with `n` small functions plus a caller chaining them.
fn many_functions_program(n: usize) -> String {
    let mut src = String::new();
    for i in 0..n {
        src.push_str(&format!(
            "int f{}(int x) {{ int y = x + {}; return y * 2; }}\n",
            i, i
        ));
    }
    src.push_str("int main(void) {\n    int acc = 0;\n");
    for i in 0..n {
        src.push_str(&format!("    acc = acc + f{}(acc);\n", i));
    }
    src.push_str("    return acc;\n}\n");
    src
}

const LOOPS: &str = "int main(void) {
    int total = 0;
    for (int i = 0; i < 100; i = i + 1) {
        int j = 0;
        while (j < 10) {
            if (j == 7 && i % 2 == 0)
                break;
            total = total + (i < j ? i : j);
            j = j + 1;
        }
        do total = total - 1; while (0);
    }
    return total;
}
";

fn bench_compile(c: &mut Criterion) {
    let arith_100 = arithmetic_program(100);
    let funcs_50 = many_functions_program(50);

    let mut group = c.benchmark_group("compile");
    group.bench_function("arith_100_stmts", |b| {
        b.iter(|| nanocc::compile_source(black_box(&arith_100)).unwrap())
    });
    group.bench_function("nested_loops", |b| {
        b.iter(|| nanocc::compile_source(black_box(LOOPS)).unwrap())
    });
    group.bench_function("50_functions", |b| {
        b.iter(|| nanocc::compile_source(black_box(&funcs_50)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
