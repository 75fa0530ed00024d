use criterion::{Criterion, criterion_group, criterion_main};
use feather::Interp;

fn interpreter_benches(c: &mut Criterion) {
    c.bench_function("expr_arithmetic", |b| {
        let mut interp = Interp::new();
        b.iter(|| interp.eval("expr {3 * 7 + 2 ** 8}").unwrap());
    });

    c.bench_function("proc_call", |b| {
        let mut interp = Interp::new();
        interp.eval("proc inc x { expr {$x + 1} }").unwrap();
        b.iter(|| interp.eval("inc 41").unwrap());
    });

    c.bench_function("foreach_sum", |b| {
        let mut interp = Interp::new();
        interp.eval("set nums [lrepeat 50 1 2 3 4]").unwrap();
        b.iter(|| interp.eval("set s 0; foreach n $nums { incr s $n }; set s").unwrap());
    });

    c.bench_function("parse_only", |b| {
        let script = "proc demo {a b} { foreach x $a { lappend out [expr {$x * $b}] } }";
        b.iter(|| {
            let mut offset = 0;
            while let feather::parse::ParseStep::Complete(cmd) = feather::parse::next_command(script, offset) {
                offset = cmd.end + 1;
                if offset >= script.len() {
                    break;
                }
            }
        });
    });
}

criterion_group!(benches, interpreter_benches);
criterion_main!(benches);
