use criterion::{criterion_group, criterion_main, Criterion};

use mpscan::{
    Action, AutomatonBuilder, ByteClass, Depth, Literal, Program,
    ProgramBuilder, Scanner, Scratch, Stream,
};

macro_rules! gen_bench {
    ($name:ident, $samples:expr, $desc:literal, $program:expr, $data:expr) => {
        fn $name(c: &mut Criterion) {
            let mut group = c.benchmark_group($desc);
            let program: Program = $program;
            let data: Vec<u8> = $data;

            group.sample_size($samples);

            group.bench_function("block", |b| {
                let mut scratch = Scratch::new(&program).unwrap();
                let scanner = Scanner::new(&program);

                b.iter(|| {
                    let _ = scanner.scan(&mut scratch, &data, |_| {
                        Action::Continue
                    });
                })
            });

            group.bench_function("stream", |b| {
                let mut scratch = Scratch::new(&program).unwrap();

                b.iter(|| {
                    let mut stream = Stream::open(&program).unwrap();
                    for chunk in data.chunks(61) {
                        let _ = stream.scan(&mut scratch, chunk, |_| {
                            Action::Continue
                        });
                    }
                    let _ = stream.close(&mut scratch, |_| Action::Continue);
                });
            });
        }
    };
}

fn literals() -> Program {
    let mut builder = ProgramBuilder::new();
    for word in ["fabada", "lorem", "ipsum", "dolor", "amet", "consectetur"] {
        builder.add_literal(word).unwrap();
    }
    builder.build().unwrap()
}

fn repeats() -> Program {
    let mut builder = ProgramBuilder::new();
    builder.add_repeat(ByteClass::byte(0), 4, Depth::new(32)).unwrap();
    builder
        .add_repeat(ByteClass::range(b'0'..=b'9'), 3, Depth::new(200))
        .unwrap();
    builder
        .add_repeat(ByteClass::range(b'a'..=b'z'), 8, Depth::INFINITY)
        .unwrap();
    builder.build().unwrap()
}

fn confirmed() -> Program {
    let mut builder = ProgramBuilder::new();
    let mut code = AutomatonBuilder::new();
    code.emit_seek(-4)
        .emit_literal(b"http")
        .emit_seek(3)
        .emit_class(&ByteClass::range(b'a'..=b'z'))
        .emit_match();
    let automaton = builder.add_automaton(code.into_inner()).unwrap();
    builder
        .add_literals([Literal::new("://").confirmed_by(automaton)])
        .unwrap();
    builder.build().unwrap()
}

fn text() -> Vec<u8> {
    "fabadafabafabadafab lorem ipsum 0000000 dolor sit amet 123456 \
     https://example.com consectetur ftp://xyz fabafabafafabadafaba"
        .repeat(64)
        .into_bytes()
}

gen_bench!(bench_literals, 100, "Literals", literals(), text());

gen_bench!(bench_repeats, 100, "Repeats", repeats(), text());

gen_bench!(bench_confirmed, 100, "Confirmed literals", confirmed(), text());

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_literals, bench_repeats, bench_confirmed);

criterion_main!(benches);
