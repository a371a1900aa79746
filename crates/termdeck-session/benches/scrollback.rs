use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use termdeck_core::{Dimensions, ScrollbackSettings, SessionId};
use termdeck_session::{reverse_iterate, ScrollbackCodec, ScrollbackOptions};
use termdeck_view::{HeadlessView, TerminalView};

/// Build a view filled with colored build-log output, some rows soft-wrapped.
fn create_filled_view(lines: usize) -> HeadlessView {
    let mut view = HeadlessView::new(SessionId::from("bench"), Dimensions::new(24, 80), lines * 2);
    for i in 0..lines {
        let row = if i % 10 == 0 {
            format!(
                "\x1b[33mwarning\x1b[0m: long diagnostic {} {}\r\n",
                i,
                "x".repeat(120)
            )
        } else {
            format!("\x1b[32m   Compiling\x1b[0m crate-{} v0.1.{}\r\n", i, i % 7)
        };
        let _ = view.write(&row);
    }
    view
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("scrollback_save");
    let codec = ScrollbackCodec::new(&ScrollbackSettings::default());

    for lines in [100, 1000, 5000].iter() {
        let view = create_filled_view(*lines);
        let options = ScrollbackOptions {
            max_lines: *lines,
            ..ScrollbackOptions::default()
        };

        group.bench_with_input(BenchmarkId::from_parameter(lines), &view, |b, view| {
            b.iter(|| codec.save(black_box(view), options))
        });
    }

    group.finish();
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("scrollback_restore");
    let codec = ScrollbackCodec::new(&ScrollbackSettings::default());

    for lines in [100, 1000].iter() {
        let source = create_filled_view(*lines);
        let options = ScrollbackOptions {
            max_lines: *lines,
            ..ScrollbackOptions::default()
        };
        let content = match codec.save(&source, options) {
            Ok(snapshot) => snapshot.content,
            Err(_) => continue,
        };

        group.bench_with_input(BenchmarkId::from_parameter(lines), &content, |b, content| {
            let mut target =
                HeadlessView::new(SessionId::from("target"), Dimensions::new(24, 80), lines * 2);
            b.iter(|| codec.restore(&mut target, black_box(content)))
        });
    }

    group.finish();
}

fn bench_reverse_iterate(c: &mut Criterion) {
    let view = create_filled_view(5000);

    c.bench_function("reverse_iterate_tail_200", |b| {
        b.iter(|| reverse_iterate(black_box(&view), usize::MAX).take(200).count())
    });
}

criterion_group!(benches, bench_save, bench_restore, bench_reverse_iterate);
criterion_main!(benches);
