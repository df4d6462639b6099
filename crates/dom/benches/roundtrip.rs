use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dom::{parse, serialize};

fn sample_page() -> String {
    let mut page = String::from(
        "<!DOCTYPE html><html><head><title>Bench</title>\
         <style>body { margin: 0 }</style></head><body>",
    );
    for i in 0..500 {
        page.push_str(&format!(
            "<div class=\"row r{i}\" id=\"row-{i}\">\n  <p>Item {i} &amp; more</p>\n  \
             <a href=\"https://example.com/{i}\">link</a><img src=\"/img/{i}.png\" alt>\n\
             <ul><li>one<li>two</ul><!-- row {i} --></div>\n"
        ));
    }
    page.push_str("<script>var x = 1 < 2;</script></body></html>");
    page
}

fn bench_parse(c: &mut Criterion) {
    let page = sample_page();
    c.bench_function("parse", |b| b.iter(|| parse(black_box(&page))));
}

fn bench_roundtrip(c: &mut Criterion) {
    let page = sample_page();
    c.bench_function("parse_serialize", |b| {
        b.iter(|| {
            let arena = parse(black_box(&page)).unwrap();
            serialize(&arena).unwrap()
        })
    });
}

criterion_group!(benches, bench_parse, bench_roundtrip);
criterion_main!(benches);
