//! Benchmarks for route planning, the SQLite store and link extraction
//!
//! Run with: cargo bench

use camino::map::{JourneySummary, RoutePlan};
use camino::metadata::MetadataExtractor;
use camino::points::{Coordinates, JourneyId, NewPoint, Point, PointStore, SqlitePointStore};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::tempdir;

fn create_test_points(count: usize) -> Vec<Point> {
    let start = Utc.with_ymd_and_hms(2024, 4, 20, 8, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let ts = start + Duration::hours(i as i64);
            NewPoint::new(
                Coordinates::new(43.0 + i as f64 * 0.001, -8.0 - i as f64 * 0.001),
                ts,
            )
            .title(format!("Stage {}", i))
            .into_point(format!("p{}", i), ts)
        })
        .collect()
}

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");

    for size in [10, 100, 1000] {
        let points = create_test_points(size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("plan_{}", size), |b| {
            b.iter(|| RoutePlan::from_points(black_box(&points)))
        });

        group.bench_function(format!("summary_{}", size), |b| {
            b.iter(|| JourneySummary::from_points(black_box(&points)))
        });
    }

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqlite_store");
    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("insert", |b| {
        let dir = tempdir().unwrap();
        let store = SqlitePointStore::open(&dir.path().join("bench.db")).unwrap();
        let journey = JourneyId::default();
        let point = NewPoint::new(Coordinates::new(42.88, -8.54), Utc::now()).title("Santiago");

        b.iter(|| {
            rt.block_on(store.insert(&journey, black_box(point.clone())))
                .unwrap()
        });
    });

    group.bench_function("list_1000", |b| {
        let store = SqlitePointStore::in_memory().unwrap();
        let journey = JourneyId::default();
        rt.block_on(async {
            for point in create_test_points(1000) {
                let new = NewPoint::new(point.coordinates, point.timestamp).title(point.title);
                store.insert(&journey, new).await.unwrap();
            }
        });

        b.iter(|| rt.block_on(store.list(black_box(&journey))).unwrap());
    });

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let extractor = MetadataExtractor::new().unwrap();
    let mut html = String::from(
        r#"<html><head>
        <title>Day 6 &#8211; Portomarín</title>
        <meta name="description" content="Rain, then the bridge">
        <meta content="Day 6" property="og:title">
        <meta property="og:image" content="/img/day-6.jpg">
        "#,
    );
    // Realistic page weight after the head
    html.push_str("</head><body>");
    html.push_str(&"<p>Walking along the Miño &amp; up the stairs.</p>".repeat(500));
    html.push_str("</body></html>");

    c.bench_function("extract_metadata", |b| {
        b.iter(|| extractor.extract(black_box(&html), "https://blog.example.org/day-6"))
    });
}

criterion_group!(benches, bench_route, bench_store, bench_extract);
criterion_main!(benches);
