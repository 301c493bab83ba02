//! Read path regrouping benchmark

use tsbridge::codec;
use tsbridge::gateway::{Gateway, MemoryGateway};
use tsbridge::model::{LabelSet, MatchKind, Matcher, Query, ReadRequest};
use tsbridge::query::{MatcherTranslator, Reader, SeriesBuilder};
use tsbridge::schema::{SampleRow, TableName};

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rows for `series` series interleaved round-robin, as a scan without ORDER BY returns them
fn create_rows(series: usize, samples_per_series: usize) -> Vec<SampleRow> {
    let label_sets: Vec<Arc<LabelSet>> = (0..series)
        .map(|i| {
            Arc::new(
                [
                    ("__name__", "http_requests".to_string()),
                    ("instance", format!("10.0.0.{}:9100", i % 250)),
                    ("shard", (i / 250).to_string()),
                ]
                .into_iter()
                .collect(),
            )
        })
        .collect();

    let mut rows = Vec::with_capacity(series * samples_per_series);
    for t in (0..samples_per_series as i64).rev() {
        for labels in &label_sets {
            rows.push(SampleRow {
                metric_name: Arc::from("http_requests"),
                labels: labels.clone(),
                timestamp_ms: t * 15_000,
                value: t as f64,
            });
        }
    }
    rows
}

fn benchmark_series_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_builder");

    for series in [100, 1_000] {
        let rows = create_rows(series, 60);
        group.throughput(Throughput::Elements(rows.len() as u64));

        group.bench_function(format!("{}_series", series), |b| {
            b.iter(|| {
                let mut builder = SeriesBuilder::new();
                for row in rows.iter().cloned() {
                    builder.push(row);
                }
                black_box(builder.finish());
            });
        });
    }

    group.finish();
}

fn benchmark_read_memory(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let table: TableName = "metrics.samples".parse().unwrap();
    let gateway = Arc::new(MemoryGateway::new());
    let rows = create_rows(1_000, 60);
    runtime
        .block_on(gateway.insert_batch(&table, &rows))
        .unwrap();

    let reader = Reader::new(gateway, table, MatcherTranslator::new(None));
    let request = ReadRequest {
        queries: vec![Query {
            matchers: vec![
                Matcher::equal("__name__", "http_requests"),
                Matcher::new(MatchKind::RegexMatch, "shard", "[0-1]"),
            ],
            start_ms: 0,
            end_ms: i64::MAX,
        }],
    };

    let mut group = c.benchmark_group("read_memory");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("read_and_encode", |b| {
        b.to_async(&runtime).iter(|| async {
            let response = reader
                .read(&request, &CancellationToken::new())
                .await
                .unwrap();
            black_box(codec::encode_read(&response).unwrap());
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_series_builder, benchmark_read_memory);

criterion_main!(benches);
