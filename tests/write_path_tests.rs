//! Write path tests against the in-memory gateway

use tsbridge::gateway::{Gateway, MemoryGateway};
use tsbridge::ingester::Writer;
use tsbridge::model::{LabelSet, Matcher, Sample, TimeRange, TimeSeries, WriteRequest};
use tsbridge::query::MatcherTranslator;
use tsbridge::schema::TableName;
use tsbridge::{GatewayError, WriteError};

use std::sync::Arc;

fn table() -> TableName {
    "metrics.samples".parse().unwrap()
}

fn series(pairs: &[(&str, &str)], samples: &[(i64, f64)]) -> TimeSeries {
    TimeSeries {
        labels: pairs.iter().copied().collect::<LabelSet>(),
        samples: samples.iter().map(|&(ts, v)| Sample::new(ts, v)).collect(),
    }
}

fn setup() -> (Arc<MemoryGateway>, Writer) {
    let gateway = Arc::new(MemoryGateway::new());
    let writer = Writer::new(gateway.clone(), table());
    (gateway, writer)
}

#[tokio::test]
async fn test_write_returns_sample_count() {
    let (gateway, writer) = setup();
    let request = WriteRequest {
        series: vec![series(
            &[("__name__", "up"), ("job", "api")],
            &[(1000, 1.0), (2000, 0.0)],
        )],
    };

    assert_eq!(writer.write(&request).await.unwrap(), 2);
    assert_eq!(gateway.row_count(&table()), 2);
    assert_eq!(gateway.batches_inserted(), 1);
}

#[tokio::test]
async fn test_write_count_matches_sum_of_series() {
    let (gateway, writer) = setup();
    let mut expected_total = 0;

    for round in 0..5_i64 {
        let series_list: Vec<TimeSeries> = (0..round + 1)
            .map(|s| {
                let samples: Vec<(i64, f64)> =
                    (0..(s * 3 + round) % 7).map(|i| (i * 1000, i as f64)).collect();
                let instance = format!("host-{}", s);
                series(&[("__name__", "cpu"), ("instance", instance.as_str())], &samples)
            })
            .collect();
        let request = WriteRequest {
            series: series_list,
        };
        let expected = request.sample_count() as u64;

        assert_eq!(writer.write(&request).await.unwrap(), expected);
        expected_total += expected as usize;
    }

    assert_eq!(gateway.row_count(&table()), expected_total);
}

#[tokio::test]
async fn test_write_without_samples_skips_storage() {
    let (gateway, writer) = setup();
    let request = WriteRequest {
        series: vec![series(&[("__name__", "up")], &[])],
    };

    assert_eq!(writer.write(&request).await.unwrap(), 0);
    assert_eq!(writer.write(&WriteRequest::default()).await.unwrap(), 0);
    assert_eq!(gateway.batches_inserted(), 0);
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let (gateway, writer) = setup();
    gateway.set_available(false);

    let request = WriteRequest {
        series: vec![series(&[("__name__", "up")], &[(1, 1.0)])],
    };
    let err = writer.write(&request).await.unwrap_err();
    assert!(matches!(
        err,
        WriteError::Gateway(GatewayError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_written_rows_keep_full_label_set() {
    let (gateway, writer) = setup();
    let request = WriteRequest {
        series: vec![series(
            &[("__name__", "http_requests"), ("code", "200"), ("path", "/api")],
            &[(1000, 12.0)],
        )],
    };
    writer.write(&request).await.unwrap();

    let predicate = MatcherTranslator::new(None)
        .translate(&[Matcher::equal("code", "200")])
        .unwrap();
    let mut cursor = gateway
        .query(&table(), &predicate, TimeRange::new(0, 2000))
        .await
        .unwrap();
    let row = cursor.next_row().await.unwrap().unwrap();

    assert_eq!(&*row.metric_name, "http_requests");
    assert_eq!(*row.labels, request.series[0].labels);
    assert_eq!(row.value, 12.0);
    assert!(cursor.next_row().await.unwrap().is_none());
}
