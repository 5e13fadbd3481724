use podsentry_daemon::detector::AnomalyResult;
use podsentry_daemon::features::{EntityId, FeatureVector, FEATURE_COUNT};
use podsentry_daemon::publisher::SignalPublisher;
use std::fs;
use tempfile::tempdir;

fn anomaly(namespace: &str, name: &str) -> AnomalyResult {
    AnomalyResult {
        entity: EntityId::new(namespace, name),
        namespace: namespace.to_string(),
        score: -0.2,
        features: FeatureVector {
            namespace: namespace.to_string(),
            values: [0.0; FEATURE_COUNT],
        },
    }
}

#[test]
fn test_one_line_per_anomaly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("anomalous_pods.txt");
    let publisher = SignalPublisher::new(&path);

    publisher.publish(&[anomaly("shop", "api-0"), anomaly("batch", "job-7")]);

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["shop/api-0", "batch/job-7"]);
}

#[test]
fn test_empty_list_truncates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("anomalous_pods.txt");
    let publisher = SignalPublisher::new(&path);

    publisher.publish(&[anomaly("shop", "api-0")]);
    publisher.publish(&[]);

    assert!(path.exists());
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.is_empty());
    assert_eq!(content.lines().count(), 0);
}

#[test]
fn test_write_replaces_previous_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("anomalous_pods.txt");
    let publisher = SignalPublisher::new(&path);

    publisher.publish(&[anomaly("shop", "a"), anomaly("shop", "b"), anomaly("shop", "c")]);
    publisher.publish(&[anomaly("shop", "d")]);

    assert_eq!(fs::read_to_string(&path).unwrap(), "shop/d\n");
}

#[test]
fn test_missing_directory_is_swallowed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("anomalous_pods.txt");
    let publisher = SignalPublisher::new(&path);

    publisher.publish(&[anomaly("shop", "api-0")]);
    assert!(!path.exists());
    assert!(publisher.write(&[]).is_err());
}
