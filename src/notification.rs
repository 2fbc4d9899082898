// Third Party
use k8s_openapi::api::core::v1::Event;
use kube::{api::WatchEvent, error::ErrorResponse};
use serde::Serialize;

/// A single change delivered by the event watch, in the Kubernetes watch wire shape:
/// `{"type":"MODIFIED","object":{...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum Notification {
    Added(Event),
    Modified(Event),
    Deleted(Event),
    /// Only the resource version is kept, bookmarks are never written.
    Bookmark(String),
    /// A status reported by the API server in place of an object.
    Error(ErrorResponse),
}

impl Notification {
    /// Whether this notification becomes a log record. Deletions and bookmarks are skipped.
    pub fn is_recorded(&self) -> bool {
        matches!(
            self,
            Notification::Added(_) | Notification::Modified(_) | Notification::Error(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Added(_) => "ADDED",
            Notification::Modified(_) => "MODIFIED",
            Notification::Deleted(_) => "DELETED",
            Notification::Bookmark(_) => "BOOKMARK",
            Notification::Error(_) => "ERROR",
        }
    }

    /// Compact JSON of the whole notification. Every populated field of the event is kept, and
    /// maps are ordered, so the same notification always encodes to the same bytes.
    pub fn to_record(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl From<WatchEvent<Event>> for Notification {
    fn from(event: WatchEvent<Event>) -> Self {
        match event {
            WatchEvent::Added(event) => Notification::Added(event),
            WatchEvent::Modified(event) => Notification::Modified(event),
            WatchEvent::Deleted(event) => Notification::Deleted(event),
            WatchEvent::Bookmark(bookmark) => {
                Notification::Bookmark(bookmark.metadata.resource_version)
            }
            WatchEvent::Error(status) => Notification::Error(status),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    // System
    use std::collections::BTreeMap;

    // Third Party
    use k8s_openapi::{
        api::core::v1::{Event, EventSource, ObjectReference},
        apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time},
        chrono::{TimeZone, Utc},
    };
    use kube::{api::WatchEvent, error::ErrorResponse};

    // Local
    use super::Notification;

    /// An event as the API server reports it for a scheduled pod.
    pub(crate) fn pod_event(namespace: &str, pod: &str, reason: &str) -> Event {
        let mut labels = BTreeMap::new();
        labels.insert("team".to_string(), "platform".to_string());
        labels.insert("app".to_string(), "nginx".to_string());
        Event {
            metadata: ObjectMeta {
                name: Some(format!("{}.17a3c5f0e1d2b4a9", pod)),
                namespace: Some(namespace.to_string()),
                resource_version: Some("4242".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: Some("Pod".to_string()),
                name: Some(pod.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            reason: Some(reason.to_string()),
            message: Some(format!("Successfully assigned {}/{} to node-1", namespace, pod)),
            source: Some(EventSource {
                component: Some("default-scheduler".to_string()),
                ..Default::default()
            }),
            first_timestamp: Some(Time(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())),
            count: Some(1),
            type_: Some("Normal".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_modified_record_shape() {
        let notification = Notification::Modified(pod_event("kube-system", "nginx-1", "Scheduled"));
        let record = String::from_utf8(notification.to_record().unwrap()).unwrap();

        assert!(!record.contains('\n'));
        assert!(record.starts_with(r#"{"type":"MODIFIED","object":{"#));
        assert!(record.contains(r#""name":"nginx-1""#));
        assert!(record.contains(r#""reason":"Scheduled""#));

        let value: serde_json::Value = serde_json::from_str(&record).unwrap();
        let object = &value["object"];
        assert_eq!(object["kind"], "Event");
        assert_eq!(object["involvedObject"]["kind"], "Pod");
        assert_eq!(object["source"]["component"], "default-scheduler");
        assert_eq!(object["firstTimestamp"], "2024-03-01T12:00:00Z");
        assert_eq!(object["count"], 1);
        assert_eq!(object["metadata"]["labels"]["team"], "platform");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let notification = Notification::Added(pod_event("default", "web-0", "Pulled"));
        let first = notification.to_record().unwrap();
        let second = notification.clone().to_record().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_error_record_carries_status() {
        let notification = Notification::Error(ErrorResponse {
            status: "Failure".to_string(),
            message: "too old resource version: 1 (4242)".to_string(),
            reason: "Expired".to_string(),
            code: 410,
        });
        let value: serde_json::Value =
            serde_json::from_slice(&notification.to_record().unwrap()).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["object"]["code"], 410);
        assert_eq!(value["object"]["reason"], "Expired");
    }

    #[test]
    fn test_only_added_modified_and_error_are_recorded() {
        let event = pod_event("default", "web-0", "Killing");
        assert!(Notification::Added(event.clone()).is_recorded());
        assert!(Notification::Modified(event.clone()).is_recorded());
        assert!(!Notification::Deleted(event).is_recorded());
        assert!(!Notification::Bookmark("4242".to_string()).is_recorded());
    }

    #[test]
    fn test_from_watch_event() {
        let event = pod_event("default", "web-0", "Created");
        let notification = Notification::from(WatchEvent::Modified(event));
        assert_eq!(notification.kind(), "MODIFIED");
        let notification = Notification::from(WatchEvent::<Event>::Deleted(Event::default()));
        assert_eq!(notification.kind(), "DELETED");
    }
}
