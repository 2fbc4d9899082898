// System
use std::future::Future;

// Third Party
use futures::{pin_mut, Stream, StreamExt};
use tracing::{info, trace, warn};

// Local
use crate::{
    app::Outcome, config::WatchOptions, error::Error, notification::Notification,
    sink::RecordSink,
};

/// Something that can open a watch on cluster events.
pub trait EventSource {
    type Subscription: Stream<Item = Result<Notification, kube::Error>> + Send;

    /// Open a single subscription to the events of `namespace` (all namespaces when empty).
    fn subscribe(
        &self,
        namespace: &str,
        options: &WatchOptions,
    ) -> impl Future<Output = Result<Self::Subscription, kube::Error>> + Send;
}

/// Forwards every added, modified and error notification from one event subscription to a
/// [`RecordSink`], one line per notification, in delivery order.
pub struct EventWatcher<S> {
    source: S,
    namespace: String,
    options: WatchOptions,
}

impl<S: EventSource> EventWatcher<S> {
    pub fn new(source: S, namespace: &str, options: &WatchOptions) -> Self {
        Self {
            source,
            namespace: namespace.to_string(),
            options: options.clone(),
        }
    }

    /// Open the subscription and forward notifications until the API server closes it.
    ///
    /// Returns [`Outcome::SubscriptionClosed`] when the stream ends. Failing to open the
    /// subscription, encode a notification, or write a record ends the watch with an error;
    /// nothing is retried.
    pub async fn run<R: RecordSink>(&self, sink: &mut R) -> Result<Outcome, Error> {
        let subscription = self
            .source
            .subscribe(&self.namespace, &self.options)
            .await
            .map_err(Error::Subscribe)?;
        info!(
            namespace = %self.namespace,
            timeout_seconds = self.options.timeout_seconds,
            "Watcher was successfully created. Kubernetes events will be logged from now on."
        );
        pin_mut!(subscription);

        let mut recorded: u64 = 0;
        while let Some(item) = subscription.next().await {
            let notification = match item {
                Ok(notification) => notification,
                // Unknown watch kinds and event payloads that fail to decode both end up here.
                Err(kube::Error::SerdeError(error)) => {
                    warn!(%error, "Unable to decode an event from the watch stream, skipping it");
                    continue;
                }
                Err(error) => {
                    warn!(%error, "Error reading from the event watch");
                    continue;
                }
            };
            if !notification.is_recorded() {
                trace!(kind = notification.kind(), "Skipping notification");
                continue;
            }
            let record = notification.to_record()?;
            sink.write_record(&record).map_err(Error::Write)?;
            recorded += 1;
        }

        warn!(recorded, "Watcher timed out.");
        Ok(Outcome::SubscriptionClosed)
    }
}
