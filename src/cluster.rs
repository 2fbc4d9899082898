// System
use std::{future::Future, path::PathBuf};

// Third Party
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Event;
use kube::{
    api::{Api, WatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tracing::info;

// Local
use crate::{
    config::{AuthMode, AuthSettings, WatchOptions},
    error::Error,
    notification::Notification,
    watcher::EventSource,
};

/// Resource version meaning "start from whatever the API server has cached".
const ANY_RESOURCE_VERSION: &str = "0";

/// Build an authenticated client for the configured auth mode.
pub async fn connect(auth: &AuthSettings) -> Result<Client, Error> {
    let config = match auth.mode {
        AuthMode::InCluster => {
            info!("Logbook will start in in-cluster mode.");
            Config::incluster().map_err(Error::InCluster)?
        }
        AuthMode::OutOfCluster => {
            info!("Logbook will start in out-of-cluster mode.");
            let path = match &auth.kubeconfig {
                Some(path) => path.clone(),
                None => {
                    info!("kubeconfig not provided. Will use kubeconfig file in default path.");
                    default_kubeconfig_path().ok_or(Error::NoHomeDir)?
                }
            };
            let kubeconfig = Kubeconfig::read_from(&path).map_err(|source| Error::Kubeconfig {
                path: path.clone(),
                source,
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|source| Error::Kubeconfig { path, source })?
        }
    };
    Client::try_from(config).map_err(Error::Client)
}

/// `$HOME/.kube/config`
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

pub fn watch_params(options: &WatchOptions) -> WatchParams {
    let mut params = WatchParams::default().timeout(options.timeout_seconds);
    if let Some(labels) = &options.label_selector {
        params = params.labels(labels);
    }
    if let Some(fields) = &options.field_selector {
        params = params.fields(fields);
    }
    params
}

/// Core v1 events of a live cluster.
pub struct ClusterEvents {
    client: Client,
}

impl ClusterEvents {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
        }
    }

    fn api(&self, namespace: &str) -> Api<Event> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

impl EventSource for ClusterEvents {
    type Subscription = BoxStream<'static, Result<Notification, kube::Error>>;

    fn subscribe(
        &self,
        namespace: &str,
        options: &WatchOptions,
    ) -> impl Future<Output = Result<Self::Subscription, kube::Error>> + Send {
        let events = self.api(namespace);
        let params = watch_params(options);
        async move {
            let stream = events.watch(&params, ANY_RESOURCE_VERSION).await?;
            Ok(stream.map_ok(Notification::from).boxed())
        }
    }
}
