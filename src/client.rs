//! Kubernetes client construction.

use crate::error::Result;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use log::debug;

/// Connect using the inferred config, or the named kubeconfig context.
pub async fn connect(context: Option<&str>) -> Result<Client> {
    // Required for TLS connections to the API server
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match context {
        Some(context) => {
            debug!("Using kubeconfig context {}", context);
            let kubeconfig = Kubeconfig::read()?;
            Config::from_custom_kubeconfig(
                kubeconfig,
                &KubeConfigOptions {
                    context: Some(context.to_string()),
                    ..Default::default()
                },
            )
            .await?
        }
        None => Config::infer().await?,
    };
    Ok(Client::try_from(config)?)
}
