use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, PostParams};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::info;

use crate::api::v1::rosacluster::RosaCluster;
use crate::cluster::builder::AdminCredentials;
use crate::util::errors::{Error, Result, StdError};

pub const ADMIN_SECRET_COMPONENT: &str = "admin-credentials";
const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

pub fn admin_secret_name(cluster: &RosaCluster) -> String {
    format!("{}-{ADMIN_SECRET_COMPONENT}", cluster.name_any())
}

pub fn credentials_from_secret(secret: &Secret) -> Option<AdminCredentials> {
    let data = secret.data.as_ref()?;
    let read = |key: &str| {
        data.get(key)
            .and_then(|v| String::from_utf8(v.0.clone()).ok())
            .filter(|v| !v.is_empty())
    };
    Some(AdminCredentials {
        username: read(USERNAME_KEY)?,
        password: read(PASSWORD_KEY)?,
    })
}

pub fn admin_secret(cluster: &RosaCluster, namespace: &str, credentials: &AdminCredentials) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(admin_secret_name(cluster)),
            namespace: Some(namespace.to_string()),
            owner_references: cluster.controller_owner_ref(&()).map(|owner_ref| vec![owner_ref]),
            labels: Some(BTreeMap::from([
                ("app.kubernetes.io/name".to_string(), "rosa-operator".to_string()),
                ("app.kubernetes.io/component".to_string(), ADMIN_SECRET_COMPONENT.to_string()),
                ("rosa.cluster.name".to_string(), cluster.name_any()),
            ])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            (USERNAME_KEY.to_string(), ByteString(credentials.username.clone().into_bytes())),
            (PASSWORD_KEY.to_string(), ByteString(credentials.password.clone().into_bytes())),
        ])),
        ..Default::default()
    }
}

fn secrets_api(client: &kube::Client, cluster: &RosaCluster) -> Result<(Api<Secret>, String)> {
    let namespace = cluster
        .namespace()
        .ok_or_else(|| Error::StdError(StdError::MetadataMissing("namespace".to_string())))?;
    Ok((Api::namespaced(client.clone(), &namespace), namespace))
}

/// Credentials kept from an earlier attempt, if any.
pub async fn load_admin_credentials(client: &kube::Client, cluster: &RosaCluster) -> Result<Option<AdminCredentials>> {
    let (secrets, _) = secrets_api(client, cluster)?;
    let secret = secrets.get_opt(&admin_secret_name(cluster)).await.map_err(Error::kube)?;
    Ok(secret.as_ref().and_then(credentials_from_secret))
}

pub async fn store_admin_credentials(
    client: &kube::Client,
    cluster: &RosaCluster,
    credentials: &AdminCredentials,
) -> Result<()> {
    let (secrets, namespace) = secrets_api(client, cluster)?;
    let secret = admin_secret(cluster, &namespace, credentials);
    match secrets.create(&PostParams::default(), &secret).await {
        Ok(_) => {}
        Err(kube::Error::Api(err)) if err.code == 409 => {
            secrets
                .replace(&admin_secret_name(cluster), &PostParams::default(), &secret)
                .await
                .map_err(Error::kube)?;
        }
        Err(e) => return Err(Error::kube(e)),
    }
    info!("Stored admin credentials in secret {}", admin_secret_name(cluster));
    Ok(())
}
