#[cfg(test)]
mod tests {
    use crate::api::v1::rosacluster::{RosaCluster, RosaClusterSpec, StsSpec};
    use crate::controllers::State;
    use crate::ocm::OcmClient;
    use crate::util::config::OperatorConfig;
    use kube::api::{Api, ObjectMeta, Patch, PatchParams};
    use kube::Client;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[tokio::test]
    #[ignore = "uses k8s current-context and a live OCM token"]
    async fn integration_reconcile_should_set_status() {
        let client = Client::try_default().await.unwrap();
        let config = OperatorConfig::from_env().unwrap();
        let ocm = Arc::new(OcmClient::new(&config.ocm_url, &config.ocm_token));
        let ctx = State::default().to_context(client.clone(), ocm, config).unwrap();

        let rosa_cluster = RosaCluster {
            metadata: ObjectMeta {
                name: Some("test-cluster".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: RosaClusterSpec {
                name: "test-cluster".to_string(),
                cloud_region: "us-east-1".to_string(),
                aws_account_id: "123456789012".to_string(),
                properties: Some(BTreeMap::from([(
                    "rosa_creator_arn".to_string(),
                    "arn:aws:iam::123456789012:user/ci".to_string(),
                )])),
                sts: Some(StsSpec::default()),
                ..Default::default()
            },
            status: None,
        };

        let clusters: Api<RosaCluster> = Api::namespaced(client.clone(), "default");
        let ssapply = PatchParams::apply("ctrltest").force();
        let patch = Patch::Apply(&rosa_cluster);
        clusters.patch("test-cluster", &ssapply, &patch).await.unwrap();

        let stored = clusters.get("test-cluster").await.unwrap();
        stored.reconcile(ctx).await.unwrap();

        let output = clusters.get("test-cluster").await.unwrap();
        assert!(output.status.is_some());
    }
}
