use kube::CustomResourceExt as _;
use rosa_cluster::api::v1::rosacluster::RosaCluster;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&RosaCluster::crd())?);
    Ok(())
}
