use kube::core::CustomResourceExt;
use o2ims_models::crd::O2ims;

fn main() -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&O2ims::crd())?;
    println!("{}", yaml);
    Ok(())
}
