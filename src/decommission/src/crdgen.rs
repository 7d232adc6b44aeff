use decommission::model::{Application, Release};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Release::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&Application::crd())?);
    Ok(())
}
