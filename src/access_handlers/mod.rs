pub mod kube;
pub mod vault;
