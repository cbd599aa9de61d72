//! # CRD Generator
//!
//! Prints the CustomResourceDefinition YAML of the controller's resources.
//!
//! ```bash
//! cargo run --bin crdgen -- --kind all > config/crd/all.yaml
//! cargo run --bin crdgen -- --kind yurtingress | kubectl apply -f -
//! ```

use clap::{Parser, ValueEnum};
use kube::core::CustomResourceExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use nodepool_ingress_controller::crd::{NodePool, NodePoolIngress, YurtIngress};

#[derive(Parser)]
#[command(name = "crdgen", about = "Print CRD YAML for the ingress controller resources")]
struct Cli {
    /// Which CRD to print
    #[arg(long, value_enum, default_value_t = Kind::All)]
    kind: Kind,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Yurtingress,
    Nodepoolingress,
    Nodepool,
    All,
}

fn crds(kind: Kind) -> Vec<CustomResourceDefinition> {
    match kind {
        Kind::Yurtingress => vec![YurtIngress::crd()],
        Kind::Nodepoolingress => vec![NodePoolIngress::crd()],
        Kind::Nodepool => vec![NodePool::crd()],
        Kind::All => vec![YurtIngress::crd(), NodePoolIngress::crd(), NodePool::crd()],
    }
}

fn main() {
    let cli = Cli::parse();

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    for crd in crds(cli.kind) {
        match serde_yaml::to_string(&crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
