use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser, Debug)]
/// Bootstrap manager for homelab Kubernetes clusters: stands up a local
/// cluster and wires in add-ons and generated credentials.
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter homestead.yaml into the current directory.
    Init {
        #[arg(long, help = "Overwrite an existing homestead.yaml")]
        force: bool,
    },

    /// Validate contents of homestead.yaml.
    Validate, // no args

    /// Provision the local cluster (if needed), then deploy all enabled
    /// add-ons and route configured credentials.
    Up {
        #[arg(long, help = "Skip cluster provisioning, only deploy add-ons")]
        no_cluster: bool,
    },

    /// Tear down the local cluster.
    Destroy {
        #[arg(short, long, help = "Do not ask for confirmation")]
        yes: bool,
    },

    /// Checks access to the cluster and the configured secret backend.
    CheckAccess {
        #[arg(short, long, help = "Check Kubernetes cluster access")]
        kubernetes: bool,

        #[arg(short, long, help = "Check Bitwarden vault access")]
        vault: bool,
    },
}
