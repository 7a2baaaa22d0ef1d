//! Validate command

use clap::Args;
use deckhand_workload::WorkloadSpec;

use super::InputArgs;
use crate::Result;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Resolve the variables and print a summary. Failures are reported by the caller.
pub fn run(args: ValidateArgs) -> Result<()> {
    let spec = args.input.resolve()?;
    println!("{}: {}", args.input.vars.display(), summary(&spec));
    Ok(())
}

/// One-line description of a resolved workload
pub fn summary(spec: &WorkloadSpec) -> String {
    let hpa = &spec.autoscaling;
    let autoscaling = match (hpa.enabled, hpa.min_replicas, hpa.max_replicas) {
        (true, Some(min), Some(max)) => format!("autoscaling {}-{}", min, max),
        (true, _, _) => "autoscaling enabled".to_string(),
        (false, _, _) => "autoscaling disabled".to_string(),
    };
    format!(
        "valid ({}/{}): {} container(s), {} port(s), {} ingress route(s), {}",
        spec.namespace,
        spec.name,
        spec.containers.len(),
        spec.ports().count(),
        spec.ingress_routes().count(),
        autoscaling
    )
}
