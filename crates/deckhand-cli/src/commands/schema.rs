//! Schema command

use deckhand_workload::WorkloadSpec;

use crate::Result;

pub fn run() -> Result<()> {
    let schema = schemars::schema_for!(WorkloadSpec);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
