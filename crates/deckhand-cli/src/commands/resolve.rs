//! Resolve command

use clap::Args;

use super::{render, InputArgs, OutputFormat};
use crate::Result;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,
}

pub fn run(args: ResolveArgs) -> Result<()> {
    let spec = args.input.resolve()?;
    println!("{}", render(&spec, args.output)?);
    Ok(())
}
