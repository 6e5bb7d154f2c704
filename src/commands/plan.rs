use anyhow::Result;
use reconcile::{AutoDecline, ErrorPolicy, ExecuteOptions, NoProgress, execute};

use super::{KeyFilter, Prepared, display_plan};
use crate::Context;
use crate::cli::{OutputFormat, PlanArgs};
use crate::config::Config;
use crate::device::FileDevice;
use crate::report::{self, RunResult};

pub fn run(ctx: &Context, config: &Config, args: &PlanArgs) -> Result<()> {
    let prepared = Prepared::load(config, &args.target)?;
    let kind = prepared.kind.as_ref();
    let mut device = FileDevice::open(&args.target.device, kind)?;
    let filter = KeyFilter::new(&args.target.limits)?;

    let plan = prepared.plan(&device, &filter)?;

    match args.format {
        OutputFormat::Text => {
            if !ctx.quiet {
                display_plan(kind, &plan, ctx.verbose > 0);
            }
        }
        OutputFormat::Commands => {
            for line in report::commands(kind, plan.operations()) {
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            // Check mode never reaches the device, so this only shapes the result
            let options = ExecuteOptions {
                dry_run: true,
                error_policy: ErrorPolicy::default(),
            };
            let preview = execute(&plan, &options, &mut device, &mut NoProgress, &mut AutoDecline)?;
            println!(
                "{}",
                RunResult::from_report(kind, plan.summary(), &preview).to_json()?
            );
        }
    }
    Ok(())
}
