//! Apply a descriptor: plan, confirm, execute, verify

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{
    AutoConfirm, ConfirmCallback, DesiredResource, Error, ExecuteOptions, ExecutionReport,
    NoProgress, Plan, PlanSummary, PurgePolicy, ResourceKey, StateObserver, Verified,
    VerifyOptions, execute, verify,
};
use std::collections::BTreeSet;

use super::{KeyFilter, Prepared, display_plan, summary_line};
use crate::Context;
use crate::cli::{ApplyArgs, OutputFormat};
use crate::config::Config;
use crate::device::FileDevice;
use crate::progress::{BarProgress, PromptConfirm};
use crate::report::{RunResult, commands};
use crate::ui;

pub fn run(ctx: &Context, config: &Config, args: &ApplyArgs) -> Result<()> {
    let prepared = Prepared::load(config, &args.target)?;
    let kind = prepared.kind.as_ref();
    let mut device = FileDevice::open(&args.target.device, kind)?;
    let filter = KeyFilter::new(&args.target.limits)?;

    let plan = prepared.plan(&device, &filter)?;
    let summary = plan.summary();
    let interactive = args.format == OutputFormat::Text && !ctx.quiet;

    if interactive {
        display_plan(kind, &plan, ctx.verbose > 0);
    } else if !args.yes && !args.check && !plan.is_empty() {
        bail!("Refusing to prompt for a plan that was not shown; pass --yes to apply it");
    }

    let options = ExecuteOptions {
        dry_run: args.check,
        error_policy: args
            .error_policy
            .map_or(config.execution.error_policy, Into::into),
    };

    let mut report = if args.yes {
        run_plan(&plan, &options, &mut device, interactive, &mut AutoConfirm)?
    } else {
        run_plan(&plan, &options, &mut device, interactive, &mut PromptConfirm)?
    };

    let mut verified = None;
    if report.changed && !args.check && !args.no_verify && config.verify.enabled {
        let (want, purge) = verification_scope(&prepared, &filter, &report);
        if interactive {
            println!();
            println!("  {} Verifying convergence...", "→".cyan());
        }
        verified = verify_applied(
            &want,
            &purge,
            &device,
            &config.verify.options(),
            &mut report,
        )?;
    }

    match args.format {
        OutputFormat::Text => {
            if !ctx.quiet {
                print_outcome(&report, &summary, verified.as_ref());
            }
        }
        OutputFormat::Commands => {
            for line in commands(kind, &report.applied) {
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            let mut result = RunResult::from_report(kind, summary, &report);
            result.verify_attempts = verified.map(|v| v.attempts);
            println!("{}", result.to_json()?);
        }
    }

    if !report.is_success() {
        bail!("{} resource(s) failed to converge", report.errors.len());
    }
    Ok(())
}

fn run_plan<C: ConfirmCallback>(
    plan: &Plan,
    options: &ExecuteOptions,
    device: &mut FileDevice<'_>,
    interactive: bool,
    confirm: &mut C,
) -> Result<ExecutionReport> {
    let report = if interactive && !options.dry_run {
        execute(plan, options, device, &mut BarProgress::new(), confirm)?
    } else {
        execute(plan, options, device, &mut NoProgress, confirm)?
    };
    Ok(report)
}

/// Desired resources and purge policy the device is held to after a run
///
/// Resources outside `--limit`, or with a failed or skipped operation, were
/// not fully applied and are left out. Purge is only checked when the whole
/// plan ran to completion.
fn verification_scope(
    prepared: &Prepared,
    filter: &KeyFilter,
    report: &ExecutionReport,
) -> (Vec<DesiredResource>, PurgePolicy) {
    let unfinished: BTreeSet<&ResourceKey> = report
        .errors
        .keys()
        .chain(report.skipped.iter().map(|op| &op.key))
        .collect();

    let want = filter
        .select(&prepared.desired.resources)
        .into_iter()
        .filter(|r| !unfinished.contains(&r.key))
        .collect();
    let purge = if filter.is_empty() && unfinished.is_empty() {
        prepared.purge.clone()
    } else {
        PurgePolicy::disabled()
    };
    (want, purge)
}

/// Wait for the device to reflect the run; a timeout becomes a report warning
fn verify_applied(
    want: &[DesiredResource],
    purge: &PurgePolicy,
    observer: &dyn StateObserver,
    options: &VerifyOptions,
    report: &mut ExecutionReport,
) -> Result<Option<Verified>> {
    if want.is_empty() && !purge.is_enabled() {
        log::debug!("Nothing left to verify");
        return Ok(None);
    }

    match verify(want, purge, observer, options) {
        Ok(outcome) => Ok(Some(outcome)),
        Err(e @ Error::ConvergenceTimeout { .. }) => {
            log::warn!("{e}");
            report.warnings.push(e.to_string());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_outcome(
    report: &ExecutionReport,
    summary: &PlanSummary,
    verified: Option<&Verified>,
) {
    println!();
    if !summary.has_changes() {
        return;
    }
    if report.dry_run {
        println!("  {} Check mode - no changes made", "ℹ".blue());
        return;
    }
    if !report.changed && report.errors.is_empty() {
        println!("  {} Aborted", "✗".red());
        return;
    }

    if report.is_success() {
        println!("  {} Changes applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Changes applied with errors", "⚠".yellow().bold());
    }
    println!("    • planned: {}", summary_line(summary));
    println!("    • {} operation(s) applied", report.applied.len());
    if !report.skipped.is_empty() {
        println!("    • {} operation(s) skipped", report.skipped.len());
    }
    for (key, id) in &report.assigned_ids {
        ui::dim(&format!("{key} created as {id}"));
    }
    for (key, error) in &report.errors {
        println!(
            "    • {} {}: {}",
            key.to_string().red(),
            error.kind.description(),
            error.message
        );
    }
    for warning in &report.warnings {
        ui::warn(warning);
    }
    if let Some(outcome) = verified {
        ui::success(&format!(
            "Converged after {} observation(s) in {:.1}s",
            outcome.attempts,
            outcome.elapsed.as_secs_f64()
        ));
    }
}

// ============================================================================
// Tests
// ============================================================================
