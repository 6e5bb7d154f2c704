use anyhow::Result;
use colored::Colorize;
use reconcile::{ObservedResource, ResourceKind, Scope, StateObserver};

use crate::Context;
use crate::cli::ObserveArgs;
use crate::config::Config;
use crate::device::FileDevice;
use crate::resource;
use crate::ui;

pub fn run(ctx: &Context, config: &Config, args: &ObserveArgs) -> Result<()> {
    let kind = resource::lookup(&args.kind, config)?;
    let device = FileDevice::open(&args.device, kind.as_ref())?;

    let scope = if args.keys.is_empty() {
        Scope::All
    } else {
        Scope::keys(
            args.keys
                .iter()
                .map(|raw| kind.canonical_key(raw))
                .collect::<reconcile::Result<Vec<_>>>()?,
        )
    };
    let observed = device.observe(&scope)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&observed)?);
        return Ok(());
    }

    if ctx.quiet {
        return Ok(());
    }

    ui::header(&format!("{} on {}", kind.name(), args.device.display()));
    let ports = device.state().ports.len();
    if ports > 0 {
        ui::dim(&format!("{ports} port(s) in inventory"));
    }
    if observed.is_empty() {
        ui::dim("(none)");
        return Ok(());
    }
    for resource in &observed {
        print_resource(kind.as_ref(), resource);
    }
    Ok(())
}

fn print_resource(kind: &dyn ResourceKind, resource: &ObservedResource) {
    println!();
    println!("{} {}", kind.key_field().dimmed(), resource.key.to_string().bold());
    for (name, value) in &resource.attributes {
        let shown = value
            .as_set()
            .map_or_else(|| "(unset)".dimmed().to_string(), |v| format!("{v:?}"));
        ui::kv(name, &shown);
    }
    if let Some(field) = kind.association_field() {
        let members: Vec<&str> = resource.associations.iter().map(String::as_str).collect();
        ui::kv(field, &members.join(", "));
    }
}
