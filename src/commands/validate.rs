use anyhow::{Result, bail};
use reconcile::{Document, PurgePolicy};
use std::path::Path;

use crate::Context;
use crate::cli::ValidateArgs;
use crate::config::Config;
use crate::resource;
use crate::ui;

/// Check every descriptor, reporting all problems before failing
pub fn run(ctx: &Context, config: &Config, args: &ValidateArgs) -> Result<()> {
    let mut failures = 0;
    for path in &args.descriptors {
        match check(config, path) {
            Ok(message) => {
                if !ctx.quiet {
                    ui::success(&format!("{}: {message}", path.display()));
                }
            }
            Err(e) => {
                failures += 1;
                ui::error(&format!("{}: {e:#}", path.display()));
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} descriptor(s) invalid", args.descriptors.len());
    }
    Ok(())
}

fn check(config: &Config, path: &Path) -> Result<String> {
    let document = Document::load(path)?;
    let kind = resource::lookup(&document.kind, config)?;
    let desired = document.resolve(kind.as_ref())?;
    let purge = PurgePolicy::for_kind(desired.purge, kind.as_ref());

    let absent = desired.resources.iter().filter(|r| !r.is_present()).count();
    let mut message = format!(
        "{} {} resource(s)",
        desired.resources.len(),
        kind.name()
    );
    if absent > 0 {
        message.push_str(&format!(", {absent} absent"));
    }
    if purge.is_enabled() {
        let reserved: Vec<&str> = purge.reserved().collect();
        message.push_str(&format!(", purge (keeps {})", reserved.join(", ")));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check_reports_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vlans.toml");
        fs::write(
            &path,
            r#"
kind = "vlan"
purge = true

[[aggregate]]
vlan_id = 100
name = "users"

[[aggregate]]
vlan_id = 200
state = "absent"
"#,
        )
        .unwrap();

        let message = check(&Config::default(), &path).unwrap();
        assert_eq!(message, "2 vlan resource(s), 1 absent, purge (keeps 1)");
    }

    #[test]
    fn test_check_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vrf.json");
        fs::write(
            &path,
            r#"{ "kind": "vrf", "resource": { "name": "default" } }"#,
        )
        .unwrap();

        let err = check(&Config::default(), &path).unwrap_err();
        assert!(err.to_string().contains("cannot use default"));
    }

    #[test]
    fn test_check_rejects_unknown_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bgp.toml");
        fs::write(&path, "kind = \"bgp\"\n[resource]\nasn = 65000\n").unwrap();

        assert!(check(&Config::default(), &path).is_err());
    }
}
