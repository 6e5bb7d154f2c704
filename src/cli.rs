use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use reconcile::ErrorPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(version)]
#[command(about = "Converge network resources to a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/converge/config.toml)
    #[arg(long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the operations needed to converge the device
    Plan(PlanArgs),

    /// Apply a descriptor to the device
    Apply(ApplyArgs),

    /// Show the device's current resources of a kind
    Observe(ObserveArgs),

    /// Check a descriptor without touching any device
    Validate(ValidateArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared arguments
// ============================================================================

#[derive(Args, Clone)]
pub struct TargetArgs {
    /// Descriptor file (TOML, or JSON by extension)
    pub descriptor: PathBuf,

    /// Device state file
    #[arg(short, long, env = "CONVERGE_DEVICE")]
    pub device: PathBuf,

    /// Delete resources not declared in the descriptor (overrides `purge`)
    #[arg(long)]
    pub purge: bool,

    /// Only touch these keys (wildcards: * and ?)
    #[arg(short, long = "limit", value_name = "KEY")]
    pub limits: Vec<String>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored summary
    #[default]
    Text,
    /// Module-style JSON result
    Json,
    /// Device command lines only
    Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicyArg {
    /// Keep going with independent resources
    Isolate,
    /// Stop at the first error
    FailFast,
}

impl From<ErrorPolicyArg> for ErrorPolicy {
    fn from(arg: ErrorPolicyArg) -> Self {
        match arg {
            ErrorPolicyArg::Isolate => Self::Isolate,
            ErrorPolicyArg::FailFast => Self::FailFast,
        }
    }
}

// ============================================================================
// Subcommands
// ============================================================================

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Preview changes without applying them
    #[arg(long, alias = "dry-run")]
    pub check: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Skip post-apply convergence verification
    #[arg(long)]
    pub no_verify: bool,

    /// What to do after a rejected operation (overrides config)
    #[arg(long, value_enum)]
    pub error_policy: Option<ErrorPolicyArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ObserveArgs {
    /// Resource kind (vlan, vrf, l3_interface)
    pub kind: String,

    /// Device state file
    #[arg(short, long, env = "CONVERGE_DEVICE")]
    pub device: PathBuf,

    /// Only show these keys
    #[arg(short, long = "key", value_name = "KEY")]
    pub keys: Vec<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Descriptor files to check
    #[arg(required = true)]
    pub descriptors: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "converge",
            "-vv",
            "apply",
            "vlans.toml",
            "--device",
            "switch.json",
            "--check",
            "--purge",
            "--limit",
            "10*",
            "-l",
            "20",
            "--error-policy",
            "fail-fast",
            "--format",
            "commands",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.check);
        assert!(args.target.purge);
        assert_eq!(args.target.limits, vec!["10*", "20"]);
        assert!(args.error_policy == Some(ErrorPolicyArg::FailFast));
        assert!(args.format == OutputFormat::Commands);
        assert!(!args.yes);
    }

    #[test]
    fn test_validate_requires_descriptor() {
        assert!(Cli::try_parse_from(["converge", "validate"]).is_err());
    }
}
