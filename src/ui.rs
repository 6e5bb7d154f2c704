use colored::{ColoredString, Colorize};
use reconcile::{Operation, OperationKind, ResourceKind};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Operations
// ============================================================================

/// Symbol for an operation: + create/add, ~ update, - delete/remove
pub fn symbol(operation: &Operation) -> ColoredString {
    match operation.kind {
        OperationKind::CreateResource { .. } | OperationKind::AddAssociation { .. } => "+".green(),
        OperationKind::SetAttribute { .. } => "~".yellow(),
        OperationKind::DeleteResource | OperationKind::RemoveAssociation { .. } => "-".red(),
    }
}

/// One-line description of an operation without the resource key
pub fn describe(operation: &Operation) -> String {
    match &operation.kind {
        OperationKind::CreateResource { attributes } => {
            let pairs: Vec<String> = attributes
                .iter()
                .map(|(k, v)| format!("{k}={v:?}"))
                .collect();
            if pairs.is_empty() {
                "create".to_string()
            } else {
                format!("create ({})", pairs.join(", "))
            }
        }
        OperationKind::DeleteResource => "delete".to_string(),
        OperationKind::SetAttribute { name, value } => format!("{name} → {value:?}"),
        OperationKind::AddAssociation { member } => format!("add {member}"),
        OperationKind::RemoveAssociation { member } => format!("remove {member}"),
    }
}

/// Print an operation line of a plan box, optionally with its device commands
pub fn operation(kind: &dyn ResourceKind, operation: &Operation, show_commands: bool) {
    println!("│   {} {}", symbol(operation), describe(operation));
    if show_commands {
        for line in kind.render(operation) {
            println!("│       {}", line.dimmed());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
