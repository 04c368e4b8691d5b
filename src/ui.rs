use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

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

/// Shorten a one-line message for display, keeping the start
pub fn truncate(msg: &str, max_chars: usize) -> String {
    let line = msg.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars && line.len() == msg.len() {
        return line.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let kept: String = line.chars().take(max_chars - 3).collect();
    format!("{kept}...")
}
