//! Text output formatting with colors.

use bagwatch_core::Targets;
use bagwatch_market::{MatchReport, Order};
use bagwatch_watch::WatchStatus;

use super::UserRow;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn flag(&self, on: bool, yes: &str, no: &str) -> String {
        if on {
            self.paint(GREEN, yes)
        } else {
            self.paint(DIM, no)
        }
    }

    /// Formats a dry-run match report.
    pub fn format_report(&self, report: &MatchReport) -> String {
        if report.matches.is_empty() {
            return self.paint(DIM, "No matches right now.");
        }
        let mut lines = vec![self.paint(BOLD, &format!("{} match(es)", report.matches.len()))];
        for m in &report.matches {
            let available = if m.available == 0 {
                self.paint(RED, "sold out")
            } else {
                self.paint(GREEN, &format!("available: {}", m.available))
            };
            let mut line = format!("  {} ({available}, want {})", m.display_name, m.quantity);
            if let Some(price) = &m.price {
                line.push_str(&format!(" · {price}"));
            }
            if let Some(window) = m.pickup_window() {
                line.push_str(&format!(" · pickup {window}"));
            }
            lines.push(line);
            lines.push(self.paint(DIM, &format!("    id {}", m.item_id)));
        }
        lines.join("\n")
    }

    /// Formats the target list.
    pub fn format_targets(&self, targets: &Targets) -> String {
        if targets.is_empty() {
            return self.paint(DIM, "No targets. Add one with `bagwatch target add <item_id>`.");
        }
        targets
            .iter()
            .map(|t| {
                format!(
                    "  {:<12} x{:<3} {}",
                    self.paint(BOLD, &t.item_id),
                    t.quantity,
                    t.display_name
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Formats the user's status.
    pub fn format_status(&self, status: &WatchStatus, email: Option<&str>) -> String {
        let mut lines = vec![
            self.paint(BOLD, &format!("User {}", status.user_id)),
            "─".repeat(40),
            format!("Email:      {}", email.unwrap_or("-")),
            format!("Session:    {}", status.auth_state),
            format!("Watching:   {}", self.flag(status.watching, "yes", "no")),
            format!("Interval:   {:.1}s", status.interval.as_secs_f64()),
            format!("Targets:    {}", status.targets),
            format!(
                "Requests:   {} since refresh, {} failed in a row",
                status.counters.requests_since_refresh, status.counters.consecutive_failures
            ),
        ];
        if let Some(url) = &status.held_on {
            lines.push(self.paint(YELLOW, &format!("Held on challenge: {url}")));
        }
        lines.join("\n")
    }

    /// Formats active orders.
    pub fn format_orders(&self, orders: &[Order]) -> String {
        if orders.is_empty() {
            return self.paint(DIM, "No active orders.");
        }
        orders
            .iter()
            .map(|o| {
                format!(
                    "  {} x{} {} {}",
                    self.paint(BOLD, &o.order_id),
                    o.quantity,
                    o.store_name.as_deref().unwrap_or("?"),
                    self.paint(DIM, o.state.as_deref().unwrap_or(""))
                )
                .trim_end()
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Formats the user list.
    pub fn format_users(&self, users: &[UserRow]) -> String {
        if users.is_empty() {
            return self.paint(DIM, "No users yet. Start with `bagwatch --user <id> set-email <email>`.");
        }
        users
            .iter()
            .map(|u| {
                format!(
                    "  {:<16} {:<10} {:<12} {} target(s)",
                    u.user_id,
                    self.flag(u.logged_in, "logged in", "logged out"),
                    self.flag(u.watching, "watching", "idle"),
                    u.targets
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
