//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use chrono::{DateTime, NaiveDateTime, Utc};
use colored::{ColoredString, Colorize};

use crate::engine::lifecycle::AppointmentStatus;
use crate::engine::rbac::Role;

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// Print a table with columns padded to their widest cell
    pub fn table(columns: &[&str], rows: &[Vec<String>]) {
        let widths = column_widths(columns, rows);

        let header = columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = w).bright_white().bold().to_string())
            .collect::<Vec<_>>()
            .join(" │ ");
        println!("  {}", header);
        let rule_len = widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1);
        println!("  {}", "─".repeat(rule_len).bright_black());

        for row in rows {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<w$}", v, w = w))
                .collect::<Vec<_>>()
                .join(" │ ");
            println!("  {}", line);
        }
    }

    /// Print a divider
    pub fn divider() {
        println!("{}", "─".repeat(60).bright_black());
    }

    /// Print an empty line
    pub fn blank() {
        println!();
    }
}

fn column_widths(columns: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|v| v.chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

pub fn status_badge(status: AppointmentStatus) -> ColoredString {
    match status {
        AppointmentStatus::Pending => status.as_str().yellow(),
        AppointmentStatus::Confirmed => status.as_str().green(),
        AppointmentStatus::Completed => status.as_str().blue(),
        AppointmentStatus::Cancelled => status.as_str().red(),
    }
}

pub fn role_badge(role: Role) -> ColoredString {
    match role {
        Role::Admin => role.as_str().magenta().bold(),
        Role::Doctor => role.as_str().cyan(),
        Role::Patient => role.as_str().normal(),
    }
}

/// `2025-06-01 10:00`
pub fn format_appointment_date(date: &NaiveDateTime) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn test_column_widths() {
        let rows = vec![
            vec!["1".to_string(), "Dr Longname".to_string()],
            vec!["12".to_string(), "Bo".to_string()],
        ];
        assert_eq!(column_widths(&["ID", "Name"], &rows), vec![2, 11]);
        assert_eq!(column_widths(&["Status"], &[]), vec![6]);
    }

    #[test]
    fn test_date_formats() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(format_appointment_date(&date), "2025-06-01 10:00");
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&ts), "2025-01-02 03:04 UTC");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("")), "-");
        assert_eq!(or_dash(Some("555")), "555");
    }
}
