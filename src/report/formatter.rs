// Markdown formatting utilities for report rendering

use rust_decimal::Decimal;

/// Build a markdown table from headers and rows
pub fn build_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = String::new();

    // Header row
    table.push_str("| ");
    table.push_str(&headers.join(" | "));
    table.push_str(" |\n");

    // Separator row
    table.push('|');
    for _ in headers {
        table.push_str("--------|");
    }
    table.push('\n');

    for row in rows {
        table.push_str("| ");
        table.push_str(&row.join(" | "));
        table.push_str(" |\n");
    }

    table
}

/// Build a markdown list from items
pub fn build_list(items: &[String], ordered: bool) -> String {
    let mut list = String::new();

    for (i, item) in items.iter().enumerate() {
        if ordered {
            list.push_str(&format!("{}. {}\n", i + 1, item));
        } else {
            list.push_str(&format!("- {}\n", item));
        }
    }

    list
}

/// Build a markdown section header
pub fn build_section_header(title: &str, level: u8) -> String {
    let hashes = "#".repeat(level as usize);
    format!("{} {}\n\n", hashes, title)
}

/// Format a decimal price with space thousand separators
///
/// 65000.5 -> "65 000.5"; the fractional part is kept as published.
pub fn format_price(price: Decimal) -> String {
    let text = price.normalize().to_string();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer_part, fractional_part) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };

    let mut integer_with_separators = String::new();
    let len = integer_part.len();
    for (i, ch) in integer_part.chars().enumerate() {
        integer_with_separators.push(ch);
        // Space every 3 digits from the right
        if (len - i - 1) % 3 == 0 && i < len - 1 {
            integer_with_separators.push(' ');
        }
    }

    match fractional_part {
        Some(frac) => format!("{}{}.{}", sign, integer_with_separators, frac),
        None => format!("{}{}", sign, integer_with_separators),
    }
}

/// Format a percentage value
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Format a value in basis points
pub fn format_bps(value: f64) -> String {
    format!("{:.2} bps", value)
}

/// Format a score out of 100
pub fn format_score(value: f64) -> String {
    format!("{:.0}/100", value)
}

/// Format a DateTime<Utc> as human-readable string
pub fn format_datetime(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
