//! Terminal styling utilities

pub fn style_cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

pub fn style_green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

pub fn style_red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn style_yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

pub fn style_dim(s: &str) -> String {
    format!("\x1b[2m{}\x1b[0m", s)
}

pub fn style_bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

pub fn print_success(msg: &str) {
    println!("{} {}", style_green("✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style_red("✗"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style_yellow("⚠"), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style_cyan("ℹ"), msg);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", style_bold(title));
    println!("{}", "─".repeat(title.chars().count()));
}

/// Color a reputation: green at or above the start value, yellow while
/// positive, red once it reaches zero.
pub fn style_reputation(reputation: i64, initial: i64) -> String {
    let text = reputation.to_string();
    if reputation >= initial {
        style_green(&text)
    } else if reputation > 0 {
        style_yellow(&text)
    } else {
        style_red(&text)
    }
}

/// Shorten a bid id for tables, keeping the prefix and the last 8 characters.
pub fn truncate_bid_id(bid_id: &str) -> String {
    let chars: Vec<char> = bid_id.chars().collect();
    if chars.len() > 16 {
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("bid_…{}", tail)
    } else {
        bid_id.to_string()
    }
}
