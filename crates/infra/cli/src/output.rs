//! Text and JSON rendering of command results.

use novel_admin::{AnalyticsDashboard, DailyBucket, Page};
use novel_admin_core::types::{Banner, Category, Chapter, Profile, Withdrawal};
use serde::Serialize;

use crate::CliError;

/// Pretty JSON when `json` is set, otherwise the text form.
pub fn render<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text(value))
    }
}

fn footer<T>(page: &Page<T>) -> String {
    format!(
        "page {}/{} ({} total)",
        page.page + 1,
        page.total_pages().max(1),
        page.total
    )
}

pub(crate) fn profile_line(profile: &Profile) -> String {
    format!(
        "{}  {:<32} {:<7} {:>8}",
        profile.id,
        profile.email,
        format!("{:?}", profile.role).to_lowercase(),
        profile.balance
    )
}

pub(crate) fn profile_page(page: &Page<Profile>) -> String {
    let mut lines: Vec<String> = page.items.iter().map(profile_line).collect();
    lines.push(footer(page));
    lines.join("\n")
}

pub(crate) fn buckets(buckets: &[DailyBucket]) -> String {
    let mut lines = vec![format!("{:<10} {:>8} {:>8}", "date", "visits", "unique")];
    lines.extend(buckets.iter().map(|b| {
        format!("{:<10} {:>8} {:>8}", b.date, b.event_count, b.distinct_actor_count)
    }));
    lines.join("\n")
}

pub(crate) fn dashboard(dashboard: &AnalyticsDashboard) -> String {
    let stats = &dashboard.stats;
    format!(
        "users {}  books {}  chapters {}  pending withdrawals {}\n\
         today: {} visits, {} unique\n\n{}",
        stats.total_users,
        stats.total_books,
        stats.total_chapters,
        stats.pending_withdrawals,
        stats.visits_today,
        stats.unique_visitors_today,
        buckets(&dashboard.buckets)
    )
}

pub(crate) fn categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| format!("{:>3}  {}  {}", c.sort_order, c.id, c.name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn banners(banners: &[Banner]) -> String {
    banners
        .iter()
        .map(|b| {
            let state = if b.is_active { "" } else { "  (hidden)" };
            format!("{:>3}  {}  {}{}", b.sort_order, b.id, b.title, state)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn chapter_page(page: &Page<Chapter>) -> String {
    let mut lines: Vec<String> = page
        .items
        .iter()
        .map(|c| {
            let order = if c.order.is_nan() {
                "?".to_string()
            } else {
                c.order.to_string()
            };
            let vip = if c.is_vip { " [VIP]" } else { "" };
            format!("{:>6}  {}{}  ({} words)", order, c.title, vip, c.word_count)
        })
        .collect();
    lines.push(footer(page));
    lines.join("\n")
}

pub(crate) fn withdrawal_line(w: &Withdrawal) -> String {
    format!(
        "{}  {}  {:>8}  {:<8} {}",
        w.id,
        w.user_id,
        w.amount,
        format!("{:?}", w.status).to_lowercase(),
        w.note.as_deref().unwrap_or("")
    )
}

pub(crate) fn withdrawal_page(page: &Page<Withdrawal>) -> String {
    let mut lines: Vec<String> = page.items.iter().map(withdrawal_line).collect();
    lines.push(footer(page));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_bucket_table() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let text = buckets(&[DailyBucket { date, event_count: 3, distinct_actor_count: 2 }]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2024-05-01"));
        assert!(lines[1].trim_end().ends_with('2'));
    }

    #[test]
    fn test_render_json() {
        let page = Page::<u8> { items: vec![1], total: 1, page: 0, per_page: 20 };
        let json = render(true, &page, |_| String::new()).unwrap();
        assert!(json.contains("\"total\": 1"));
        assert_eq!(footer(&page), "page 1/1 (1 total)");
    }
}
