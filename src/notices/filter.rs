//! Selection of the notices shown on a page view.

use super::condition::ConditionEvaluator;
use super::models::{NoticeRecord, NoticeType, DEFAULT_PRIORITY};
use super::request::RequestContext;
use crate::option_store::OptionStore;
use crate::user::Principal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Filters and orders notices for one request. Works on the records it is
/// given and never writes anything back.
pub struct NoticeFilterEngine {
    options: Arc<dyn OptionStore>,
}

impl NoticeFilterEngine {
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self { options }
    }

    pub fn resolve(
        &self,
        notices: Vec<NoticeRecord>,
        context: &RequestContext,
        principal: &dyn Principal,
    ) -> Vec<NoticeRecord> {
        let evaluator = ConditionEvaluator::new(&context.current_screen, self.options.as_ref());

        let eligible = notices
            .into_iter()
            .filter(|notice| is_eligible(notice, context, &evaluator, principal));
        let mut unique = dedup(eligible);
        sort_by_priority(&mut unique);

        unique
            .into_iter()
            .filter(|notice| {
                let displayable = notice.is_displayable();
                if !displayable {
                    debug!("Notice {}: type is not displayable", notice.id);
                }
                displayable
            })
            .collect()
    }
}

fn is_eligible(
    notice: &NoticeRecord,
    context: &RequestContext,
    evaluator: &ConditionEvaluator<'_>,
    principal: &dyn Principal,
) -> bool {
    let Some(notice_type) = &notice.notice_type else {
        debug!("Notice {}: missing type", notice.id);
        return false;
    };
    if notice.message.is_none() {
        debug!("Notice {}: missing message", notice.id);
        return false;
    }

    if context.has_blocking_error
        && matches!(notice_type, NoticeType::Information | NoticeType::Warning)
    {
        debug!("Notice {}: suppressed by blocking error", notice.id);
        return false;
    }

    if let (Some(start), Some(end)) = (&notice.start_date, &notice.end_date) {
        if !within_window(start, end, context.now) {
            debug!("Notice {}: outside of its date window", notice.id);
            return false;
        }
    }

    if let Some(pages) = notice.page.as_ref().filter(|pages| !pages.is_empty()) {
        if !pages.as_slice().iter().any(|page| evaluator.is_screen(page)) {
            debug!("Notice {}: not shown on this screen", notice.id);
            return false;
        }
    }

    if let Some(excluded) = notice.page_exclude.as_ref().filter(|pages| !pages.is_empty()) {
        if excluded.as_slice().iter().any(|page| evaluator.is_screen(page)) {
            debug!("Notice {}: excluded from this screen", notice.id);
            return false;
        }
    }

    if let Some(capability) = notice.required_capability() {
        if !principal.has_capability(capability) {
            debug!("Notice {}: user lacks {}", notice.id, capability);
            return false;
        }
    }

    true
}

/// Both bounds are inclusive. A bound that cannot be read keeps the notice
/// hidden.
fn within_window(start: &str, end: &str, now: DateTime<Utc>) -> bool {
    match (parse_date(start), parse_date(end)) {
        (Some(start), Some(end)) => start <= now && now <= end,
        _ => false,
    }
}

/// Reads RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` and plain `YYYY-MM-DD`
/// dates (midnight). Zoneless values are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Drops records equal to an earlier one, keeping first occurrences in order.
fn dedup(notices: impl Iterator<Item = NoticeRecord>) -> Vec<NoticeRecord> {
    let mut unique: Vec<NoticeRecord> = Vec::new();
    for notice in notices {
        if unique.contains(&notice) {
            debug!("Notice {}: duplicate", notice.id);
            continue;
        }
        unique.push(notice);
    }
    unique
}

/// Priority order. Only compares when both sides carry a priority; any
/// missing priority makes the left side sort after the right.
fn compare_priority(a: &NoticeRecord, b: &NoticeRecord) -> Ordering {
    match (a.priority, b.priority) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => DEFAULT_PRIORITY.cmp(&0),
    }
}

/// Stable insertion sort. `compare_priority` is not a total order, so the
/// standard library sorts are off the table.
fn sort_by_priority(notices: &mut [NoticeRecord]) {
    for i in 1..notices.len() {
        let mut j = i;
        while j > 0 && compare_priority(&notices[j - 1], &notices[j]) == Ordering::Greater {
            notices.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notices::models::OneOrMany;
    use crate::option_store::InMemoryOptionStore;
    use crate::user::{Operator, UserRole};
    use chrono::TimeZone;

    fn engine() -> NoticeFilterEngine {
        NoticeFilterEngine::new(Arc::new(InMemoryOptionStore::new()))
    }

    fn admin() -> Operator {
        Operator::new(1, vec![UserRole::Administrator])
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn context(screen: &str) -> RequestContext {
        RequestContext::new(screen, at(2024, 1, 15))
    }

    fn notice(id: &str, notice_type: &str) -> NoticeRecord {
        NoticeRecord {
            id: id.to_string(),
            notice_type: Some(NoticeType::from(notice_type)),
            message: Some(format!("message {}", id)),
            priority: Some(DEFAULT_PRIORITY),
            ..Default::default()
        }
    }

    fn ids(notices: &[NoticeRecord]) -> Vec<&str> {
        notices.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn non_displayable_types_are_never_resolved() {
        let notices = vec![
            notice("e", "error"),
            notice("p", "promo"),
            notice("s", "success"),
            notice("w", "warning"),
        ];
        let resolved = engine().resolve(notices, &context(""), &admin());
        assert_eq!(ids(&resolved), vec!["e", "w"]);
    }

    #[test]
    fn shape_check_drops_incomplete_records() {
        let mut no_type = notice("a", "error");
        no_type.notice_type = None;
        let mut no_message = notice("b", "error");
        no_message.message = None;
        let mut empty_message = notice("c", "error");
        empty_message.message = Some(String::new());

        let resolved = engine().resolve(
            vec![no_type, no_message, empty_message],
            &context(""),
            &admin(),
        );
        assert_eq!(ids(&resolved), vec!["c"]);
    }

    #[test]
    fn blocking_error_suppresses_information_and_warning() {
        let notices = vec![
            notice("i", "information"),
            notice("e", "error"),
            notice("w", "warning"),
        ];
        let ctx = context("").with_blocking_error(true);
        assert_eq!(ids(&engine().resolve(notices.clone(), &ctx, &admin())), vec!["e"]);

        let ctx = context("");
        assert_eq!(
            ids(&engine().resolve(notices, &ctx, &admin())),
            vec!["i", "e", "w"]
        );
    }

    #[test]
    fn date_window_needs_both_bounds() {
        let mut windowed = notice("w", "error");
        windowed.start_date = Some("2024-01-01".to_string());
        windowed.end_date = Some("2024-01-31".to_string());

        let mut start_only = notice("s", "error");
        start_only.start_date = Some("2024-01-01".to_string());

        let mut end_only = notice("x", "error");
        end_only.end_date = Some("2023-01-01".to_string());

        let all = vec![windowed, start_only, end_only];
        let engine = engine();

        let inside = RequestContext::new("", at(2024, 1, 15));
        assert_eq!(ids(&engine.resolve(all.clone(), &inside, &admin())), vec!["w", "s", "x"]);

        let before = RequestContext::new("", at(2023, 12, 31));
        assert_eq!(ids(&engine.resolve(all.clone(), &before, &admin())), vec!["s", "x"]);

        let after = RequestContext::new("", at(2024, 2, 1));
        assert_eq!(ids(&engine.resolve(all.clone(), &after, &admin())), vec!["s", "x"]);

        let far_past = RequestContext::new("", at(1999, 1, 1));
        assert_eq!(ids(&engine.resolve(all, &far_past, &admin())), vec!["s", "x"]);
    }

    #[test]
    fn unreadable_date_bound_hides_notice() {
        let mut bad = notice("bad", "error");
        bad.start_date = Some("someday".to_string());
        bad.end_date = Some("2099-01-01".to_string());
        assert!(engine().resolve(vec![bad], &context(""), &admin()).is_empty());
    }

    #[test]
    fn page_inclusion_and_exclusion() {
        let mut only_settings = notice("inc", "error");
        only_settings.page = Some(OneOrMany::from("settings"));

        let mut listed = notice("list", "error");
        listed.page = Some(OneOrMany::from(vec!["about", "settings"]));

        let mut not_on_settings = notice("exc", "error");
        not_on_settings.page_exclude = Some(OneOrMany::from(vec!["settings"]));

        let mut empty_page = notice("empty", "error");
        empty_page.page = Some(OneOrMany::Many(vec![]));

        let mut both = notice("both", "error");
        both.page = Some(OneOrMany::from("settings"));
        both.page_exclude = Some(OneOrMany::from("settings"));

        let all = vec![only_settings, listed, not_on_settings, empty_page, both];
        let engine = engine();

        assert_eq!(
            ids(&engine.resolve(all.clone(), &context("settings"), &admin())),
            vec!["inc", "list", "empty"]
        );
        assert_eq!(
            ids(&engine.resolve(all.clone(), &context("about"), &admin())),
            vec!["list", "exc", "empty"]
        );
        assert_eq!(
            ids(&engine.resolve(all, &context(""), &admin())),
            vec!["exc", "empty"]
        );
    }

    #[test]
    fn capability_checks_first_entry_only() {
        let mut admin_only = notice("admin", "error");
        admin_only.capability = Some(OneOrMany::from(vec!["manage_options", "read"]));

        let mut readers = notice("readers", "error");
        readers.capability = Some(OneOrMany::from(vec!["read", "manage_options"]));

        let subscriber = Operator::new(2, vec![UserRole::Subscriber]);
        let resolved = engine().resolve(vec![admin_only, readers], &context(""), &subscriber);
        assert_eq!(ids(&resolved), vec!["readers"]);
    }

    #[test]
    fn priority_sort_is_stable() {
        let mut notices = Vec::new();
        for (id, priority) in [("a", 300), ("b", 10), ("c", 255), ("d", 10)] {
            let mut n = notice(id, "error");
            n.priority = Some(priority);
            notices.push(n);
        }
        let resolved = engine().resolve(notices, &context(""), &admin());
        assert_eq!(ids(&resolved), vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn missing_priority_compares_greater() {
        let mut first = notice("first", "error");
        first.priority = Some(10);
        let mut second = notice("second", "error");
        second.priority = None;

        let resolved = engine().resolve(vec![first, second], &context(""), &admin());
        assert_eq!(ids(&resolved), vec!["second", "first"]);

        // The comparator's asymmetry is deterministic for a fixed input
        let mut a = notice("a", "error");
        a.priority = None;
        let mut b = notice("b", "error");
        b.priority = Some(5);
        let resolved = engine().resolve(vec![a, b], &context(""), &admin());
        assert_eq!(ids(&resolved), vec!["b", "a"]);
    }

    #[test]
    fn duplicates_collapse_to_earliest() {
        let dup = notice("same", "warning");
        let mut other = notice("other", "warning");
        other.priority = Some(1);
        let mut near_dup = notice("same", "warning");
        near_dup.title = Some("different".to_string());

        let resolved = engine().resolve(
            vec![dup.clone(), other, dup.clone(), near_dup],
            &context(""),
            &admin(),
        );
        assert_eq!(ids(&resolved), vec!["other", "same", "same"]);
        assert_eq!(resolved[1], dup);
        assert_eq!(resolved[2].title.as_deref(), Some("different"));
    }

    #[test]
    fn resolve_does_not_touch_the_input_store() {
        let options = Arc::new(InMemoryOptionStore::new());
        let engine = NoticeFilterEngine::new(options.clone());
        let _ = engine.resolve(vec![notice("a", "promo")], &context(""), &admin());
        assert!(options.get_option("admin_notices").unwrap().is_none());
    }

    #[test]
    fn parse_date_formats() {
        assert_eq!(
            parse_date("2024-01-31"),
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-01-31 08:30:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 8, 30, 0).unwrap())
        );
        assert_eq!(
            parse_date("2024-01-31T08:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 6, 30, 0).unwrap())
        );
        assert_eq!(parse_date("31/01/2024"), None);
        assert_eq!(parse_date(""), None);
    }
}
