// 📊 Summary - Period totals for the dashboard overview
//
// For a period [from, to] (default: the 30 days ending today) the summary
// compares income, expenses and remaining balance with the preceding
// period of the same length, lists the top spending categories and a
// per-day series with gaps filled by zeros.

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::db;
use crate::entities::TransactionFilter;

/// Named categories shown before the rest is folded into "Other"
pub const TOP_CATEGORIES: usize = 3;

/// Default period length when the filter has no `from`
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Longest period a summary may span (about ten years)
pub const MAX_PERIOD_DAYS: i64 = 3_660;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("period is outside the supported date range")]
    OutOfRange,

    #[error("period is longer than {MAX_PERIOD_DAYS} days")]
    TooLong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub remaining_amount: i64,
    pub remaining_change: f64,
    pub income_amount: i64,
    pub income_change: f64,
    pub expenses_amount: i64,
    pub expenses_change: f64,
    pub categories: Vec<CategorySpend>,
    pub days: Vec<DaySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpend {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub income: i64,
    pub expenses: i64,
}

/// Resolve the filter into a closed date range of at most `MAX_PERIOD_DAYS`
pub fn resolve_period(
    filter: &TransactionFilter,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    let to = filter.to.unwrap_or(today);
    let from = match filter.from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_PERIOD_DAYS))
            .ok_or(PeriodError::OutOfRange)?,
    };
    let (from, to) = if from > to { (to, from) } else { (from, to) };

    if (to - from).num_days() + 1 > MAX_PERIOD_DAYS {
        return Err(PeriodError::TooLong);
    }
    Ok((from, to))
}

/// The period of equal length that ends the day before `from`
pub fn previous_period(
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), PeriodError> {
    let shift = Duration::days((to - from).num_days() + 1);
    match (from.checked_sub_signed(shift), to.checked_sub_signed(shift)) {
        (Some(last_from), Some(last_to)) => Ok((last_from, last_to)),
        _ => Err(PeriodError::OutOfRange),
    }
}

/// Current and previous period for `filter`, or why it cannot be summarized
pub fn summary_periods(
    filter: &TransactionFilter,
    today: NaiveDate,
) -> Result<((NaiveDate, NaiveDate), (NaiveDate, NaiveDate)), PeriodError> {
    let (from, to) = resolve_period(filter, today)?;
    Ok(((from, to), previous_period(from, to)?))
}

/// Percentage change from `previous` to `current`.
///
/// A zero baseline yields 0 when nothing changed and 100 otherwise.
pub fn percentage_change(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if current == 0 { 0.0 } else { 100.0 };
    }
    (current - previous) as f64 / previous as f64 * 100.0
}

/// Keep the largest `TOP_CATEGORIES` entries and fold the rest into "Other".
/// Input must be sorted by value, largest first.
pub fn top_categories(spending: Vec<(String, i64)>) -> Vec<CategorySpend> {
    let mut categories: Vec<CategorySpend> = spending
        .iter()
        .take(TOP_CATEGORIES)
        .map(|(name, value)| CategorySpend {
            name: name.clone(),
            value: *value,
        })
        .collect();

    let other: i64 = spending.iter().skip(TOP_CATEGORIES).map(|(_, v)| v).sum();
    if spending.len() > TOP_CATEGORIES {
        categories.push(CategorySpend {
            name: "Other".to_string(),
            value: other,
        });
    }

    categories
}

/// One entry per day in [from, to]; days without activity are zero
pub fn fill_missing_days(
    active: &[(NaiveDate, i64, i64)],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<DaySummary> {
    let by_day: HashMap<NaiveDate, (i64, i64)> = active
        .iter()
        .map(|(date, income, expenses)| (*date, (*income, *expenses)))
        .collect();

    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| {
            let (income, expenses) = by_day.get(&day).copied().unwrap_or((0, 0));
            DaySummary {
                date: day,
                income,
                expenses,
            }
        })
        .collect()
}

/// Build the summary for `filter`, treating `today` as the default end date
pub fn build_summary(conn: &Connection, filter: &TransactionFilter, today: NaiveDate) -> Result<Summary> {
    let ((from, to), (last_from, last_to)) = summary_periods(filter, today)?;
    let account_id = filter.account_id.as_deref();

    let current = db::period_totals(conn, from, to, account_id)?;
    let last = db::period_totals(conn, last_from, last_to, account_id)?;
    let spending = db::category_spending(conn, from, to, account_id)?;
    let active_days = db::daily_totals(conn, from, to, account_id)?;

    tracing::debug!(%from, %to, ?account_id, "summary computed");

    Ok(Summary {
        remaining_amount: current.remaining,
        remaining_change: percentage_change(current.remaining, last.remaining),
        income_amount: current.income,
        income_change: percentage_change(current.income, last.income),
        expenses_amount: current.expenses,
        expenses_change: percentage_change(current.expenses, last.expenses),
        categories: top_categories(spending),
        days: fill_missing_days(&active_days, from, to),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountDraft, CategoryDraft, TransactionDraft};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(0, 0), 0.0);
        assert_eq!(percentage_change(500, 0), 100.0);
        assert_eq!(percentage_change(150, 100), 50.0);
        assert_eq!(percentage_change(50, 100), -50.0);
    }

    #[test]
    fn test_default_period_is_thirty_days_back() {
        let today = date(2024, 3, 31);
        let (from, to) = resolve_period(&TransactionFilter::default(), today).unwrap();

        assert_eq!(to, today);
        assert_eq!(from, date(2024, 3, 1));
        assert_eq!(previous_period(from, to), Ok((date(2024, 1, 30), date(2024, 2, 29))));
    }

    #[test]
    fn test_periods_at_the_edge_of_the_calendar_are_rejected() {
        let today = date(2024, 3, 31);

        let wide = TransactionFilter::between(date(1, 1, 1), date(9999, 12, 31));
        assert_eq!(summary_periods(&wide, today), Err(PeriodError::TooLong));

        let first = NaiveDate::MIN;
        let earliest = TransactionFilter::between(first, first + Duration::days(9));
        assert_eq!(summary_periods(&earliest, today), Err(PeriodError::OutOfRange));

        let ten_years = TransactionFilter::between(date(2014, 1, 1), date(2023, 12, 31));
        assert!(summary_periods(&ten_years, today).is_ok());
    }

    #[test]
    fn test_top_categories_folds_other() {
        let spending = vec![
            ("Rent".to_string(), 900),
            ("Food".to_string(), 300),
            ("Fun".to_string(), 100),
            ("Gym".to_string(), 50),
            ("Books".to_string(), 25),
        ];

        let top = top_categories(spending);
        assert_eq!(top.len(), 4);
        assert_eq!(top[3], CategorySpend { name: "Other".to_string(), value: 75 });
        assert!(top_categories(vec![("Rent".to_string(), 1)]).len() == 1);
    }

    #[test]
    fn test_fill_missing_days() {
        let days = fill_missing_days(
            &[(date(2024, 1, 2), 100, 0)],
            date(2024, 1, 1),
            date(2024, 1, 3),
        );

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].income, 0);
        assert_eq!(days[1].income, 100);
        assert_eq!(days[2].date, date(2024, 1, 3));
    }

    #[test]
    fn test_build_summary_against_store() {
        let mut conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let account = db::insert_account(&conn, &AccountDraft::new("Checking")).unwrap();
        let rent = db::insert_category(&conn, &CategoryDraft::new("Rent")).unwrap();

        let draft = |day: NaiveDate, amount: i64, category: Option<&str>| TransactionDraft {
            amount,
            payee: "p".to_string(),
            notes: None,
            date: day,
            account_id: account.id.clone(),
            category_id: category.map(str::to_string),
        };

        db::insert_transactions(
            &mut conn,
            &[
                // previous period
                draft(date(2024, 1, 5), 1_000, None),
                // current period
                draft(date(2024, 1, 12), 3_000, None),
                draft(date(2024, 1, 13), -500, Some(rent.id.as_str())),
            ],
        )
        .unwrap();

        let filter = TransactionFilter::between(date(2024, 1, 10), date(2024, 1, 14));
        let summary = build_summary(&conn, &filter, date(2024, 6, 1)).unwrap();

        assert_eq!(summary.income_amount, 3_000);
        assert_eq!(summary.income_change, 200.0);
        assert_eq!(summary.expenses_amount, -500);
        assert_eq!(summary.expenses_change, 100.0);
        assert_eq!(summary.remaining_amount, 2_500);
        assert_eq!(summary.categories, vec![CategorySpend { name: "Rent".to_string(), value: 500 }]);
        assert_eq!(summary.days.len(), 5);
    }
}
