//! Listing filters for tasks.
//!
//! Raw query parameters are first narrowed to a [`TaskFilter`] made of closed
//! enumerations, then turned into a [`FilterPlan`]: an ordered list of tagged
//! clauses that always carries the owner. The plan renders to a parameterized
//! SQL suffix for Postgres and can also be evaluated directly against rows
//! for the in-memory store.

use std::cmp::Ordering;
use std::fmt::Write;

use time::{util, Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::repo_types::{Category, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "day" => Some(Period::Day),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "year" => Some(Period::Year),
            _ => None,
        }
    }

    /// Inclusive UTC bounds of the period containing `now`: midnight of the
    /// first day up to the last nanosecond of the last day. Weeks start on Monday.
    pub fn bounds(self, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        let today = now.to_offset(UtcOffset::UTC).date();
        let (first_day, len_days) = match self {
            Period::Day => (today, 1),
            Period::Week => (
                today - Duration::days(i64::from(today.weekday().number_days_from_monday())),
                7,
            ),
            Period::Month => (
                today - Duration::days(i64::from(today.day()) - 1),
                i64::from(today.month().length(today.year())),
            ),
            Period::Year => (
                today - Duration::days(i64::from(today.ordinal()) - 1),
                i64::from(util::days_in_year(today.year())),
            ),
        };
        let begin = first_day.midnight().assume_utc();
        let end = begin + Duration::days(len_days) - Duration::nanoseconds(1);
        (begin, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Id,
    Title,
    StartDate,
}

impl SortField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(SortField::Id),
            "title" => Some(SortField::Title),
            "start_date" => Some(SortField::StartDate),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::StartDate => "start_date",
        }
    }
}

/// Validated listing parameters. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFilter {
    pub category: Option<Category>,
    pub period: Option<Period>,
    pub order: SortOrder,
    pub order_by: SortField,
}

impl TaskFilter {
    /// Keeps a value only when it belongs to its field's enumeration. The first
    /// occurrence of a key wins; unknown keys are ignored.
    pub fn from_params(params: &[(String, String)]) -> Self {
        let first = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        Self {
            category: first("category").and_then(Category::parse),
            period: first("period").and_then(Period::parse),
            order: first("order").and_then(SortOrder::parse).unwrap_or_default(),
            order_by: first("order_by").and_then(SortField::parse).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Category(Category),
    StartBetween {
        begin: OffsetDateTime,
        end: OffsetDateTime,
    },
    Owner(Uuid),
    Order {
        field: SortField,
        direction: SortOrder,
    },
}

/// Bind value for one placeholder of a rendered plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryArg {
    Text(&'static str),
    Timestamp(OffsetDateTime),
    Uuid(Uuid),
}

/// SQL suffix to append after a `WHERE` condition, plus its arguments in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<QueryArg>,
}

/// Ordered clauses for one listing. Only [`build`] creates one, so every plan
/// is scoped to an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPlan {
    clauses: Vec<Clause>,
}

pub fn build(filter: &TaskFilter, owner: Uuid, now: OffsetDateTime) -> FilterPlan {
    let mut clauses = Vec::with_capacity(4);
    if let Some(category) = filter.category {
        clauses.push(Clause::Category(category));
    }
    if let Some(period) = filter.period {
        let (begin, end) = period.bounds(now);
        clauses.push(Clause::StartBetween { begin, end });
    }
    clauses.push(Clause::Owner(owner));
    clauses.push(Clause::Order {
        field: filter.order_by,
        direction: filter.order,
    });
    FilterPlan { clauses }
}

impl FilterPlan {
    pub fn to_sql(&self) -> SqlFragment {
        let mut sql = String::new();
        let mut args = Vec::new();
        fn next(args: &mut Vec<QueryArg>, arg: QueryArg) -> usize {
            args.push(arg);
            args.len()
        }
        for clause in &self.clauses {
            // Writing to a String cannot fail.
            let _ = match clause {
                Clause::Category(c) => {
                    let n = next(&mut args, QueryArg::Text(c.as_str()));
                    write!(sql, " AND category = ${n}")
                }
                Clause::StartBetween { begin, end } => {
                    let b = next(&mut args, QueryArg::Timestamp(*begin));
                    let e = next(&mut args, QueryArg::Timestamp(*end));
                    write!(sql, " AND start_date >= ${b} AND start_date <= ${e}")
                }
                Clause::Owner(id) => {
                    let n = next(&mut args, QueryArg::Uuid(*id));
                    write!(sql, " AND user_id = ${n}")
                }
                Clause::Order { field, direction } => {
                    let tie = if *field == SortField::Id { "" } else { ", id ASC" };
                    write!(sql, " ORDER BY {} {}{tie}", field.column(), direction.sql())
                }
            };
        }
        SqlFragment { sql, args }
    }

    /// Whether `task` passes every predicate clause.
    pub fn matches(&self, task: &Task) -> bool {
        self.clauses.iter().all(|c| match c {
            Clause::Category(category) => task.category == *category,
            Clause::StartBetween { begin, end } => {
                *begin <= task.start_date && task.start_date <= *end
            }
            Clause::Owner(id) => task.user_id == *id,
            Clause::Order { .. } => true,
        })
    }

    /// Ordering requested by the plan's `Order` clause, ties broken by ascending id.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let Some((field, direction)) = self.clauses.iter().find_map(|c| match c {
            Clause::Order { field, direction } => Some((*field, *direction)),
            _ => None,
        }) else {
            return a.id.cmp(&b.id);
        };
        let ord = match field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Title => a.title.cmp(&b.title),
            SortField::StartDate => a.start_date.cmp(&b.start_date),
        };
        let ord = match direction {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    }
}
