//! Filter and ordering types for transaction listings. Column names never
//! come from the caller; they are resolved from these enums.

use serde::Serialize;

use super::transaction::{Transaction, TransactionStatus, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    CreateTime,
}

impl OrderBy {
    /// Only `createtime` is recognised.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createtime" => Some(OrderBy::CreateTime),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            OrderBy::CreateTime => "create_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse_or(value: &str, default: SortOrder) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            _ => default,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Status narrowing for listings. `None` means every status, `F` included.
pub fn parse_status_filter(value: &str) -> Option<Vec<TransactionStatus>> {
    match value {
        "ALL" => None,
        "I" | "O" | "E" | "F" => value.parse().ok().map(|s| vec![s]),
        _ => Some(default_statuses()),
    }
}

pub fn default_statuses() -> Vec<TransactionStatus> {
    vec![
        TransactionStatus::Completed,
        TransactionStatus::Pending,
        TransactionStatus::Failed,
    ]
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub namespace: Option<String>,
    pub statuses: Option<Vec<TransactionStatus>>,
    pub region: Option<String>,
    pub order_by: OrderBy,
    pub sort_order: SortOrder,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.transaction_type.map_or(true, |t| tx.transaction_type == t)
            && self.namespace.as_deref().map_or(true, |ns| tx.namespace == ns)
            && self
                .statuses
                .as_ref()
                .map_or(true, |set| set.contains(&tx.status))
            && self
                .region
                .as_deref()
                .map_or(true, |r| tx.region.as_deref() == Some(r))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub total: i64,
    pub results: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_defaults() {
        assert_eq!(parse_status_filter(""), Some(default_statuses()));
        assert_eq!(parse_status_filter("bogus"), Some(default_statuses()));
        assert_eq!(parse_status_filter("ALL"), None);
        assert_eq!(parse_status_filter("I"), Some(vec![TransactionStatus::Pending]));
        assert_eq!(parse_status_filter("F"), Some(vec![TransactionStatus::Fatal]));
    }

    #[test]
    fn test_sort_order_is_case_insensitive() {
        assert_eq!(SortOrder::parse_or("ASC", SortOrder::Desc), SortOrder::Asc);
        assert_eq!(SortOrder::parse_or("", SortOrder::Desc), SortOrder::Desc);
        assert_eq!(SortOrder::parse_or("sideways", SortOrder::Asc), SortOrder::Asc);
    }

    #[test]
    fn test_order_by_rejects_arbitrary_columns() {
        assert_eq!(OrderBy::parse("createtime"), Some(OrderBy::CreateTime));
        assert_eq!(OrderBy::parse("amount; DROP TABLE df_transaction"), None);
    }
}
