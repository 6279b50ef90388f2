use std::collections::BTreeSet;

use crate::id::RecordId;
use crate::models::ID_FIELD;

/// Maximum number of identifiers placed in a single `IN` clause.
pub const MAX_IDS_PER_QUERY: usize = 200;

/// Which records of an object type a query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Every record of the type.
    All,
    /// Records matching a caller-supplied condition.
    Condition(String),
    /// Records whose `field` holds one of `ids`.
    IdIn {
        field: String,
        ids: BTreeSet<RecordId>,
    },
}

impl QueryFilter {
    /// Split an identifier set into `IdIn` filters of bounded size.
    ///
    /// Returns no filters for an empty set.
    pub fn id_batches<'a>(
        field: &str,
        ids: impl IntoIterator<Item = &'a RecordId>,
    ) -> Vec<QueryFilter> {
        let sorted: Vec<RecordId> = ids
            .into_iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        sorted
            .chunks(MAX_IDS_PER_QUERY)
            .map(|chunk| QueryFilter::IdIn {
                field: field.to_string(),
                ids: chunk.iter().cloned().collect(),
            })
            .collect()
    }

    /// Shorthand for an `Id IN (...)` filter.
    pub fn ids<'a>(ids: impl IntoIterator<Item = &'a RecordId>) -> Vec<QueryFilter> {
        Self::id_batches(ID_FIELD, ids)
    }

    fn where_clause(&self) -> Option<String> {
        match self {
            QueryFilter::All => None,
            QueryFilter::Condition(condition) => Some(condition.clone()),
            QueryFilter::IdIn { field, ids } => {
                let quoted: Vec<String> = ids.iter().map(|id| format!("'{id}'")).collect();
                Some(format!("{field} IN ({})", quoted.join(", ")))
            }
        }
    }
}

/// Render a query for `sobject` selecting `field_list`.
pub fn build_query(sobject: &str, field_list: &str, filter: &QueryFilter) -> String {
    match filter.where_clause() {
        Some(clause) => format!("SELECT {field_list} FROM {sobject} WHERE {clause}"),
        None => format!("SELECT {field_list} FROM {sobject}"),
    }
}
