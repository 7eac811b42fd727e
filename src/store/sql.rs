use serde_json::Value;

use super::eval::check_operands;
use super::StoreError;
use crate::query::{Filter, FilterOperator, QueryOptions};

/// Positional parameter for a generated statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Json(Value),
    Int(i64),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Builds a parameterized SELECT over a `(collection, id, data jsonb)` table.
///
/// Field names and values are always bound; only the table name is
/// interpolated and it is quoted.
pub struct DocumentSelect {
    params: Vec<SqlParam>,
}

impl DocumentSelect {
    fn new() -> Self {
        Self { params: vec![] }
    }

    pub fn generate(
        table: &str,
        collection: &str,
        options: &QueryOptions,
        limit: Option<u32>,
    ) -> Result<SqlResult, StoreError> {
        check_operands(&options.filters)?;

        let mut select = Self::new();
        let mut conditions = vec![format!("\"collection\" = {}", select.param(SqlParam::Text(collection.to_string())))];
        for filter in &options.filters {
            conditions.push(select.condition(filter));
        }

        let mut order_parts = vec![];
        for order in &options.order_by {
            let field = select.param(SqlParam::Text(order.field.clone()));
            let nulls = match order.direction {
                crate::query::SortDirection::Asc => "NULLS FIRST",
                crate::query::SortDirection::Desc => "NULLS LAST",
            };
            order_parts.push(format!("\"data\" -> {} {} {}", field, order.direction.to_sql(), nulls));
        }

        let limit_clause = match limit {
            Some(l) => format!("LIMIT {}", select.param(SqlParam::Int(l as i64))),
            None => String::new(),
        };

        let query = [
            "SELECT \"data\"".to_string(),
            format!("FROM {}", quote_identifier(table)),
            format!("WHERE {}", conditions.join(" AND ")),
            if order_parts.is_empty() { String::new() } else { format!("ORDER BY {}", order_parts.join(", ")) },
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: select.params })
    }

    fn condition(&mut self, filter: &Filter) -> String {
        let column = format!("(\"data\" -> {})", self.param(SqlParam::Text(filter.field.clone())));
        let value = self.param(SqlParam::Json(filter.value.clone()));

        match filter.operator {
            FilterOperator::Eq => format!("{} = {}", column, value),
            FilterOperator::Ne => format!("({} IS NOT NULL AND {} <> {})", column, column, value),
            FilterOperator::Lt => Self::range(&column, "<", &value),
            FilterOperator::Lte => Self::range(&column, "<=", &value),
            FilterOperator::Gt => Self::range(&column, ">", &value),
            FilterOperator::Gte => Self::range(&column, ">=", &value),
            FilterOperator::In => format!("({} IS NOT NULL AND {})", column, Self::any_equal(&value, &column)),
            FilterOperator::NotIn => format!("({} IS NOT NULL AND NOT {})", column, Self::any_equal(&value, &column)),
            FilterOperator::ArrayContains => Self::when_array(&column, &Self::any_equal(&column, &value)),
            FilterOperator::ArrayContainsAny => Self::when_array(
                &column,
                &format!(
                    "EXISTS (SELECT 1 FROM jsonb_array_elements({}) AS element JOIN jsonb_array_elements({}) AS candidate ON element = candidate)",
                    column, value
                ),
            ),
        }
    }

    // Element-wise jsonb equality, not `@>` containment
    fn any_equal(array: &str, item: &str) -> String {
        format!("EXISTS (SELECT 1 FROM jsonb_array_elements({}) AS element WHERE element = {})", array, item)
    }

    // jsonb_array_elements raises on scalars; CASE keeps it off non-array fields
    fn when_array(column: &str, predicate: &str) -> String {
        format!("(CASE WHEN jsonb_typeof({}) = 'array' THEN {} ELSE false END)", column, predicate)
    }

    // Range operators only compare values of the same JSON type
    fn range(column: &str, op: &str, value: &str) -> String {
        format!(
            "(jsonb_typeof({}) = jsonb_typeof({}) AND jsonb_typeof({}) IN ('number', 'string', 'boolean') AND {} {} {})",
            column, value, column, column, op, value
        )
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{OrderBy, SortDirection};
    use serde_json::json;

    fn options(filters: Vec<Filter>) -> QueryOptions {
        QueryOptions::with_filters(filters)
    }

    #[test]
    fn binds_every_field_and_value() {
        let opts = options(vec![
            Filter::new("project_id", FilterOperator::Eq, "p1"),
            Filter::new("subdomain", FilterOperator::Eq, "acme"),
        ]);
        let sql = DocumentSelect::generate("documents", "orders", &opts, None).unwrap();
        assert_eq!(
            sql.query,
            "SELECT \"data\" FROM \"documents\" WHERE \"collection\" = $1 AND (\"data\" -> $2) = $3 AND (\"data\" -> $4) = $5"
        );
        assert_eq!(
            sql.params,
            vec![
                SqlParam::Text("orders".into()),
                SqlParam::Text("project_id".into()),
                SqlParam::Json(json!("p1")),
                SqlParam::Text("subdomain".into()),
                SqlParam::Json(json!("acme")),
            ]
        );
    }

    #[test]
    fn hostile_field_names_stay_in_params() {
        let opts = options(vec![Filter::new("x'); DROP TABLE documents; --", FilterOperator::Eq, 1)]);
        let sql = DocumentSelect::generate("documents", "orders", &opts, None).unwrap();
        assert!(!sql.query.contains("DROP"));
        assert_eq!(sql.params[1], SqlParam::Text("x'); DROP TABLE documents; --".into()));
    }

    #[test]
    fn order_and_limit_follow_filters() {
        let mut opts = options(vec![Filter::new("project_id", FilterOperator::Eq, "p1")]);
        opts.order_by = vec![OrderBy { field: "created".into(), direction: SortDirection::Desc }];
        let sql = DocumentSelect::generate("documents", "orders", &opts, Some(25)).unwrap();
        assert!(sql.query.ends_with("ORDER BY \"data\" -> $4 DESC NULLS LAST LIMIT $5"), "{}", sql.query);
        assert_eq!(sql.params[4], SqlParam::Int(25));
    }

    fn single(filter: Filter) -> String {
        DocumentSelect::generate("documents", "orders", &options(vec![filter]), None)
            .unwrap()
            .query
    }

    #[test]
    fn membership_operators_compare_elements_by_equality() {
        let opts = options(vec![
            Filter::new("region", FilterOperator::In, json!(["eu", "us"])),
            Filter::new("tags", FilterOperator::ArrayContainsAny, json!(["a"])),
        ]);
        let sql = DocumentSelect::generate("documents", "orders", &opts, None).unwrap();
        assert!(!sql.query.contains("@>"), "{}", sql.query);
        assert!(
            sql.query.contains("jsonb_array_elements($3) AS element WHERE element = (\"data\" -> $2)"),
            "{}",
            sql.query
        );
        assert!(
            sql.query.contains("jsonb_array_elements((\"data\" -> $4)) AS element JOIN jsonb_array_elements($5) AS candidate ON element = candidate"),
            "{}",
            sql.query
        );
    }

    #[test]
    fn in_requires_the_field_to_exist() {
        let sql = single(Filter::new("archived", FilterOperator::In, json!([null, false])));
        assert!(sql.ends_with(
            "((\"data\" -> $2) IS NOT NULL AND EXISTS (SELECT 1 FROM jsonb_array_elements($3) AS element WHERE element = (\"data\" -> $2)))"
        ), "{}", sql);
    }

    #[test]
    fn not_in_requires_the_field_to_exist() {
        let sql = single(Filter::new("region", FilterOperator::NotIn, json!([["eu"], "us"])));
        assert!(sql.ends_with(
            "((\"data\" -> $2) IS NOT NULL AND NOT EXISTS (SELECT 1 FROM jsonb_array_elements($3) AS element WHERE element = (\"data\" -> $2)))"
        ), "{}", sql);
    }

    #[test]
    fn array_contains_matches_whole_elements() {
        let filter = Filter::new("tags", FilterOperator::ArrayContains, json!({"a": 1}));
        let sql = DocumentSelect::generate("documents", "orders", &options(vec![filter]), None).unwrap();
        assert!(sql.query.ends_with(
            "(CASE WHEN jsonb_typeof((\"data\" -> $2)) = 'array' THEN EXISTS (SELECT 1 FROM jsonb_array_elements((\"data\" -> $2)) AS element WHERE element = $3) ELSE false END)"
        ), "{}", sql.query);
        assert_eq!(sql.params[2], SqlParam::Json(json!({"a": 1})));
    }

    #[test]
    fn rejects_scalar_in_operand() {
        let opts = options(vec![Filter::new("region", FilterOperator::In, "eu")]);
        assert!(matches!(
            DocumentSelect::generate("documents", "orders", &opts, None),
            Err(StoreError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("documents"), "\"documents\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
