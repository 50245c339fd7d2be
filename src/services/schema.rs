use std::{collections::BTreeSet, future::Future};

use crate::{
    db::{normalize_column_name, Projection, PRIMARY_KEY_COLUMN},
    error::StoreError,
};

/// Outcome of a schema-tolerant read
#[derive(Debug, Clone, PartialEq)]
pub struct Tolerated<T> {
    pub value: T,
    /// Projection the successful attempt used
    pub projection: Projection,
    /// Columns shed along the way, in the order the store reported them
    pub dropped: Vec<String>,
}

impl<T> Tolerated<T> {
    pub fn used_wildcard(&self) -> bool {
        self.projection.is_all()
    }
}

/// Runs `run` with `columns`, shedding columns the store reports missing
///
/// See [`select_tolerant_projection`].
pub async fn select_tolerant<T, F, Fut>(
    columns: &[&str],
    run: F,
    max_retries: usize,
) -> Result<T, StoreError>
where
    F: FnMut(Projection) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    select_tolerant_projection(Projection::columns(columns), run, max_retries)
        .await
        .map(|t| t.value)
}

/// Runs `run`, retrying with a reduced projection on missing-column errors
///
/// Each retry removes exactly the column named by the error. The read falls
/// back to `*` when that column is the primary key, is not in the current
/// projection, or `max_retries` removals have already happened. Any other
/// error, or a failure of the wildcard attempt, is returned unchanged.
/// Attempts are strictly sequential.
pub async fn select_tolerant_projection<T, F, Fut>(
    initial: Projection,
    mut run: F,
    max_retries: usize,
) -> Result<Tolerated<T>, StoreError>
where
    F: FnMut(Projection) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut projection = initial;
    let mut dropped = Vec::new();

    loop {
        let err = match run(projection.clone()).await {
            Ok(value) => {
                return Ok(Tolerated {
                    value,
                    projection,
                    dropped,
                })
            }
            Err(err) => err,
        };

        let Some(column) = err.missing_column().map(normalize_column_name) else {
            return Err(err);
        };

        if projection.is_all() {
            return Err(err);
        }

        let reduced = if column == PRIMARY_KEY_COLUMN || dropped.len() >= max_retries {
            None
        } else {
            projection.without(&column)
        };

        match reduced {
            Some(next) => {
                tracing::warn!(
                    column = %column,
                    attempt = dropped.len() + 1,
                    "Column missing from store schema, retrying without it"
                );
                dropped.push(column);
                projection = next;
            }
            None => {
                tracing::warn!(
                    column = %column,
                    dropped = dropped.len(),
                    "Cannot shed missing column, falling back to wildcard projection"
                );
                projection = Projection::All;
            }
        }
    }
}

/// Schema capabilities learned while serving one call
///
/// Created per request and dropped with it, so nothing learned here leaks
/// into other requests.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    max_retries: usize,
    missing: BTreeSet<String>,
}

impl SchemaContext {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            missing: BTreeSet::new(),
        }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn is_known_missing(&self, column: &str) -> bool {
        self.missing.contains(&normalize_column_name(column))
    }

    pub fn mark_missing(&mut self, column: &str) {
        let column = normalize_column_name(column);
        if column != PRIMARY_KEY_COLUMN && !column.is_empty() {
            self.missing.insert(column);
        }
    }

    /// `columns` without the ones already known to be missing
    pub fn projection_for(&self, columns: &[&str]) -> Projection {
        let kept: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !self.is_known_missing(c))
            .collect();

        if kept.is_empty() {
            Projection::All
        } else {
            Projection::columns(&kept)
        }
    }

    /// Schema-tolerant read that remembers every column found missing
    pub async fn select<T, F, Fut>(&mut self, columns: &[&str], run: F) -> Result<T, StoreError>
    where
        F: FnMut(Projection) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let projection = self.projection_for(columns);

        match select_tolerant_projection(projection, run, self.max_retries).await {
            Ok(tolerated) => {
                for column in &tolerated.dropped {
                    self.mark_missing(column);
                }
                Ok(tolerated.value)
            }
            Err(err) => {
                if let Some(column) = err.missing_column() {
                    self.mark_missing(column);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, future::Ready};

    use super::*;

    /// A table with the given columns; projecting anything else fails the way
    /// the Postgres adapter reports it
    fn table<'a>(
        existing: &'a [&'a str],
        calls: &'a RefCell<Vec<String>>,
    ) -> impl FnMut(Projection) -> Ready<Result<String, StoreError>> + 'a {
        move |projection: Projection| {
            calls.borrow_mut().push(projection.to_string());
            let result = match &projection {
                Projection::All => Ok(existing.join(", ")),
                Projection::Columns(cols) => match cols.iter().find(|c| !existing.contains(&c.as_str())) {
                    Some(missing) => Err(StoreError::MissingColumn {
                        column: missing.clone(),
                    }),
                    None => Ok(cols.join(", ")),
                },
            };
            std::future::ready(result)
        }
    }

    #[tokio::test]
    async fn test_drops_reported_column_and_retries() {
        let calls = RefCell::new(Vec::new());
        let result = select_tolerant(
            &["id", "public_id", "ghost_column"],
            table(&["id", "public_id", "title"], &calls),
            8,
        )
        .await
        .unwrap();

        assert_eq!(result, "id, public_id");
        assert_eq!(
            calls.into_inner(),
            vec!["id, public_id, ghost_column", "id, public_id"]
        );
    }

    #[tokio::test]
    async fn test_drops_several_columns_one_at_a_time() {
        let calls = RefCell::new(Vec::new());
        let tolerated = select_tolerant_projection(
            Projection::columns(&["id", "tags", "title", "in_cinema"]),
            table(&["id", "title"], &calls),
            8,
        )
        .await
        .unwrap();

        assert_eq!(tolerated.value, "id, title");
        assert_eq!(tolerated.dropped, vec!["tags", "in_cinema"]);
        assert!(!tolerated.used_wildcard());
        assert_eq!(calls.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_primary_key_falls_back_to_wildcard() {
        let calls = RefCell::new(Vec::new());
        let tolerated = select_tolerant_projection(
            Projection::columns(&["id", "title"]),
            table(&["uuid", "title"], &calls),
            8,
        )
        .await
        .unwrap();

        assert!(tolerated.used_wildcard());
        assert_eq!(tolerated.value, "uuid, title");
        assert_eq!(calls.into_inner(), vec!["id, title", "*"]);
    }

    #[tokio::test]
    async fn test_exhausted_budget_falls_back_to_wildcard() {
        let calls = RefCell::new(Vec::new());
        let tolerated = select_tolerant_projection(
            Projection::columns(&["id", "a", "b", "c"]),
            table(&["id"], &calls),
            2,
        )
        .await
        .unwrap();

        assert_eq!(tolerated.dropped, vec!["a", "b"]);
        assert!(tolerated.used_wildcard());
        assert_eq!(calls.into_inner(), vec!["id, a, b, c", "id, b, c", "id, c", "*"]);
    }

    #[tokio::test]
    async fn test_unmatched_column_falls_back_to_wildcard() {
        let calls = RefCell::new(Vec::new());
        let result = select_tolerant(
            &["id", "title"],
            |projection: Projection| {
                calls.borrow_mut().push(projection.to_string());
                std::future::ready(if projection.is_all() {
                    Ok(1)
                } else {
                    Err(StoreError::MissingColumn {
                        column: "series_id".to_string(),
                    })
                })
            },
            8,
        )
        .await
        .unwrap();

        assert_eq!(result, 1);
        assert_eq!(calls.into_inner(), vec!["id, title", "*"]);
    }

    #[tokio::test]
    async fn test_non_schema_error_is_returned_immediately() {
        let calls = RefCell::new(0);
        let result: Result<(), _> = select_tolerant(
            &["id", "title"],
            |_projection: Projection| {
                *calls.borrow_mut() += 1;
                std::future::ready(Err(StoreError::Backend("connection reset".to_string())))
            },
            8,
        )
        .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(calls.into_inner(), 1);
    }

    #[tokio::test]
    async fn test_wildcard_failure_is_surfaced() {
        let result: Result<(), _> = select_tolerant(
            &["id", "title"],
            |_projection: Projection| {
                std::future::ready(Err(StoreError::MissingColumn {
                    column: "in_cinema".to_string(),
                }))
            },
            8,
        )
        .await;

        assert_eq!(
            result.unwrap_err().missing_column(),
            Some("in_cinema")
        );
    }

    #[tokio::test]
    async fn test_context_prunes_learned_columns() {
        let mut context = SchemaContext::new(8);
        let calls = RefCell::new(Vec::new());

        context
            .select(&["id", "in_cinema"], table(&["id"], &calls))
            .await
            .unwrap();
        assert!(context.is_known_missing("in_cinema"));

        calls.borrow_mut().clear();
        let second = context
            .select(&["id", "in_cinema", "title"], table(&["id", "title"], &calls))
            .await
            .unwrap();

        assert_eq!(second, "id, title");
        assert_eq!(calls.into_inner(), vec!["id, title"]);
    }

    #[tokio::test]
    async fn test_context_remembers_column_from_failed_read() {
        let mut context = SchemaContext::new(8);
        let result: Result<(), _> = context
            .select(&["id"], |_projection: Projection| {
                std::future::ready(Err(StoreError::MissingColumn {
                    column: "titles.in_cinema".to_string(),
                }))
            })
            .await;

        assert!(result.is_err());
        assert!(context.is_known_missing("in_cinema"));
    }

    #[test]
    fn test_context_never_marks_primary_key() {
        let mut context = SchemaContext::new(8);
        context.mark_missing("id");
        assert!(!context.is_known_missing("id"));
        assert_eq!(context.projection_for(&["id"]), Projection::columns(&["id"]));
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut first = SchemaContext::new(8);
        first.mark_missing("tags");
        let second = SchemaContext::new(8);
        assert!(first.is_known_missing("tags"));
        assert!(!second.is_known_missing("tags"));
    }

    #[test]
    fn test_select_completes_without_runtime() {
        let calls = RefCell::new(Vec::new());
        let mut context = SchemaContext::new(8);

        let value = tokio_test::block_on(context.select(&["id", "tags"], table(&["id"], &calls)))
            .unwrap();

        assert_eq!(value, "id");
        assert!(context.is_known_missing("tags"));
    }
}
