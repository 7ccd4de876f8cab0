//! Translation of [`RecipeQuery`] into MongoDB filter and sort documents.

use bson::{doc, Bson, Document};

use crate::models::recipe::{Recipe, RecipeId};
use crate::query::builder::{FilterClause, Operator, RecipeQuery, SortDirection};

fn clause_document(clause: &FilterClause) -> Document {
    let key = clause.field().storage_key();
    let value = clause.value().to_bson();
    match clause.operator() {
        Operator::Eq => doc! { key: value },
        Operator::Gte => doc! { key: { "$gte": value } },
    }
}

/// Condition selecting the rows strictly after `cursor` in the query order.
fn after_cursor_document(query: &RecipeQuery, cursor: &Recipe) -> Document {
    let cursor_id = cursor.id.as_str();
    match query.sort() {
        None => doc! { "_id": { "$gt": cursor_id } },
        Some(sort) => {
            let key = sort.field.storage_key();
            let value = sort.field.value_of(cursor).to_bson();
            let past = match sort.direction {
                SortDirection::Asc => "$gt",
                SortDirection::Desc => "$lt",
            };
            doc! {
                "$or": [
                    { key: { past: value.clone() } },
                    { key: value, "_id": { "$gt": cursor_id } },
                ]
            }
        }
    }
}

/// Build the `find` filter. `cursor` is the resolved recipe a cursor-mode
/// query resumes after.
pub fn filter_document(query: &RecipeQuery, cursor: Option<&Recipe>) -> Document {
    let mut conditions: Vec<Bson> = query
        .filters()
        .iter()
        .map(|clause| Bson::Document(clause_document(clause)))
        .collect();

    if let Some(cursor) = cursor {
        conditions.push(Bson::Document(after_cursor_document(query, cursor)));
    }

    match conditions.len() {
        0 => Document::new(),
        _ => doc! { "$and": conditions },
    }
}

/// Lookup for the recipe a cursor names. It only resolves when that recipe
/// also passes the query's filters.
pub fn cursor_document(query: &RecipeQuery, cursor_id: &RecipeId) -> Document {
    let mut filter = filter_document(query, None);
    filter.insert("_id", cursor_id.as_str());
    filter
}

/// Build the sort document; the id always closes the order.
pub fn sort_document(query: &RecipeQuery) -> Document {
    let mut sort = Document::new();
    if let Some(s) = query.sort() {
        let direction = match s.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        sort.insert(s.field.storage_key(), direction);
    }
    sort.insert("_id", 1);
    sort
}
