use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::auth::models::Caller;
use crate::error::AppError;
use crate::models::recipe::{Category, Recipe, RecipeId};

/// Recipe fields that can be filtered or sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeField {
    Name,
    Category,
    Serves,
    TotalTime,
    PublishDate,
    IsPublished,
}

impl RecipeField {
    /// Key of the field in the stored document.
    pub fn storage_key(&self) -> &'static str {
        match self {
            RecipeField::Name => "name",
            RecipeField::Category => "category",
            RecipeField::Serves => "serves",
            RecipeField::TotalTime => "total_time",
            RecipeField::PublishDate => "publish_date",
            RecipeField::IsPublished => "is_published",
        }
    }

    pub fn value_of(&self, recipe: &Recipe) -> FieldValue {
        match self {
            RecipeField::Name => FieldValue::Text(recipe.name.clone()),
            RecipeField::Category => FieldValue::Text(recipe.category.as_str().to_string()),
            RecipeField::Serves => FieldValue::Integer(recipe.serves.into()),
            RecipeField::TotalTime => FieldValue::Integer(recipe.total_time.into()),
            RecipeField::PublishDate => FieldValue::Timestamp(recipe.publish_date),
            RecipeField::IsPublished => FieldValue::Bool(recipe.is_published),
        }
    }

    fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (RecipeField::Name | RecipeField::Category, FieldValue::Text(_))
                | (RecipeField::Serves | RecipeField::TotalTime, FieldValue::Integer(_))
                | (RecipeField::PublishDate, FieldValue::Timestamp(_))
                | (RecipeField::IsPublished, FieldValue::Bool(_))
        )
    }
}

impl fmt::Display for RecipeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for RecipeField {
    type Err = AppError;

    /// Accepts both the wire (camelCase) and the stored (snake_case) names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "name" => Ok(RecipeField::Name),
            "category" => Ok(RecipeField::Category),
            "serves" => Ok(RecipeField::Serves),
            "totaltime" => Ok(RecipeField::TotalTime),
            "publishdate" => Ok(RecipeField::PublishDate),
            "ispublished" => Ok(RecipeField::IsPublished),
            _ => Err(AppError::BadRequest(format!("Unknown recipe field '{s}'"))),
        }
    }
}

/// A typed comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Compare two values of the same kind. Values of different kinds
    /// are unordered.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn to_bson(&self) -> bson::Bson {
        match self {
            FieldValue::Text(s) => bson::Bson::String(s.clone()),
            FieldValue::Integer(i) => bson::Bson::Int64(*i),
            FieldValue::Bool(b) => bson::Bson::Boolean(*b),
            FieldValue::Timestamp(t) => bson::Bson::DateTime(bson::DateTime::from_chrono(*t)),
        }
    }
}

impl From<Category> for FieldValue {
    fn from(category: Category) -> Self {
        FieldValue::Text(category.as_str().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
}

/// One `field <op> value` condition. Clauses are always AND-combined.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    field: RecipeField,
    operator: Operator,
    value: FieldValue,
}

impl FilterClause {
    /// Build a clause, rejecting values whose type does not fit the field.
    pub fn new(field: RecipeField, operator: Operator, value: FieldValue) -> Result<Self, AppError> {
        if !field.accepts(&value) {
            return Err(AppError::BadRequest(format!(
                "Value {value:?} cannot be compared with field '{field}'"
            )));
        }
        Ok(Self {
            field,
            operator,
            value,
        })
    }

    pub fn published(is_published: bool) -> Self {
        Self {
            field: RecipeField::IsPublished,
            operator: Operator::Eq,
            value: FieldValue::Bool(is_published),
        }
    }

    pub fn field(&self) -> RecipeField {
        self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        let ordering = self.field.value_of(recipe).compare(&self.value);
        match self.operator {
            Operator::Eq => ordering == Some(Ordering::Equal),
            Operator::Gte => matches!(ordering, Some(Ordering::Equal | Ordering::Greater)),
        }
    }
}

#[cfg(test)]
impl FilterClause {
    pub fn category(category: Category) -> Self {
        Self {
            field: RecipeField::Category,
            operator: Operator::Eq,
            value: category.into(),
        }
    }

    pub fn serves(operator: Operator, serves: u32) -> Self {
        Self {
            field: RecipeField::Serves,
            operator,
            value: FieldValue::Integer(serves.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(AppError::BadRequest(format!(
                "Invalid sort direction '{s}'. Expected: asc, desc"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: RecipeField,
    pub direction: SortDirection,
}

/// Where a page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePosition {
    /// 1-based page number; skips `(page - 1) * page_size` rows.
    Page(u32),
    /// Resume strictly after the recipe with this id.
    After(RecipeId),
}

/// A bounded, ordered, filtered recipe query.
///
/// Built by [`QueryBuilder`], which guarantees the visibility rule was
/// applied and the page parameters are consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeQuery {
    filters: Vec<FilterClause>,
    sort: Option<Sort>,
    page_size: Option<u32>,
    position: Option<PagePosition>,
}

impl RecipeQuery {
    pub fn filters(&self) -> &[FilterClause] {
        &self.filters
    }

    pub fn sort(&self) -> Option<Sort> {
        self.sort
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    pub fn position(&self) -> Option<&PagePosition> {
        self.position.as_ref()
    }

    /// The 1-based page this query addresses, if in offset mode.
    pub fn page_number(&self) -> Option<u32> {
        match self.position {
            Some(PagePosition::Page(page)) => Some(page),
            _ => None,
        }
    }

    /// Rows to skip before the page starts.
    pub fn offset(&self) -> u64 {
        match (self.position.as_ref(), self.page_size) {
            (Some(PagePosition::Page(page)), Some(size)) => {
                u64::from(page.saturating_sub(1)) * u64::from(size)
            }
            _ => 0,
        }
    }

    /// Same filters and sort, different position.
    pub fn at(&self, position: PagePosition) -> RecipeQuery {
        RecipeQuery {
            position: Some(position),
            ..self.clone()
        }
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        self.filters.iter().all(|clause| clause.matches(recipe))
    }

    /// Total order of the query: the sort field (if any), then the id.
    pub fn compare(&self, a: &Recipe, b: &Recipe) -> Ordering {
        let by_field = self
            .sort
            .map(|sort| {
                let ordering = sort
                    .field
                    .value_of(a)
                    .compare(&sort.field.value_of(b))
                    .unwrap_or(Ordering::Equal);
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .unwrap_or(Ordering::Equal);
        by_field.then_with(|| a.id.cmp(&b.id))
    }
}

/// Assembles a [`RecipeQuery`] from request parameters.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    filters: Vec<FilterClause>,
    sort: Option<Sort>,
    page_size: Option<u32>,
    page: Option<u32>,
    cursor: Option<RecipeId>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: FilterClause) -> Self {
        self.filters.push(clause);
        self
    }

    pub fn sort(mut self, field: RecipeField, direction: SortDirection) -> Self {
        self.sort = Some(Sort { field, direction });
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn after(mut self, cursor: RecipeId) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Validate the parameters and apply the visibility rule for `caller`.
    ///
    /// Anonymous callers only ever see published recipes: any visibility
    /// clause they asked for is replaced with `is_published == true`.
    pub fn build(self, caller: &Caller) -> Result<RecipeQuery, AppError> {
        if self.page_size == Some(0) {
            return Err(AppError::BadRequest("Page size must be positive".into()));
        }

        let position = match (self.page, self.cursor) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Page number and cursor are mutually exclusive".into(),
                ))
            }
            (Some(0), None) => {
                return Err(AppError::BadRequest("Page numbers start at 1".into()))
            }
            (Some(page), None) => Some(PagePosition::Page(page)),
            (None, Some(cursor)) => Some(PagePosition::After(cursor)),
            (None, None) => None,
        };

        if position.is_some() && self.page_size.is_none() {
            return Err(AppError::BadRequest(
                "A page position requires a page size".into(),
            ));
        }

        let mut filters = self.filters;
        if !caller.is_authenticated() {
            filters.retain(|clause| clause.field != RecipeField::IsPublished);
            filters.push(FilterClause::published(true));
        }

        tracing::debug!(
            filters = filters.len(),
            sort = ?self.sort,
            page_size = ?self.page_size,
            position = ?position,
            "Built recipe query"
        );

        Ok(RecipeQuery {
            filters,
            sort: self.sort,
            page_size: self.page_size,
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::AuthenticatedUser;
    use crate::models::recipe::fixtures::new_recipe;

    fn user() -> Caller {
        Caller::Authenticated(AuthenticatedUser {
            user_id: "uid".to_string(),
            email: None,
        })
    }

    #[test]
    fn test_field_from_str_accepts_wire_and_storage_names() {
        assert_eq!("publishDate".parse::<RecipeField>().unwrap(), RecipeField::PublishDate);
        assert_eq!("publish_date".parse::<RecipeField>().unwrap(), RecipeField::PublishDate);
        assert_eq!("isPublished".parse::<RecipeField>().unwrap(), RecipeField::IsPublished);
        assert!("calories".parse::<RecipeField>().is_err());
    }

    #[test]
    fn test_clause_rejects_mismatched_value() {
        let result = FilterClause::new(
            RecipeField::Serves,
            Operator::Eq,
            FieldValue::Text("four".to_string()),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_clause_matching() {
        let recipe = new_recipe("stew", 6, true).with_id(RecipeId::new("a"));
        assert!(FilterClause::serves(Operator::Gte, 6).matches(&recipe));
        assert!(FilterClause::serves(Operator::Gte, 4).matches(&recipe));
        assert!(!FilterClause::serves(Operator::Gte, 7).matches(&recipe));
        assert!(FilterClause::serves(Operator::Eq, 6).matches(&recipe));
        assert!(FilterClause::category(Category::Vegetables).matches(&recipe));
        assert!(!FilterClause::category(Category::FishSeafood).matches(&recipe));
        assert!(!FilterClause::published(false).matches(&recipe));
    }

    #[test]
    fn test_anonymous_visibility_overrides_requested_clause() {
        let query = QueryBuilder::new()
            .filter(FilterClause::published(false))
            .filter(FilterClause::category(Category::Vegetables))
            .build(&Caller::Anonymous)
            .unwrap();

        let visibility: Vec<_> = query
            .filters()
            .iter()
            .filter(|c| c.field() == RecipeField::IsPublished)
            .collect();
        assert_eq!(visibility.len(), 1);
        assert_eq!(visibility[0].value(), &FieldValue::Bool(true));
        assert_eq!(query.filters().len(), 2);
    }

    #[test]
    fn test_authenticated_caller_keeps_filters() {
        let query = QueryBuilder::new()
            .filter(FilterClause::published(false))
            .build(&user())
            .unwrap();
        assert_eq!(query.filters(), &[FilterClause::published(false)]);
    }

    #[test]
    fn test_page_and_cursor_are_exclusive() {
        let result = QueryBuilder::new()
            .page_size(2)
            .page(1)
            .after(RecipeId::new("x"))
            .build(&user());
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_invalid_page_parameters() {
        assert!(QueryBuilder::new().page_size(0).build(&user()).is_err());
        assert!(QueryBuilder::new().page_size(3).page(0).build(&user()).is_err());
        assert!(QueryBuilder::new().page(2).build(&user()).is_err());
    }

    #[test]
    fn test_offset() {
        let query = QueryBuilder::new().page_size(3).page(2).build(&user()).unwrap();
        assert_eq!(query.offset(), 3);
        assert_eq!(query.page_number(), Some(2));
        assert_eq!(query.at(PagePosition::Page(3)).offset(), 6);

        let first = QueryBuilder::new().page_size(3).build(&user()).unwrap();
        assert_eq!(first.offset(), 0);
    }

    #[test]
    fn test_compare_breaks_ties_by_id() {
        let a = new_recipe("a", 2, true).with_id(RecipeId::new("1"));
        let b = new_recipe("b", 2, true).with_id(RecipeId::new("2"));
        let c = new_recipe("c", 1, true).with_id(RecipeId::new("3"));

        let desc = QueryBuilder::new()
            .sort(RecipeField::Serves, SortDirection::Desc)
            .build(&user())
            .unwrap();
        let mut recipes = vec![c.clone(), b.clone(), a.clone()];
        recipes.sort_by(|x, y| desc.compare(x, y));
        let ids: Vec<_> = recipes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
