//! List query parameters.

use crate::formula::Formula;

/// Largest page the backend serves.
pub const MAX_PAGE_SIZE: usize = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sort directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Field to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// Parameters of a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Row filter.
    pub filter: Option<Formula>,
    /// Sort directives, applied in order.
    pub sort: Vec<Sort>,
    /// Total number of records to return across all pages.
    pub max_records: Option<usize>,
    /// Records per page.
    pub page_size: Option<usize>,
}

impl ListQuery {
    /// Create an unfiltered, unsorted query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to rows matching `formula`.
    #[must_use]
    pub fn filter(mut self, formula: Formula) -> Self {
        self.filter = Some(formula);
        self
    }

    /// Restrict to rows matching `formula`, if any.
    #[must_use]
    pub fn filter_opt(mut self, formula: Option<Formula>) -> Self {
        self.filter = formula;
        self
    }

    /// Add a sort directive.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.sort.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the total number of records.
    #[must_use]
    pub fn max_records(mut self, limit: usize) -> Self {
        self.max_records = Some(limit);
        self
    }

    /// Set the page size, clamped to the backend maximum.
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.clamp(1, MAX_PAGE_SIZE));
        self
    }

    /// Encode as query-string pairs, optionally continuing from `offset`.
    ///
    /// Values are unencoded; the transport percent-encodes them.
    #[must_use]
    pub fn to_params(&self, offset: Option<&str>) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(filter) = &self.filter {
            params.push(("filterByFormula".to_string(), filter.to_string()));
        }
        for (i, sort) in self.sort.iter().enumerate() {
            params.push((format!("sort[{i}][field]"), sort.field.clone()));
            params.push((
                format!("sort[{i}][direction]"),
                sort.direction.as_str().to_string(),
            ));
        }
        if let Some(max) = self.max_records {
            params.push(("maxRecords".to_string(), max.to_string()));
        }
        if let Some(size) = self.page_size {
            params.push(("pageSize".to_string(), size.to_string()));
        }
        if let Some(offset) = offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_empty_query_has_no_params() {
        assert!(ListQuery::new().to_params(None).is_empty());
    }

    #[test]
    fn test_full_query_params() {
        let query = ListQuery::new()
            .filter(Formula::eq("Estado", "En_Proceso"))
            .sort("Fecha", Direction::Desc)
            .max_records(10)
            .page_size(50);
        let params = query.to_params(Some("itr1/rec9"));

        assert_eq!(
            param(&params, "filterByFormula"),
            Some("{Estado} = 'En_Proceso'")
        );
        assert_eq!(param(&params, "sort[0][field]"), Some("Fecha"));
        assert_eq!(param(&params, "sort[0][direction]"), Some("desc"));
        assert_eq!(param(&params, "maxRecords"), Some("10"));
        assert_eq!(param(&params, "pageSize"), Some("50"));
        assert_eq!(param(&params, "offset"), Some("itr1/rec9"));
    }

    #[test]
    fn test_multiple_sorts_are_indexed() {
        let params = ListQuery::new()
            .sort("A", Direction::Asc)
            .sort("B", Direction::Desc)
            .to_params(None);

        assert_eq!(param(&params, "sort[1][field]"), Some("B"));
        assert_eq!(param(&params, "sort[0][direction]"), Some("asc"));
    }

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(ListQuery::new().page_size(500).page_size, Some(MAX_PAGE_SIZE));
        assert_eq!(ListQuery::new().page_size(0).page_size, Some(1));
    }

    #[test]
    fn test_filter_opt_clears() {
        let query = ListQuery::new()
            .filter(Formula::is_true("Activo"))
            .filter_opt(None);
        assert!(query.filter.is_none());
    }
}
