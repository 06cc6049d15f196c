//! Offset pagination for list fields
//!
//! Root searches always run with a bounded page. Nested repeating attributes
//! only slice when the client asks for a window.

/// Page size defaults for root list fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 100,
        }
    }
}

/// A page handed to a data source search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: usize,
    pub limit: usize,
}

/// A `start`/`limit` window on a nested repeating attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub start: usize,
    pub limit: Option<usize>,
}

impl Window {
    /// Apply the window to a list of items.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.start);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "({},{})", self.start, limit),
            None => write!(f, "({},)", self.start),
        }
    }
}

fn non_negative(value: i64, argument: &'static str) -> Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("'{argument}' must not be negative"))
}

/// Parse root `start`/`limit` arguments, applying the default and cap.
pub fn parse_page_args(
    start: Option<i64>,
    limit: Option<i64>,
    defaults: PageDefaults,
) -> Result<Page, String> {
    let start = start.map(|s| non_negative(s, "start")).transpose()?.unwrap_or(0);
    let limit = limit
        .map(|l| non_negative(l, "limit"))
        .transpose()?
        .unwrap_or(defaults.default_limit)
        .min(defaults.max_limit);
    Ok(Page { start, limit })
}

/// Parse `start`/`limit` arguments on a nested attribute. `None` when
/// neither is given.
pub fn parse_window_args(start: Option<i64>, limit: Option<i64>) -> Result<Option<Window>, String> {
    if start.is_none() && limit.is_none() {
        return Ok(None);
    }
    Ok(Some(Window {
        start: start.map(|s| non_negative(s, "start")).transpose()?.unwrap_or(0),
        limit: limit.map(|l| non_negative(l, "limit")).transpose()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_default() {
        let page = parse_page_args(None, None, PageDefaults::default()).unwrap();
        assert_eq!(page, Page { start: 0, limit: 25 });
    }

    #[test]
    fn test_parse_page_with_limit() {
        let page = parse_page_args(Some(10), Some(50), PageDefaults::default()).unwrap();
        assert_eq!(page, Page { start: 10, limit: 50 });
    }

    #[test]
    fn test_parse_page_max_limit() {
        let page = parse_page_args(None, Some(1000), PageDefaults::default()).unwrap();
        assert_eq!(page.limit, 100); // Capped at max_limit
    }

    #[test]
    fn test_negative_arguments_are_rejected() {
        assert!(parse_page_args(Some(-1), None, PageDefaults::default()).is_err());
        assert!(parse_window_args(None, Some(-5)).is_err());
    }

    #[test]
    fn test_window_slicing() {
        assert_eq!(parse_window_args(None, None).unwrap(), None);
        let window = parse_window_args(Some(1), Some(2)).unwrap().unwrap();
        assert_eq!(window.slice(vec![1, 2, 3, 4]), vec![2, 3]);
        let open = parse_window_args(Some(3), None).unwrap().unwrap();
        assert_eq!(open.slice(vec![1, 2, 3, 4]), vec![4]);
        assert_eq!(window.to_string(), "(1,2)");
    }
}
