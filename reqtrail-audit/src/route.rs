//! Excluded route matching

use regex::Regex;

#[derive(Debug, Clone)]
enum RoutePattern {
    Exact(String),
    Wildcard(Regex),
}

/// Matches request paths against the excluded route patterns.
///
/// Patterns and paths are compared without leading or trailing `/`, except
/// the root `/` itself. `*` matches any run of characters, `/` included.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    patterns: Vec<RoutePattern>,
}

impl RouteMatcher {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = routes
            .into_iter()
            .map(|route| compile(route.as_ref()))
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.patterns.iter().any(|pattern| match pattern {
            RoutePattern::Exact(route) => route == path,
            RoutePattern::Wildcard(regex) => regex.is_match(path),
        })
    }
}

fn compile(route: &str) -> RoutePattern {
    let route = if route == "/" { route } else { route.trim_matches('/') };
    if !route.contains('*') {
        return RoutePattern::Exact(route.to_string());
    }

    let source = format!("^{}$", regex::escape(route).replace(r"\*", ".*"));
    match Regex::new(&source) {
        Ok(regex) => RoutePattern::Wildcard(regex),
        Err(err) => {
            tracing::warn!(route, error = %err, "Route pattern failed to compile, matching literally");
            RoutePattern::Exact(route.to_string())
        }
    }
}

fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
