use std::fmt::Display;

/// Builder for PostgREST query strings (`?col=op.value&order=...`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostgrestQuery {
    params: Vec<(String, String)>,
    order: Vec<String>,
}

impl PostgrestQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(self, columns: &str) -> Self {
        self.param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.param(column, format!("eq.{}", value))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.param(column, format!("neq.{}", value))
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.param(column, format!("gte.{}", value))
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.param(column, format!("lte.{}", value))
    }

    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let joined = values.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        self.param(column, format!("in.({})", joined))
    }

    /// Case-insensitive substring match.
    pub fn ilike(self, column: &str, needle: &str) -> Self {
        self.param(column, format!("ilike.*{}*", needle))
    }

    /// Raw disjunction, e.g. `email.eq.a@b.c,contact_number.eq.0917`.
    pub fn or(self, filters: &str) -> Self {
        self.param("or", format!("({})", filters))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(format!("{}.{}", column, if ascending { "asc" } else { "desc" }));
        self
    }

    pub fn limit(self, limit: usize) -> Self {
        self.param("limit", limit.to_string())
    }

    fn param(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    /// Rendered query string including the leading `?`, or empty when no parameters are set.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = self.params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();

        if !self.order.is_empty() {
            parts.push(format!("order={}", urlencoding::encode(&self.order.join(","))));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}
