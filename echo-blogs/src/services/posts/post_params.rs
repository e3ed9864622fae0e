use echo_core::{Params, PostQuery};

/// Query options understood by `find`.
#[derive(Clone, Debug, Default)]
pub struct PostParams {
    pub author: Option<String>,
}

impl From<&Params> for PostParams {
    fn from(params: &Params) -> Self {
        Self {
            author: params.query_value("author").map(str::to_string),
        }
    }
}

impl PostParams {
    /// Listings only ever show published posts.
    pub fn into_query(self) -> PostQuery {
        PostQuery {
            published_only: true,
            author: self.author,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn author_filter_comes_from_the_query() {
        let mut query = HashMap::new();
        query.insert("author".to_string(), " alice ".to_string());
        let params = Params::external("rest", None, query);

        let q = PostParams::from(&params).into_query();
        assert!(q.published_only);
        assert_eq!(q.author.as_deref(), Some("alice"));

        let q = PostParams::from(&Params::internal()).into_query();
        assert_eq!(q.author, None);
    }
}
