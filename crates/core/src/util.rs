use url::Url;

pub trait UrlExt {
    fn query_param(&self, key: &str, value: Option<&str>) -> Url;
    fn with_path(&self, path: &str) -> Url;
}

impl UrlExt for Url {
    #[inline]
    fn query_param(&self, key: &str, value: Option<&str>) -> Url {
        let mut out = self.clone();
        let mut pairs = out.query_pairs_mut();
        pairs.clear();
        let mut updated = false;
        for (k, v) in self.query_pairs() {
            if k == key {
                if let Some(value) = value {
                    pairs.append_pair(&k, value);
                }
                updated = true;
            } else {
                pairs.append_pair(&k, &v);
            }
        }
        if !updated && let Some(value) = value {
            pairs.append_pair(key, value);
        }
        drop(pairs);
        if out.query() == Some("") {
            out.set_query(None);
        }
        out
    }

    /// Replace the path, keeping any path prefix configured on the base URL.
    #[inline]
    fn with_path(&self, path: &str) -> Url {
        let mut out = self.clone();
        let base = self.path().trim_end_matches('/');
        out.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
        out
    }
}
