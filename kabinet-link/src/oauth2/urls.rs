//! URL path joining for configured endpoints

use url::Url;

use crate::error::LinkError;

/// Append `path` to the path of `base`, dropping any query or fragment
///
/// `https://k.example/prefix` + `/api/products` gives
/// `https://k.example/prefix/api/products`.
pub fn join_path(base: &Url, path: &str) -> Result<Url, LinkError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);

    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            LinkError::InvalidConfiguration(format!("{base} cannot carry a path"))
        })?;
        segments.pop_if_empty();
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_join_on_root() {
        let joined = join_path(&url("https://k.example"), "/api/oauth2/access_token").unwrap();
        assert_eq!(joined.as_str(), "https://k.example/api/oauth2/access_token");
    }

    #[test]
    fn test_join_keeps_base_prefix() {
        let joined = join_path(&url("https://k.example/tenant/"), "api/products").unwrap();
        assert_eq!(joined.as_str(), "https://k.example/tenant/api/products");
    }

    #[test]
    fn test_join_drops_query() {
        let joined = join_path(&url("http://localhost:3000/?x=1#top"), "/oauth2/callback").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:3000/oauth2/callback");
    }

    #[test]
    fn test_join_rejects_non_base_url() {
        assert!(join_path(&url("mailto:someone@example.com"), "/x").is_err());
    }
}
