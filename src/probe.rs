use crate::error::{Error, Result};
use crate::link::LinkTarget;
use crate::utils::join_link;
use reqwest::Client;
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

/// Checks whether a broken link now resolves through a server-side redirect
#[derive(Debug, Clone)]
pub struct RedirectProbe {
    client: Client,
    base_url: String,
}

impl RedirectProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(10))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Probe a broken link with a HEAD request that follows redirects.
    ///
    /// Returns the path and fragment of the final URL when it differs from
    /// the requested one, the original link when it already resolves, and
    /// `None` for any failure or non-2xx status.
    pub async fn probe(&self, broken: &LinkTarget) -> Option<LinkTarget> {
        match self.try_probe(broken).await {
            Ok(Some(target)) => Some(target),
            Ok(None) => None,
            Err(e) => {
                ::log::debug!("HTTP redirect check failed: {}", e);
                None
            }
        }
    }

    async fn try_probe(&self, broken: &LinkTarget) -> Result<Option<LinkTarget>> {
        let full_url = join_link(&self.base_url, &broken.to_string());
        ::log::debug!("Checking redirect for: {}", full_url);

        let response = self
            .client
            .head(&full_url)
            .send()
            .await
            .map_err(|source| Error::Probe {
                url: full_url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            ::log::debug!("{} answered {}", full_url, response.status());
            return Ok(None);
        }

        let requested = Url::parse(&full_url).ok();
        let final_url = response.url();
        if requested.as_ref() == Some(final_url) {
            ::log::info!("URL is actually valid: {}", broken);
            return Ok(Some(broken.clone()));
        }

        // reqwest drops the fragment when following redirects, keep the original one
        let mut target = LinkTarget::from_url(final_url);
        if target.anchor.is_none() {
            target.anchor = broken.anchor.clone();
        }
        ::log::info!("Found redirect: {} -> {}", broken, target);
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn probe_for(server: &Server) -> RedirectProbe {
        RedirectProbe::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_permanent_redirect_returns_new_path() {
        let mut server = Server::new_async().await;
        server
            .mock("HEAD", "/old")
            .with_status(301)
            .with_header("location", "/new")
            .create_async()
            .await;
        server.mock("HEAD", "/new").with_status(200).create_async().await;

        let fix = probe_for(&server).probe(&LinkTarget::parse("/old")).await;
        assert_eq!(fix, Some(LinkTarget::parse("/new")));
    }

    #[tokio::test]
    async fn test_redirect_keeps_broken_fragment() {
        let mut server = Server::new_async().await;
        server
            .mock("HEAD", "/old")
            .with_status(302)
            .with_header("location", "/new")
            .create_async()
            .await;
        server.mock("HEAD", "/new").with_status(200).create_async().await;

        let fix = probe_for(&server)
            .probe(&LinkTarget::parse("/old#section"))
            .await;
        assert_eq!(fix.map(|t| t.to_string()), Some("/new#section".to_string()));
    }

    #[tokio::test]
    async fn test_valid_link_is_returned_unchanged() {
        let mut server = Server::new_async().await;
        server.mock("HEAD", "/fine").with_status(200).create_async().await;

        let broken = LinkTarget::parse("/fine");
        let fix = probe_for(&server).probe(&broken).await;
        assert_eq!(fix, Some(broken));
    }

    #[tokio::test]
    async fn test_not_found_returns_none() {
        let mut server = Server::new_async().await;
        server.mock("HEAD", "/gone").with_status(404).create_async().await;

        assert_eq!(probe_for(&server).probe(&LinkTarget::parse("/gone")).await, None);
    }

    #[tokio::test]
    async fn test_redirect_to_missing_page_returns_none() {
        let mut server = Server::new_async().await;
        server
            .mock("HEAD", "/old")
            .with_status(301)
            .with_header("location", "/nowhere")
            .create_async()
            .await;
        server.mock("HEAD", "/nowhere").with_status(404).create_async().await;

        assert_eq!(probe_for(&server).probe(&LinkTarget::parse("/old")).await, None);
    }

    #[tokio::test]
    async fn test_unreachable_host_returns_none() {
        let probe = RedirectProbe::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert_eq!(probe.probe(&LinkTarget::parse("/x")).await, None);
    }
}
