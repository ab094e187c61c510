// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resolution of position NFT metadata from `tokenURI`.

use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::{error::MetadataError, position::PositionMetadata};

/// Public gateway used for `ipfs://` token URIs unless another one is configured.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Source of descriptive metadata for a position NFT.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch the metadata of the position with the given token id.
    async fn position_metadata(&self, token_id: U256) -> anyhow::Result<PositionMetadata>;
}

#[async_trait]
impl<T: MetadataSource + ?Sized> MetadataSource for Arc<T> {
    async fn position_metadata(&self, token_id: U256) -> anyhow::Result<PositionMetadata> {
        (**self).position_metadata(token_id).await
    }
}

/// Where the metadata document behind a token URI lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenUriLocation {
    /// The document is embedded in a `data:` URI.
    Inline(Vec<u8>),
    /// The document has to be fetched over HTTP.
    Remote(Url),
}

/// Resolves token URIs into [PositionMetadata].
#[derive(Clone, Debug)]
pub struct TokenUriResolver {
    client: reqwest::Client,
    ipfs_gateway: Url,
}

impl Default for TokenUriResolver {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            ipfs_gateway: Url::parse(DEFAULT_IPFS_GATEWAY).expect("default gateway is a valid URL"),
        }
    }
}

impl TokenUriResolver {
    /// Create a resolver that rewrites `ipfs://` URIs onto the given gateway.
    pub fn new(ipfs_gateway: Url) -> Self {
        Self { ipfs_gateway: with_trailing_slash(ipfs_gateway), ..Default::default() }
    }

    /// Classify a token URI without performing any I/O.
    pub fn locate(&self, uri: &str) -> Result<TokenUriLocation, MetadataError> {
        if let Some(rest) = uri.strip_prefix("data:") {
            let (header, body) =
                rest.split_once(',').ok_or_else(|| MetadataError::UnsupportedUri(uri.into()))?;
            let mut parts = header.split(';');
            let media_type = parts.next().unwrap_or_default();
            if !(media_type.is_empty() || media_type.eq_ignore_ascii_case("application/json")) {
                return Err(MetadataError::UnsupportedUri(uri.into()));
            }
            let bytes = if parts.any(|param| param.eq_ignore_ascii_case("base64")) {
                STANDARD.decode(body.trim())?
            } else {
                body.as_bytes().to_vec()
            };
            return Ok(TokenUriLocation::Inline(bytes));
        }

        if let Some(path) = uri.strip_prefix("ipfs://") {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            let url = self
                .ipfs_gateway
                .join(path)
                .map_err(|_| MetadataError::UnsupportedUri(uri.into()))?;
            return Ok(TokenUriLocation::Remote(url));
        }

        match Url::parse(uri) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Ok(TokenUriLocation::Remote(url))
            }
            _ => Err(MetadataError::UnsupportedUri(uri.into())),
        }
    }

    /// Resolve a token URI into its metadata document.
    pub async fn resolve(&self, uri: &str) -> Result<PositionMetadata, MetadataError> {
        let mut metadata: PositionMetadata = match self.locate(uri)? {
            TokenUriLocation::Inline(bytes) => serde_json::from_slice(&bytes)?,
            TokenUriLocation::Remote(url) => {
                tracing::debug!(%url, "Fetching position metadata");
                let http_err = |source| MetadataError::Http { url: url.to_string(), source };
                let body = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(http_err)?
                    .bytes()
                    .await
                    .map_err(http_err)?;
                serde_json::from_slice(&body)?
            }
        };
        metadata.token_uri = uri.to_string();
        Ok(metadata)
    }
}

pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[test]
    fn locates_inline_base64() {
        let doc = r#"{"name":"Position #5"}"#;
        let uri = format!("data:application/json;base64,{}", STANDARD.encode(doc));
        let location = TokenUriResolver::default().locate(&uri).unwrap();
        assert_eq!(location, TokenUriLocation::Inline(doc.as_bytes().to_vec()));
    }

    #[test]
    fn locates_ipfs_on_gateway() {
        let resolver = TokenUriResolver::new(Url::parse("https://gateway.example/ipfs").unwrap());
        let location = resolver.locate("ipfs://ipfs/bafyabc/5.json").unwrap();
        assert_eq!(
            location,
            TokenUriLocation::Remote(Url::parse("https://gateway.example/ipfs/bafyabc/5.json").unwrap())
        );
        let location = resolver.locate("ipfs://bafyabc/5.json").unwrap();
        assert_eq!(
            location,
            TokenUriLocation::Remote(Url::parse("https://gateway.example/ipfs/bafyabc/5.json").unwrap())
        );
    }

    #[test]
    fn rejects_unknown_schemes() {
        let resolver = TokenUriResolver::default();
        assert!(matches!(resolver.locate("ar://abc"), Err(MetadataError::UnsupportedUri(_))));
        assert!(matches!(
            resolver.locate("data:image/svg+xml;base64,PHN2Zz4="),
            Err(MetadataError::UnsupportedUri(_))
        ));
        assert!(matches!(
            resolver.locate("data:application/json;base64,@@@"),
            Err(MetadataError::Base64(_))
        ));
    }

    #[tokio::test]
    async fn resolves_inline_json() {
        let uri = r#"data:application/json,{"name":"Position #9","attributes":[]}"#;
        let metadata = TokenUriResolver::default().resolve(uri).await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("Position #9"));
        assert_eq!(metadata.token_uri, uri);
    }

    #[tokio::test]
    async fn resolves_remote_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": "Remote #5", "image": "ipfs://img"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let uri = format!("{}/metadata/5", server.uri());
        let metadata = TokenUriResolver::default().resolve(&uri).await.unwrap();
        assert_eq!(metadata.name.as_deref(), Some("Remote #5"));
        assert_eq!(metadata.image.as_deref(), Some("ipfs://img"));
    }

    #[tokio::test]
    async fn remote_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let uri = format!("{}/metadata/404", server.uri());
        let err = TokenUriResolver::default().resolve(&uri).await.unwrap_err();
        assert!(matches!(err, MetadataError::Http { .. }), "unexpected error: {err:?}");
    }
}
