use crate::api::response::RawResponse;
use tracing::debug;
use url::Url;

/// Stateless single-attempt calls to the provider. Retrying is left to the caller.
pub struct OpenAiApi;

impl OpenAiApi {
    /// POST a JSON body with bearer auth and read the whole response.
    pub async fn post_json<T>(
        client: &reqwest::Client,
        url: Url,
        token: impl AsRef<str>,
        body: &T,
    ) -> Result<RawResponse, reqwest::Error>
    where
        T: serde::Serialize,
    {
        debug!(%url, "sending provider request");
        let resp = client
            .post(url)
            .bearer_auth(token.as_ref())
            .json(body)
            .send()
            .await?;
        Self::read(resp).await
    }

    /// Plain GET, used for image payloads delivered as a URL.
    pub async fn get(client: &reqwest::Client, url: Url) -> Result<RawResponse, reqwest::Error> {
        debug!(%url, "downloading generated asset");
        let resp = client.get(url).send().await?;
        Self::read(resp).await
    }

    async fn read(resp: reqwest::Response) -> Result<RawResponse, reqwest::Error> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "provider responded");
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
