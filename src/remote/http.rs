//! REST gateway implementation using reqwest.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::RepoError;
use crate::model::{
    ContactDto, CreateContactRequest, Envelope, ImageUploadData, UpdateContactRequest,
    UserListData,
};
use crate::remote::{Gateway, ImagePart};

pub struct HttpGateway {
    client: Client,
    users: Url,
    get_all: Url,
    upload: Url,
}

impl HttpGateway {
    /// Create a gateway rooted at `base_url` (e.g. `https://host/`).
    pub fn new(base_url: &str) -> Result<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }

        let base: Url = normalized
            .parse()
            .with_context(|| format!("invalid base URL: {base_url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!("base URL must use http or https: {base_url}");
        }

        let users = base.join("api/User/")?;
        let get_all = users.join("GetAll")?;
        let upload = users.join("UploadImage")?;

        let client = Client::builder()
            .user_agent(concat!("phonebook/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            users,
            get_all,
            upload,
        })
    }

    fn user_url(&self, id: &str) -> Url {
        let mut url = self.users.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id);
        }
        url
    }
}

/// Send the request and reject non-2xx answers.
async fn send(request: RequestBuilder) -> Result<Response, RepoError> {
    let response = request
        .send()
        .await
        .map_err(|err| RepoError::Transport(err.to_string()))?;

    let status = response.status();
    debug!(status = status.as_u16(), url = %response.url(), "response received");
    if !status.is_success() {
        return Err(RepoError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("unknown status").to_string(),
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Envelope<T>, RepoError> {
    response.json::<Envelope<T>>().await.map_err(|err| {
        if err.is_decode() {
            RepoError::Decode(err.to_string())
        } else {
            RepoError::Transport(err.to_string())
        }
    })
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn get_all(&self) -> Result<Envelope<UserListData>, RepoError> {
        debug!(url = %self.get_all, "GET");
        decode(send(self.client.get(self.get_all.clone())).await?).await
    }

    async fn get(&self, id: &str) -> Result<Envelope<ContactDto>, RepoError> {
        let url = self.user_url(id);
        debug!(%url, "GET");
        decode(send(self.client.get(url)).await?).await
    }

    async fn create(&self, body: &CreateContactRequest) -> Result<Envelope<ContactDto>, RepoError> {
        debug!(url = %self.users, "POST");
        // POST goes to `api/User` without the trailing slash
        let mut url = self.users.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
        }
        decode(send(self.client.post(url).json(body)).await?).await
    }

    async fn update(
        &self,
        id: &str,
        body: &UpdateContactRequest,
    ) -> Result<Envelope<ContactDto>, RepoError> {
        let url = self.user_url(id);
        debug!(%url, "PUT");
        decode(send(self.client.put(url).json(body)).await?).await
    }

    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        let url = self.user_url(id);
        debug!(%url, "DELETE");
        send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn upload_image(&self, part: ImagePart) -> Result<Envelope<ImageUploadData>, RepoError> {
        debug!(url = %self.upload, bytes = part.bytes.len(), "POST multipart");
        let file = Part::bytes(part.bytes)
            .file_name(part.file_name)
            .mime_str(part.content_type)
            .map_err(|err| RepoError::Transport(err.to_string()))?;
        let form = Form::new().part(part.field, file);
        decode(send(self.client.post(self.upload.clone()).multipart(form)).await?).await
    }
}
