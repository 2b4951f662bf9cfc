//! Remote contact gateway.
//!
//! This module provides:
//! - `Gateway` trait for the REST backend, so the repository can be driven
//!   by the real HTTP client or by an in-memory server in tests
//! - `HttpGateway`, the reqwest implementation
//!
//! A gateway only deals with transport and status codes. Interpreting the
//! envelope (`success`, `messages`, missing `data`) is left to the repository.

pub mod http;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::error::RepoError;
use crate::model::{
    ContactDto, CreateContactRequest, Envelope, ImageUploadData, UpdateContactRequest,
    UserListData,
};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "image";
pub const UPLOAD_FILE_NAME: &str = "contact_image.jpg";
pub const UPLOAD_CONTENT_TYPE: &str = "image/jpeg";

/// A single binary part for the image upload endpoint.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub field: &'static str,
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImagePart {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            field: UPLOAD_FIELD,
            file_name: UPLOAD_FILE_NAME,
            content_type: UPLOAD_CONTENT_TYPE,
            bytes,
        }
    }
}

/// Trait for the phone-book REST backend
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET api/User/GetAll`
    async fn get_all(&self) -> Result<Envelope<UserListData>, RepoError>;

    /// `GET api/User/{id}`
    async fn get(&self, id: &str) -> Result<Envelope<ContactDto>, RepoError>;

    /// `POST api/User`
    async fn create(&self, body: &CreateContactRequest) -> Result<Envelope<ContactDto>, RepoError>;

    /// `PUT api/User/{id}`
    async fn update(
        &self,
        id: &str,
        body: &UpdateContactRequest,
    ) -> Result<Envelope<ContactDto>, RepoError>;

    /// `DELETE api/User/{id}`. Any 2xx answer counts as accepted.
    async fn delete(&self, id: &str) -> Result<(), RepoError>;

    /// `POST api/User/UploadImage` as multipart form data
    async fn upload_image(&self, part: ImagePart) -> Result<Envelope<ImageUploadData>, RepoError>;
}
