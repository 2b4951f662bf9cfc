//! Contact repository: wire envelopes in, domain contacts and typed errors out.

use std::sync::Arc;

use futures::stream::BoxStream;
use tracing::{debug, warn};

use crate::error::RepoError;
use crate::model::{
    Contact, ContactFields, CreateContactRequest, Envelope, UpdateContactRequest,
};
use crate::remote::{Gateway, ImagePart};
use crate::resource::{track, Resource};
use crate::search;

/// Check the envelope's success flag and hand back its payload, if any.
fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<Option<T>, RepoError> {
    if envelope.success != Some(true) {
        let messages = envelope.messages.unwrap_or_default();
        warn!(?messages, status = ?envelope.status, "server rejected request");
        return Err(RepoError::Application { messages });
    }
    Ok(envelope.data)
}

#[derive(Clone)]
pub struct Repository {
    gateway: Arc<dyn Gateway>,
}

impl Repository {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub fn list_all(&self) -> BoxStream<'static, Resource<Vec<Contact>>> {
        let gateway = self.gateway.clone();
        track(async move { fetch_all(gateway.as_ref()).await })
    }

    pub fn get_by_id(&self, id: &str) -> BoxStream<'static, Resource<Contact>> {
        let gateway = self.gateway.clone();
        let id = id.to_string();
        track(async move {
            let data = unwrap_envelope(gateway.get(&id).await?)?;
            data.map(Contact::from).ok_or(RepoError::NotFound("contact"))
        })
    }

    /// Required fields are the caller's business; this sends what it is given.
    pub async fn create(&self, fields: &ContactFields) -> Result<Contact, RepoError> {
        let body = CreateContactRequest {
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            phone_number: fields.phone_number.clone(),
            profile_image_url: fields.image_url.clone(),
        };
        let data = unwrap_envelope(self.gateway.create(&body).await?)?;
        let contact: Contact = data.map(Contact::from).ok_or(RepoError::NotFound("contact"))?;
        debug!(id = %contact.id, "contact created");
        Ok(contact)
    }

    pub async fn update(&self, id: &str, fields: &ContactFields) -> Result<Contact, RepoError> {
        let body = UpdateContactRequest {
            id: id.to_string(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            phone_number: fields.phone_number.clone(),
            profile_image_url: fields.image_url.clone(),
        };
        let data = unwrap_envelope(self.gateway.update(id, &body).await?)?;
        data.map(Contact::from).ok_or(RepoError::NotFound("contact"))
    }

    /// Any 2xx answer counts as a successful removal, whatever the body says.
    pub async fn delete(&self, id: &str) -> Result<(), RepoError> {
        self.gateway.delete(id).await?;
        debug!(%id, "contact deleted");
        Ok(())
    }

    /// Upload a JPEG and return the URL the server hosts it under.
    pub async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, RepoError> {
        debug!(bytes = bytes.len(), "uploading image");
        let data = unwrap_envelope(self.gateway.upload_image(ImagePart::jpeg(bytes)).await?)?;
        let url = data
            .and_then(|upload| upload.image_url)
            .filter(|url| !url.is_empty())
            .ok_or(RepoError::NotFound("image URL"))?;
        debug!(%url, "image uploaded");
        Ok(url)
    }

    /// There is no server-side search: fetch everything and filter locally.
    pub fn search(&self, query: &str) -> BoxStream<'static, Resource<Vec<Contact>>> {
        if search::is_blank(query) {
            return self.list_all();
        }
        let gateway = self.gateway.clone();
        let query = query.to_string();
        track(async move {
            let contacts = fetch_all(gateway.as_ref()).await?;
            Ok(search::filter(contacts, &query))
        })
    }
}

async fn fetch_all(gateway: &dyn Gateway) -> Result<Vec<Contact>, RepoError> {
    let data = unwrap_envelope(gateway.get_all().await?)?;
    Ok(data
        .and_then(|list| list.users)
        .unwrap_or_default()
        .into_iter()
        .map(Contact::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{Fault, MemoryGateway};
    use crate::remote::{UPLOAD_CONTENT_TYPE, UPLOAD_FIELD, UPLOAD_FILE_NAME};
    use crate::resource::outcome;
    use futures::StreamExt;

    fn setup(contacts: &[(&str, &str, &str)]) -> (Arc<MemoryGateway>, Repository) {
        let gateway = Arc::new(MemoryGateway::with_contacts(contacts));
        let repo = Repository::new(gateway.clone());
        (gateway, repo)
    }

    fn fields(first: &str, last: &str, phone: &str) -> ContactFields {
        ContactFields {
            first_name: first.into(),
            last_name: last.into(),
            phone_number: phone.into(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn list_all_emits_loading_then_contacts() {
        let (_, repo) = setup(&[("Ada", "Lovelace", "+1555000")]);
        let states: Vec<_> = repo.list_all().collect().await;
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], Resource::Loading);
        match &states[1] {
            Resource::Success(list) => assert_eq!(list[0].first_name, "Ada"),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_all_maps_failures() {
        let (gateway, repo) = setup(&[]);

        gateway.fail("get_all", Fault::Rejected(vec!["db down".into(), "retry".into()]));
        let err = outcome(repo.list_all()).await.unwrap_err();
        assert_eq!(err.to_string(), "db down, retry");

        gateway.fail("get_all", Fault::Rejected(vec![]));
        let err = outcome(repo.list_all()).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown server error");

        gateway.fail(
            "get_all",
            Fault::Error(RepoError::Http {
                status: 500,
                reason: "Internal Server Error".into(),
            }),
        );
        let err = outcome(repo.list_all()).await.unwrap_err();
        assert!(matches!(err, RepoError::Http { status: 500, .. }));

        gateway.fail("get_all", Fault::Error(RepoError::Transport("offline".into())));
        assert!(outcome(repo.list_all()).await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn list_all_without_users_is_empty() {
        let (gateway, repo) = setup(&[]);
        gateway.fail("get_all", Fault::Empty);
        assert_eq!(outcome(repo.list_all()).await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn get_by_id_without_data_is_not_found() {
        let (gateway, repo) = setup(&[("Ada", "Lovelace", "+1555000")]);
        gateway.fail("get", Fault::Empty);
        let err = outcome(repo.get_by_id("id-1")).await.unwrap_err();
        assert_eq!(err, RepoError::NotFound("contact"));
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() {
        let (_, repo) = setup(&[]);
        let created = repo.create(&fields("Ada", "Lovelace", "+1555000")).await.unwrap();
        assert_eq!(created.first_name, "Ada");
        assert_eq!(created.image_url, None);

        let fetched = outcome(repo.get_by_id(&created.id)).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let (gateway, repo) = setup(&[("Ada", "Lovelace", "+1555000")]);
        let mut changed = fields("Grace", "Hopper", "+1555999");
        changed.image_url = Some("https://img.test/g.jpg".into());
        let updated = repo.update("id-1", &changed).await.unwrap();
        assert_eq!(updated.first_name, "Grace");
        assert_eq!(updated.image_url.as_deref(), Some("https://img.test/g.jpg"));
        assert_eq!(gateway.calls("update:id-1"), 1);
    }

    #[tokio::test]
    async fn rejected_create_is_application_error() {
        let (gateway, repo) = setup(&[]);
        gateway.fail("create", Fault::Rejected(vec!["phone exists".into()]));
        let err = repo.create(&fields("Ada", "", "1")).await.unwrap_err();
        assert_eq!(
            err,
            RepoError::Application {
                messages: vec!["phone exists".into()]
            }
        );
    }

    #[tokio::test]
    async fn delete_accepts_any_success_status() {
        let (gateway, repo) = setup(&[("Ada", "Lovelace", "+1555000")]);
        repo.delete("id-1").await.unwrap();
        assert_eq!(outcome(repo.list_all()).await.unwrap(), vec![]);

        let err = repo.delete("id-1").await.unwrap_err();
        assert!(matches!(err, RepoError::Http { status: 404, .. }));
        assert_eq!(gateway.calls("delete"), 2);
    }

    #[tokio::test]
    async fn upload_sends_single_jpeg_part() {
        let (gateway, repo) = setup(&[]);
        let url = repo.upload_image(vec![0xFF, 0xD8, 0xFF]).await.unwrap();
        assert_eq!(url, "https://img.test/1.jpg");

        let uploads = gateway.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].field, UPLOAD_FIELD);
        assert_eq!(uploads[0].file_name, UPLOAD_FILE_NAME);
        assert_eq!(uploads[0].content_type, UPLOAD_CONTENT_TYPE);
        assert_eq!(uploads[0].bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn upload_without_url_is_not_found() {
        let (gateway, repo) = setup(&[]);
        gateway.fail("upload", Fault::Empty);
        assert_eq!(
            repo.upload_image(vec![1]).await.unwrap_err(),
            RepoError::NotFound("image URL")
        );
    }

    #[tokio::test]
    async fn search_filters_client_side() {
        let (gateway, repo) = setup(&[
            ("Ada", "Lovelace", "+1555000"),
            ("Grace", "Hopper", "+1555999"),
        ]);
        let hits = outcome(repo.search("ada")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].last_name, "Lovelace");

        let hits = outcome(repo.search("999")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first_name, "Grace");

        assert!(outcome(repo.search("777")).await.unwrap().is_empty());
        assert_eq!(gateway.calls("get_all"), 3);
    }

    #[tokio::test]
    async fn blank_search_equals_list_all() {
        let (_, repo) = setup(&[
            ("Ada", "Lovelace", "+1555000"),
            ("Grace", "Hopper", "+1555999"),
        ]);
        let all: Vec<_> = repo.list_all().collect().await;
        let blank: Vec<_> = repo.search("   ").collect().await;
        assert_eq!(all, blank);
    }

    #[tokio::test]
    async fn created_contact_is_found_by_name_but_not_foreign_number() {
        let (_, repo) = setup(&[]);
        repo.create(&fields("Ada", "Lovelace", "+1555000")).await.unwrap();
        assert_eq!(outcome(repo.search("ada")).await.unwrap().len(), 1);
        assert!(outcome(repo.search("999")).await.unwrap().is_empty());
    }
}
