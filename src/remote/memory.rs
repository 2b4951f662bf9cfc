//! In-memory phone-book server used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RepoError;
use crate::model::{
    ContactDto, CreateContactRequest, Envelope, ImageUploadData, UpdateContactRequest,
    UserListData,
};
use crate::remote::{Gateway, ImagePart};

/// Canned misbehaviour for one operation.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The call fails before an envelope is produced.
    Error(RepoError),
    /// 2xx with `success = false`.
    Rejected(Vec<String>),
    /// 2xx with `success = true` and no `data`.
    Empty,
}

#[derive(Default)]
pub struct MemoryGateway {
    contacts: Mutex<Vec<ContactDto>>,
    next_id: AtomicU64,
    calls: Mutex<Vec<String>>,
    faults: Mutex<HashMap<&'static str, Fault>>,
    get_all_delays: Mutex<VecDeque<Duration>>,
    uploads: Mutex<Vec<ImagePart>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(contacts: &[(&str, &str, &str)]) -> Self {
        let gateway = Self::new();
        for (first, last, phone) in contacts {
            gateway.insert(first, last, phone);
        }
        gateway
    }

    pub fn insert(&self, first: &str, last: &str, phone: &str) -> String {
        let id = self.allocate_id();
        self.contacts.lock().unwrap().push(ContactDto {
            id: id.clone(),
            created_at: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone_number: phone.to_string(),
            profile_image_url: None,
        });
        id
    }

    /// Make every later call of `op` misbehave until `heal` is called.
    pub fn fail(&self, op: &'static str, fault: Fault) {
        self.faults.lock().unwrap().insert(op, fault);
    }

    pub fn heal(&self, op: &'static str) {
        self.faults.lock().unwrap().remove(op);
    }

    /// Queue a latency for the next `get_all` calls, in order.
    pub fn delay_get_all(&self, delay: Duration) {
        self.get_all_delays.lock().unwrap().push_back(delay);
    }

    /// Number of recorded calls whose name starts with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<ImagePart> {
        self.uploads.lock().unwrap().clone()
    }

    fn allocate_id(&self) -> String {
        format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fault(&self, op: &'static str) -> Option<Fault> {
        self.faults.lock().unwrap().get(op).cloned()
    }

    fn find(&self, id: &str) -> Option<ContactDto> {
        self.contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }
}

fn not_found() -> RepoError {
    RepoError::Http {
        status: 404,
        reason: "Not Found".into(),
    }
}

/// Apply a configured fault, or hand back `data` wrapped in a success envelope.
fn respond<T>(fault: Option<Fault>, data: impl FnOnce() -> Result<T, RepoError>) -> Result<Envelope<T>, RepoError> {
    match fault {
        Some(Fault::Error(err)) => Err(err),
        Some(Fault::Rejected(messages)) => Ok(Envelope::failed(messages)),
        Some(Fault::Empty) => Ok(Envelope {
            success: Some(true),
            messages: None,
            status: Some(200),
            data: None,
        }),
        None => data().map(Envelope::ok),
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn get_all(&self) -> Result<Envelope<UserListData>, RepoError> {
        self.record("get_all".into());
        let delay = self.get_all_delays.lock().unwrap().pop_front();
        // Snapshot before sleeping so a delayed answer carries the data of its issue time
        let snapshot = self.contacts.lock().unwrap().clone();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        respond(self.fault("get_all"), || {
            Ok(UserListData {
                users: Some(snapshot),
            })
        })
    }

    async fn get(&self, id: &str) -> Result<Envelope<ContactDto>, RepoError> {
        self.record(format!("get:{id}"));
        respond(self.fault("get"), || self.find(id).ok_or_else(not_found))
    }

    async fn create(&self, body: &CreateContactRequest) -> Result<Envelope<ContactDto>, RepoError> {
        self.record("create".into());
        respond(self.fault("create"), || {
            let dto = ContactDto {
                id: self.allocate_id(),
                created_at: Some("2024-05-01T12:00:00Z".into()),
                first_name: body.first_name.clone(),
                last_name: body.last_name.clone(),
                phone_number: body.phone_number.clone(),
                profile_image_url: body.profile_image_url.clone(),
            };
            self.contacts.lock().unwrap().push(dto.clone());
            Ok(dto)
        })
    }

    async fn update(
        &self,
        id: &str,
        body: &UpdateContactRequest,
    ) -> Result<Envelope<ContactDto>, RepoError> {
        self.record(format!("update:{id}"));
        respond(self.fault("update"), || {
            let mut contacts = self.contacts.lock().unwrap();
            let existing = contacts
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(not_found)?;
            existing.first_name = body.first_name.clone();
            existing.last_name = body.last_name.clone();
            existing.phone_number = body.phone_number.clone();
            existing.profile_image_url = body.profile_image_url.clone();
            Ok(existing.clone())
        })
    }

    async fn delete(&self, id: &str) -> Result<(), RepoError> {
        self.record(format!("delete:{id}"));
        if let Some(Fault::Error(err)) = self.fault("delete") {
            return Err(err);
        }
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        if contacts.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn upload_image(&self, part: ImagePart) -> Result<Envelope<ImageUploadData>, RepoError> {
        self.record("upload".into());
        respond(self.fault("upload"), || {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(part);
            Ok(ImageUploadData {
                image_url: Some(format!("https://img.test/{}.jpg", uploads.len())),
            })
        })
    }
}
