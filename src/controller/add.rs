use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Field, RepoError};
use crate::model::{Contact, ContactFields};
use crate::repository::Repository;
use crate::search::is_blank;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddState {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub profile_image_url: Option<String>,
    pub is_loading: bool,
    pub is_uploading_image: bool,
    pub error: Option<RepoError>,
    pub is_success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddContactEvent {
    FirstNameChanged(String),
    LastNameChanged(String),
    PhoneNumberChanged(String),
    DismissError,
}

/// New-contact form.
pub struct AddContactController {
    repo: Repository,
    state: watch::Sender<AddState>,
}

impl AddContactController {
    pub fn new(repo: Repository) -> Self {
        let (state, _) = watch::channel(AddState::default());
        Self { repo, state }
    }

    pub fn state(&self) -> AddState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AddState> {
        self.state.subscribe()
    }

    pub fn on_event(&self, event: AddContactEvent) {
        self.state.send_modify(|s| match event {
            AddContactEvent::FirstNameChanged(value) => s.first_name = value,
            AddContactEvent::LastNameChanged(value) => s.last_name = value,
            AddContactEvent::PhoneNumberChanged(value) => s.phone_number = value,
            AddContactEvent::DismissError => s.error = None,
        });
    }

    /// Upload the chosen photo; its URL is sent along with the next `save`.
    pub async fn select_image(&self, bytes: Vec<u8>) -> Result<String, RepoError> {
        self.state.send_modify(|s| {
            s.is_uploading_image = true;
            s.error = None;
        });
        let result = self.repo.upload_image(bytes).await;
        self.state.send_modify(|s| {
            s.is_uploading_image = false;
            match &result {
                Ok(url) => s.profile_image_url = Some(url.clone()),
                Err(err) => s.error = Some(err.clone()),
            }
        });
        result
    }

    fn validate(state: &AddState) -> Result<ContactFields, RepoError> {
        if is_blank(&state.first_name) {
            return Err(RepoError::Validation(Field::FirstName));
        }
        if is_blank(&state.phone_number) {
            return Err(RepoError::Validation(Field::PhoneNumber));
        }
        Ok(ContactFields {
            first_name: state.first_name.trim().to_string(),
            last_name: state.last_name.trim().to_string(),
            phone_number: state.phone_number.trim().to_string(),
            image_url: state.profile_image_url.clone(),
        })
    }

    /// Validate the form and create the contact. Blank required fields fail
    /// without touching the network.
    pub async fn save(&self) -> Result<Contact, RepoError> {
        let checked = Self::validate(&self.state());
        let fields = match checked {
            Ok(fields) => fields,
            Err(err) => {
                debug!("add form rejected: {err}");
                self.state.send_modify(|s| s.error = Some(err.clone()));
                return Err(err);
            }
        };

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        let result = self.repo.create(&fields).await;
        self.state.send_modify(|s| {
            s.is_loading = false;
            match &result {
                Ok(_) => s.is_success = true,
                Err(err) => s.error = Some(err.clone()),
            }
        });
        if let Err(err) = &result {
            warn!("creating contact failed: {err}");
        }
        result
    }
}
