//! Contact profile: view a single contact, edit it through a draft copy,
//! and mirror it into the device address book.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::lock;
use crate::device::{DeviceBook, SavedFlags};
use crate::error::RepoError;
use crate::model::{Contact, ContactFields};
use crate::repository::Repository;
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    View,
    Edit,
}

/// In-progress edits. Only read while in `Mode::Edit`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    /// Empty means "no image".
    pub image_url: String,
}

impl Draft {
    fn seeded_from(contact: &Contact) -> Self {
        Self {
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            phone_number: contact.phone_number.clone(),
            image_url: contact.image_url.clone().unwrap_or_default(),
        }
    }

    fn to_fields(&self) -> ContactFields {
        ContactFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
            image_url: Some(self.image_url.clone()).filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailState {
    pub is_loading: bool,
    pub error: Option<RepoError>,
    /// Last values confirmed by the server.
    pub contact: Option<Contact>,
    pub mode: Mode,
    pub draft: Draft,
    pub saved_to_device: bool,
}

pub struct DetailController {
    repo: Repository,
    flags: SavedFlags,
    device: Arc<dyn DeviceBook>,
    state: watch::Sender<DetailState>,
    loaded_id: Mutex<Option<String>>,
}

impl DetailController {
    pub fn new(repo: Repository, flags: SavedFlags, device: Arc<dyn DeviceBook>) -> Self {
        let (state, _) = watch::channel(DetailState::default());
        Self {
            repo,
            flags,
            device,
            state,
            loaded_id: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DetailState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut DetailState)) {
        self.state.send_modify(f);
    }

    /// Load contact `id`. Re-initializing with the already loaded id only
    /// switches to edit mode when asked to. Any other id, or an id whose
    /// last load failed, starts over from a fresh state.
    pub async fn initialize(&self, id: &str, edit: bool) {
        let already_loaded = lock(&self.loaded_id).as_deref() == Some(id);
        if already_loaded {
            if edit && self.state().mode != Mode::Edit {
                self.enter_edit();
            }
            return;
        }
        *lock(&self.loaded_id) = None;
        self.load(id, edit).await;
    }

    async fn load(&self, id: &str, edit: bool) {
        let mode = if edit { Mode::Edit } else { Mode::View };
        let mut stream = self.repo.get_by_id(id);
        while let Some(item) = stream.next().await {
            match item {
                Resource::Loading => self.update(|s| {
                    *s = DetailState {
                        is_loading: true,
                        mode,
                        ..DetailState::default()
                    };
                }),
                Resource::Success(contact) => {
                    let saved = self.flags.is_saved(&contact.id).unwrap_or_else(|err| {
                        warn!("failed to read device flag: {err:#}");
                        false
                    });
                    *lock(&self.loaded_id) = Some(id.to_string());
                    self.update(|s| {
                        s.draft = Draft::seeded_from(&contact);
                        s.mode = mode;
                        s.contact = Some(contact);
                        s.saved_to_device = saved;
                        s.is_loading = false;
                        s.error = None;
                    });
                }
                Resource::Error(err) => {
                    warn!(%id, "loading contact failed: {err}");
                    self.update(|s| {
                        s.is_loading = false;
                        s.error = Some(err);
                    });
                }
            }
        }
    }

    pub fn enter_edit(&self) {
        self.update(|s| {
            s.mode = Mode::Edit;
            s.draft = s.contact.as_ref().map(Draft::seeded_from).unwrap_or_default();
        });
    }

    /// Leave edit mode; the draft is dropped and reseeded on the next `enter_edit`.
    pub fn exit_edit(&self) {
        self.update(|s| s.mode = Mode::View);
    }

    pub fn set_first_name(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.draft.first_name = value);
    }

    pub fn set_last_name(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.draft.last_name = value);
    }

    pub fn set_phone_number(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.draft.phone_number = value);
    }

    pub fn set_image_url(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.draft.image_url = value);
    }

    pub fn dismiss_error(&self) {
        self.update(|s| s.error = None);
    }

    /// Submit the draft. On success the server's copy becomes the live
    /// contact and the controller returns to view mode.
    pub async fn save(&self) -> Result<Contact, RepoError> {
        let snapshot = self.state();
        let id = snapshot
            .contact
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or(RepoError::NotFound("contact"))?;
        let fields = snapshot.draft.to_fields();

        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        match self.repo.update(&id, &fields).await {
            Ok(contact) => {
                debug!(%id, "contact saved");
                self.update(|s| {
                    s.contact = Some(contact.clone());
                    s.mode = Mode::View;
                    s.is_loading = false;
                });
                Ok(contact)
            }
            Err(err) => {
                self.update(|s| {
                    s.is_loading = false;
                    s.error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Upload a new photo and put its URL in the draft. Nothing is persisted
    /// on the contact until the next `save`.
    pub async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, RepoError> {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        match self.repo.upload_image(bytes).await {
            Ok(url) => {
                self.update(|s| {
                    s.draft.image_url = url.clone();
                    s.is_loading = false;
                });
                Ok(url)
            }
            Err(err) => {
                self.update(|s| {
                    s.is_loading = false;
                    s.error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Copy the live contact into the device address book, once.
    pub fn save_to_device(&self) -> anyhow::Result<()> {
        let snapshot = self.state();
        if snapshot.saved_to_device {
            debug!("contact already saved to device");
            return Ok(());
        }
        let contact = snapshot
            .contact
            .ok_or_else(|| anyhow!("no contact loaded"))?;

        self.device
            .insert(&contact)
            .with_context(|| format!("failed to save contact {} to device", contact.id))?;
        self.flags.mark_saved(&contact.id)?;
        self.update(|s| s.saved_to_device = true);
        Ok(())
    }

    /// Drop the "saved to device" mark. The device copy itself is left alone.
    pub fn forget_device_copy(&self) -> anyhow::Result<()> {
        let id = self
            .state()
            .contact
            .map(|c| c.id)
            .ok_or_else(|| anyhow!("no contact loaded"))?;
        self.flags.forget(&id)?;
        self.update(|s| s.saved_to_device = false);
        Ok(())
    }
}
