//! Mirroring server contacts into the device's own address book.
//!
//! The address book itself sits behind `DeviceBook`; on the desktop it is a
//! directory of vCard 4.0 files. Whether a contact has been mirrored is
//! remembered per contact id in the `phone_contacts` namespace.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;
use vcard4::property::{DateTimeProperty, TextOrUriProperty, TextProperty};
use vcard4::{parse, DateTime, Vcard};

use crate::db::{Namespace, SharedDatabase};
use crate::model::Contact;

pub const NAMESPACE: &str = "phone_contacts";

pub trait DeviceBook: Send + Sync {
    /// Add the contact to the device address book.
    fn insert(&self, contact: &Contact) -> Result<()>;
}

/// Write-once flags recording which contacts were copied to the device.
#[derive(Clone)]
pub struct SavedFlags {
    prefs: Namespace,
}

impl SavedFlags {
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            prefs: Namespace::new(db, NAMESPACE),
        }
    }

    fn key(id: &str) -> String {
        format!("saved_{id}")
    }

    pub fn is_saved(&self, id: &str) -> Result<bool> {
        self.prefs.get_bool(&Self::key(id))
    }

    pub fn mark_saved(&self, id: &str) -> Result<()> {
        self.prefs.put_bool(&Self::key(id), true)
    }

    pub fn forget(&self, id: &str) -> Result<()> {
        self.prefs.remove(&Self::key(id))
    }
}

/// Address book kept as one `.vcf` file per contact.
pub struct VcardBook {
    dir: PathBuf,
}

impl VcardBook {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn card_path(&self, contact: &Contact) -> PathBuf {
        self.dir.join(format!("{}.vcf", sanitize_filename(&contact.id)))
    }
}

impl DeviceBook for VcardBook {
    fn insert(&self, contact: &Contact) -> Result<()> {
        let card = build_card(contact)?;
        let path = self.card_path(contact);
        write_atomic(&path, card.to_string().as_bytes())
    }
}

/// Escape a text value for a vCard content line.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

pub fn build_card(contact: &Contact) -> Result<Vcard> {
    let display = contact.full_name().trim().to_string();
    let text = format!(
        "BEGIN:VCARD\r\nVERSION:4.0\r\nFN:{}\r\nN:{};{};;;\r\nTEL:{}\r\nEND:VCARD\r\n",
        escape_text(&display),
        escape_text(&contact.last_name),
        escape_text(&contact.first_name),
        escape_text(&contact.phone_number),
    );

    let mut cards = parse(&text)
        .map_err(|err| anyhow!(err))
        .with_context(|| format!("failed to build vCard for contact {}", contact.id))?;
    let mut card = cards
        .pop()
        .ok_or_else(|| anyhow!("no vCard produced for contact {}", contact.id))?;

    card.uid = Some(TextOrUriProperty::Text(TextProperty {
        group: None,
        value: Uuid::new_v4().to_string(),
        parameters: None,
    }));
    card.rev = Some(DateTimeProperty {
        group: None,
        value: DateTime::now_utc(),
        parameters: None,
    });
    Ok(card)
}

fn sanitize_filename(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Write through a sibling temp file and rename it into place.
fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| anyhow!("target path has no parent: {}", target.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent dir {}", parent.display()))?;

    let name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("contact.vcf");
    let mut counter: u32 = 0;
    let temp_path = loop {
        let candidate = parent.join(format!(".{name}.{counter}.tmp"));
        if !candidate.exists() {
            break candidate;
        }
        counter += 1;
    };

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("failed to create {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", temp_path.display()))?;
    }

    fs::rename(&temp_path, target).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            target.display()
        )
    })
}
