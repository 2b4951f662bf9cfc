use serde::{Deserialize, Serialize};

/// A contact as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub image_url: Option<String>,
}

impl Contact {
    /// First and last name joined by a single space. The separator is kept
    /// even when the last name is empty.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initials(&self) -> String {
        let mut out = String::new();
        for part in [&self.first_name, &self.last_name] {
            if let Some(ch) = part.chars().next() {
                out.extend(ch.to_uppercase());
            }
        }
        out
    }
}

/// Uniform response wrapper used by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: Option<bool>,
    pub messages: Option<Vec<String>>,
    pub status: Option<i32>,
    pub data: Option<T>,
}

#[cfg(test)]
impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: Some(true),
            messages: None,
            status: Some(200),
            data: Some(data),
        }
    }

    pub fn failed(messages: Vec<String>) -> Self {
        Self {
            success: Some(false),
            messages: Some(messages),
            status: Some(400),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl From<ContactDto> for Contact {
    fn from(dto: ContactDto) -> Self {
        Contact {
            id: dto.id,
            first_name: dto.first_name,
            last_name: dto.last_name,
            phone_number: dto.phone_number,
            image_url: dto.profile_image_url.filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListData {
    pub users: Option<Vec<ContactDto>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadData {
    pub image_url: Option<String>,
}

/// Body of `POST /api/User`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// Body of `PUT /api/User/{id}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// Field values submitted when creating or updating a contact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactFields {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub image_url: Option<String>,
}
