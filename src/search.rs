use crate::model::Contact;

/// A query made only of whitespace means "no filter".
pub fn is_blank(query: &str) -> bool {
    query.trim().is_empty()
}

/// Name matches ignore case; phone numbers are matched literally.
pub fn matches(contact: &Contact, query: &str) -> bool {
    contact
        .full_name()
        .to_lowercase()
        .contains(&query.to_lowercase())
        || contact.phone_number.contains(query)
}

/// Keep the contacts matching `query`, preserving server order.
pub fn filter(contacts: Vec<Contact>, query: &str) -> Vec<Contact> {
    if is_blank(query) {
        return contacts;
    }
    contacts
        .into_iter()
        .filter(|contact| matches(contact, query))
        .collect()
}
