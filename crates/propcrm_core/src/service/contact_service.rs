//! Contact use-case service.
//!
//! # Invariants
//! - Tags and email are normalized before they reach the repository.
//! - Deactivated contacts are kept but skipped by bulk scoring.

use crate::model::contact::{normalize_email, Contact, ContactId};
use crate::repo::contact_repo::{ContactListQuery, ContactRepository};
use crate::repo::{RepoError, RepoResult};

/// Contact service facade over a repository implementation.
pub struct ContactService<R: ContactRepository> {
    repo: R,
}

impl<R: ContactRepository> ContactService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Normalizes and stores a new contact, returning the stored record.
    pub fn create_contact(&self, mut contact: Contact) -> RepoResult<Contact> {
        let tags = std::mem::take(&mut contact.tags);
        contact.set_tags(&tags);
        contact.email = normalize_email(contact.email.as_deref());

        let id = self.repo.create_contact(&contact)?;
        self.require(id)
    }

    /// Replaces all editable fields of an existing contact.
    pub fn update_contact(&self, mut contact: Contact) -> RepoResult<Contact> {
        let tags = std::mem::take(&mut contact.tags);
        contact.set_tags(&tags);
        contact.email = normalize_email(contact.email.as_deref());

        self.repo.update_contact(&contact)?;
        self.require(contact.id)
    }

    pub fn get_contact(&self, id: ContactId) -> RepoResult<Option<Contact>> {
        self.repo.get_contact(id)
    }

    pub fn list_contacts(&self, query: &ContactListQuery) -> RepoResult<Vec<Contact>> {
        self.repo.list_contacts(query)
    }

    /// Records a touchpoint at `at_ms`.
    pub fn touch_contact(&self, id: ContactId, at_ms: i64) -> RepoResult<()> {
        self.repo.touch_contact(id, at_ms)
    }

    pub fn deactivate_contact(&self, id: ContactId) -> RepoResult<Contact> {
        let mut contact = self.require(id)?;
        if contact.is_active {
            contact.is_active = false;
            self.repo.update_contact(&contact)?;
        }
        Ok(contact)
    }

    pub fn delete_contact(&self, id: ContactId) -> RepoResult<()> {
        self.repo.delete_contact(id)
    }

    fn require(&self, id: ContactId) -> RepoResult<Contact> {
        self.repo.get_contact(id)?.ok_or(RepoError::NotFound {
            entity: "contact",
            id,
        })
    }
}
