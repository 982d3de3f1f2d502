use serde::Serialize;

use crate::{
    bounded,
    brevo::{BrevoClient, Result, error::BrevoError},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateContactRequest<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    list_ids: Option<[u64; 1]>,
    update_enabled: bool,
}

impl BrevoClient {
    /// Creates a newsletter contact.
    ///
    /// An existing contact fails with [`BrevoError::DuplicateContact`],
    /// contacts are never updated.
    pub async fn create_contact(&self, email: &str) -> Result<()> {
        let request = CreateContactRequest {
            email,
            list_ids: self.config.list_id.map(|id| [id]),
            update_enabled: false,
        };
        match bounded::call("brevo_create_contact", self.timeout, self.post("contacts", &request))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.code().as_deref() == Some("duplicate_parameter") => {
                Err(BrevoError::DuplicateContact)
            }
            Err(e) => Err(e),
        }
    }
}
