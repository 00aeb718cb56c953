use serde::{Deserialize, Serialize};

use goldline_core::{CustomerId, DomainError, DomainResult, Entity};

/// Contact information for a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Customer as stored in the customer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    name: String,
    contact: ContactInfo,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>, contact: ContactInfo) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("customer_name", "name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.trim().to_string(),
            contact,
        })
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn phone(&self) -> Option<&str> {
        self.contact.phone.as_deref()
    }

    /// Case-insensitive match on name, or substring match on phone digits.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        if self.name.to_lowercase().contains(&query.to_lowercase()) {
            return true;
        }
        let digits: String = query.chars().filter(char::is_ascii_digit).collect();
        !digits.is_empty()
            && self
                .phone()
                .map(|p| p.chars().filter(char::is_ascii_digit).collect::<String>())
                .is_some_and(|p| p.contains(&digits))
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Customer reference bound into a checkout.
///
/// Carries its own copy of name and phone; it is never re-resolved against
/// the directory once bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: String,
}

impl CustomerRef {
    pub fn new(
        customer_id: CustomerId,
        name: impl Into<String>,
        phone: impl Into<String>,
    ) -> DomainResult<Self> {
        let r = Self {
            customer_id,
            name: name.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
        };
        r.validate()?;
        Ok(r)
    }

    /// Snapshot a directory customer. Fails if the record has no phone.
    pub fn from_customer(customer: &Customer) -> DomainResult<Self> {
        let phone = customer.phone().unwrap_or_default();
        Self::new(customer.id_typed(), customer.name(), phone)
    }

    /// Whether the reference is self-contained (non-empty name and phone).
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("customer_name", "customer name is required"));
        }
        if self.phone.trim().is_empty() {
            return Err(DomainError::validation("customer_phone", "customer phone is required"));
        }
        Ok(())
    }
}
