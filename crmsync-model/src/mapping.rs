//! Field tables mapping local entity data onto remote attributes.
//!
//! The generic push/pull strategies are driven entirely by these tables; adding
//! a field to the sync means adding a row here.

use crate::EXTERNAL_REFERENCE;
use crmsync_types::EntityType;

/// One synchronized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    /// Top-level key in `Entity::data`.
    pub local: &'static str,
    /// Attribute name in the remote CRM.
    pub remote: &'static str,
    /// Must be non-empty before a push (field-value validation).
    pub required: bool,
    /// Computed by the remote CRM; pulled but never pushed.
    pub read_only: bool,
    /// Set when the field holds a local entity id that maps to a remote id.
    pub reference: Option<EntityType>,
}

impl FieldMapping {
    const fn simple(local: &'static str, remote: &'static str) -> Self {
        Self {
            local,
            remote,
            required: false,
            read_only: false,
            reference: None,
        }
    }

    /// Shorthand for an optional, writable field.
    pub const fn plain(local: &'static str, remote: &'static str) -> Self {
        Self::simple(local, remote)
    }

    /// Shorthand for a required, writable field.
    pub const fn required(local: &'static str, remote: &'static str) -> Self {
        Self {
            required: true,
            ..Self::simple(local, remote)
        }
    }

    /// Shorthand for a field the remote CRM computes.
    pub const fn read_only(local: &'static str, remote: &'static str) -> Self {
        Self {
            read_only: true,
            ..Self::simple(local, remote)
        }
    }

    /// Shorthand for a link to another entity.
    pub const fn reference(local: &'static str, remote: &'static str, target: EntityType) -> Self {
        Self {
            reference: Some(target),
            ..Self::simple(local, remote)
        }
    }
}

/// How one entity type is represented in the remote CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMapping {
    pub entity_type: EntityType,
    /// Remote entity set (collection) name.
    pub remote_entity: &'static str,
    /// JSON pointer of the display name in `Entity::data`.
    pub name_field: &'static str,
    /// Remote attributes used to narrow a candidate search before correlation.
    pub search_keys: &'static [&'static str],
    pub fields: &'static [FieldMapping],
}

impl EntityMapping {
    /// Fields that may be sent to the remote CRM.
    pub fn writable(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.iter().filter(|f| !f.read_only)
    }

    /// Fields that link to other entities.
    pub fn references(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.iter().filter(|f| f.reference.is_some())
    }

    /// Looks up a field by its remote attribute name.
    pub fn by_remote(&self, remote: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.remote == remote)
    }
}

const GENERIC_SEARCH: &[&str] = &[EXTERNAL_REFERENCE];

static COMPANY: EntityMapping = EntityMapping {
    entity_type: EntityType::Company,
    remote_entity: "Accounts",
    name_field: "/name",
    search_keys: &["name"],
    fields: &[
        FieldMapping::required("name", "name"),
        FieldMapping::plain("email", "email"),
        FieldMapping::plain("phone", "phone"),
        FieldMapping::plain("website", "website"),
        FieldMapping::plain("industry", "industry"),
        FieldMapping::read_only("customer_number", "customer_number"),
    ],
};

static CONTACT: EntityMapping = EntityMapping {
    entity_type: EntityType::Contact,
    remote_entity: "Contacts",
    name_field: "/last_name",
    search_keys: &["email"],
    fields: &[
        FieldMapping::plain("first_name", "first_name"),
        FieldMapping::required("last_name", "last_name"),
        FieldMapping::required("email", "email"),
        FieldMapping::plain("phone", "phone"),
        FieldMapping::reference("company_id", "account_id", EntityType::Company),
    ],
};

static OPPORTUNITY: EntityMapping = EntityMapping {
    entity_type: EntityType::Opportunity,
    remote_entity: "Opportunities",
    name_field: "/name",
    search_keys: GENERIC_SEARCH,
    fields: &[
        FieldMapping::required("name", "name"),
        FieldMapping::plain("value", "value"),
        FieldMapping::plain("close_date", "closing_date"),
        FieldMapping::plain("step", "sales_step"),
        FieldMapping::reference("company_id", "account_id", EntityType::Company),
        FieldMapping::reference("contact_id", "contact_id", EntityType::Contact),
        FieldMapping::read_only("weighted_value", "weighted_value"),
    ],
};

static QUOTE: EntityMapping = EntityMapping {
    entity_type: EntityType::Quote,
    remote_entity: "Quotes",
    name_field: "/name",
    search_keys: GENERIC_SEARCH,
    fields: &[
        FieldMapping::required("name", "name"),
        FieldMapping::reference("opportunity_id", "opportunity_id", EntityType::Opportunity),
        FieldMapping::reference("currency_id", "currency_id", EntityType::Currency),
        FieldMapping::read_only("total", "total"),
    ],
};

static TASK: EntityMapping = EntityMapping {
    entity_type: EntityType::Task,
    remote_entity: "Tasks",
    name_field: "/subject",
    search_keys: GENERIC_SEARCH,
    fields: &[
        FieldMapping::required("subject", "subject"),
        FieldMapping::plain("due_date", "due_date"),
        FieldMapping::plain("status", "status"),
        FieldMapping::reference("company_id", "account_id", EntityType::Company),
        FieldMapping::reference("opportunity_id", "opportunity_id", EntityType::Opportunity),
    ],
};

static APPOINTMENT: EntityMapping = EntityMapping {
    entity_type: EntityType::Appointment,
    remote_entity: "Appointments",
    name_field: "/subject",
    search_keys: GENERIC_SEARCH,
    fields: &[
        FieldMapping::required("subject", "subject"),
        FieldMapping::required("start_at", "start_date"),
        FieldMapping::plain("end_at", "end_date"),
        FieldMapping::reference("contact_id", "contact_id", EntityType::Contact),
    ],
};

static PRODUCT: EntityMapping = EntityMapping {
    entity_type: EntityType::Product,
    remote_entity: "Products",
    name_field: "/name",
    search_keys: GENERIC_SEARCH,
    fields: &[
        FieldMapping::required("name", "name"),
        FieldMapping::plain("sku", "sku"),
        FieldMapping::plain("unit_price", "unit_price"),
    ],
};

static CURRENCY: EntityMapping = EntityMapping {
    entity_type: EntityType::Currency,
    remote_entity: "Currencies",
    name_field: "/iso_code",
    search_keys: &["code"],
    fields: &[
        FieldMapping::required("iso_code", "code"),
        FieldMapping::plain("symbol", "symbol"),
        FieldMapping::read_only("exchange_rate", "exchange_rate"),
    ],
};

/// Returns the mapping table for an entity type.
pub fn mapping_for(entity_type: EntityType) -> &'static EntityMapping {
    match entity_type {
        EntityType::Company => &COMPANY,
        EntityType::Contact => &CONTACT,
        EntityType::Opportunity => &OPPORTUNITY,
        EntityType::Quote => &QUOTE,
        EntityType::Task => &TASK,
        EntityType::Appointment => &APPOINTMENT,
        EntityType::Product => &PRODUCT,
        EntityType::Currency => &CURRENCY,
    }
}
