use serde::{Deserialize, Serialize};

wire_enum!(
    /// Reference-data categories managed by the administration dictionaries.
    DictionaryType,
    Unknown {
        Department => "department",
        Position => "position",
        EquipmentCategory => "equipment_category",
        LicenseType => "license_type",
        TicketCategory => "ticket_category",
        DocumentType => "document_type",
    }
);

impl DictionaryType {
    /// Unknown categories are labelled with their raw value.
    pub fn label(&self) -> &str {
        match self {
            Self::Department => "Departments",
            Self::Position => "Positions",
            Self::EquipmentCategory => "Equipment categories",
            Self::LicenseType => "License types",
            Self::TicketCategory => "Ticket categories",
            Self::DocumentType => "Document types",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub dictionary_type: DictionaryType,
    pub value: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl DictionaryEntry {
    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}
