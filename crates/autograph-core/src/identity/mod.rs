//! Structured identity data decoded from card data objects.
//!
//! A card exposes its contents as labeled binary data objects. This module
//! defines the decoded representation ([`CardIdentityRecord`] with an
//! embedded [`AddressRecord`]) and the exhaustive label table
//! ([`IdentityField`]) mapping raw middleware labels to record fields.
//! Adding or removing a field is a compile-time-visible change: every
//! variant must name its label and its accessor.
//!
//! The decoding itself lives in [`decoder`]; the composite address blob
//! parser in [`address`]; the photo encoding in [`photo`].

use serde::{Deserialize, Serialize};

pub mod address;
pub mod decoder;
pub mod photo;

/// Decoded address, carried on the card as one composite binary blob.
///
/// All fields are optional: a truncated or malformed blob yields a partial
/// record, never garbage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// Street name and house number, one field on the card.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_street_and_number: Option<String>,
    /// Postal code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_zip: Option<String>,
    /// Municipality name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_municipality: Option<String>,
}

/// Identity record decoded from a card's data objects.
///
/// Every field is optional: absent or undecodable objects are simply
/// missing. Field names follow the wire shape consumed by the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIdentityRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chip_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_begin_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuing_municipality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstnames: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_letter_of_third_given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nobility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_of_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_and_country_of_protection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_permit_mention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_vat_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_vat_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_file_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brexit_mention_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brexit_mention_2: Option<String>,
    /// Address fields, decoded from the composite `ADDRESS_FILE` blob or
    /// from individually labeled objects where the card exposes them.
    #[serde(flatten)]
    pub address: AddressRecord,
}

/// The exhaustive mapping from middleware labels to record fields.
///
/// Unmapped labels are dropped silently by the decoder; mapped labels go
/// through [`IdentityField::set`], so a label can never land in the wrong
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityField {
    CardNumber,
    ChipNumber,
    ValidityBeginDate,
    ValidityEndDate,
    IssuingMunicipality,
    NationalNumber,
    Surname,
    Firstnames,
    FirstLetterOfThirdGivenName,
    Nationality,
    LocationOfBirth,
    DateOfBirth,
    Gender,
    Nobility,
    DocumentType,
    SpecialStatus,
    Duplicata,
    SpecialOrganization,
    MemberOfFamily,
    DateAndCountryOfProtection,
    WorkPermitMention,
    EmployerVat1,
    EmployerVat2,
    RegionalFileNumber,
    BrexitMention1,
    BrexitMention2,
    AddressStreetAndNumber,
    AddressZip,
    AddressMunicipality,
}

impl IdentityField {
    /// All mapped fields, in card order.
    pub const ALL: [Self; 29] = [
        Self::CardNumber,
        Self::ChipNumber,
        Self::ValidityBeginDate,
        Self::ValidityEndDate,
        Self::IssuingMunicipality,
        Self::NationalNumber,
        Self::Surname,
        Self::Firstnames,
        Self::FirstLetterOfThirdGivenName,
        Self::Nationality,
        Self::LocationOfBirth,
        Self::DateOfBirth,
        Self::Gender,
        Self::Nobility,
        Self::DocumentType,
        Self::SpecialStatus,
        Self::Duplicata,
        Self::SpecialOrganization,
        Self::MemberOfFamily,
        Self::DateAndCountryOfProtection,
        Self::WorkPermitMention,
        Self::EmployerVat1,
        Self::EmployerVat2,
        Self::RegionalFileNumber,
        Self::BrexitMention1,
        Self::BrexitMention2,
        Self::AddressStreetAndNumber,
        Self::AddressZip,
        Self::AddressMunicipality,
    ];

    /// The raw middleware label for this field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CardNumber => "card_number",
            Self::ChipNumber => "chip_number",
            Self::ValidityBeginDate => "validity_begin_date",
            Self::ValidityEndDate => "validity_end_date",
            Self::IssuingMunicipality => "issuing_municipality",
            Self::NationalNumber => "national_number",
            Self::Surname => "surname",
            Self::Firstnames => "firstnames",
            Self::FirstLetterOfThirdGivenName => "first_letter_of_third_given_name",
            Self::Nationality => "nationality",
            Self::LocationOfBirth => "location_of_birth",
            Self::DateOfBirth => "date_of_birth",
            Self::Gender => "gender",
            Self::Nobility => "nobility",
            Self::DocumentType => "document_type",
            Self::SpecialStatus => "special_status",
            Self::Duplicata => "duplicata",
            Self::SpecialOrganization => "special_organization",
            Self::MemberOfFamily => "member_of_family",
            Self::DateAndCountryOfProtection => "date_and_country_of_protection",
            Self::WorkPermitMention => "work_permit_mention",
            Self::EmployerVat1 => "employer_vat_1",
            Self::EmployerVat2 => "employer_vat_2",
            Self::RegionalFileNumber => "regional_file_number",
            Self::BrexitMention1 => "brexit_mention_1",
            Self::BrexitMention2 => "brexit_mention_2",
            Self::AddressStreetAndNumber => "address_street_and_number",
            Self::AddressZip => "address_zip",
            Self::AddressMunicipality => "address_municipality",
        }
    }

    /// Resolves a raw label to its field, if mapped.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.label() == label)
    }

    /// Stores a decoded value into the record slot this field names.
    pub fn set(self, record: &mut CardIdentityRecord, value: String) {
        *self.slot_mut(record) = Some(value);
    }

    /// Reads the record slot this field names.
    #[must_use]
    pub fn get(self, record: &CardIdentityRecord) -> Option<&str> {
        self.slot(record).as_deref()
    }

    fn slot(self, record: &CardIdentityRecord) -> &Option<String> {
        match self {
            Self::CardNumber => &record.card_number,
            Self::ChipNumber => &record.chip_number,
            Self::ValidityBeginDate => &record.validity_begin_date,
            Self::ValidityEndDate => &record.validity_end_date,
            Self::IssuingMunicipality => &record.issuing_municipality,
            Self::NationalNumber => &record.national_number,
            Self::Surname => &record.surname,
            Self::Firstnames => &record.firstnames,
            Self::FirstLetterOfThirdGivenName => &record.first_letter_of_third_given_name,
            Self::Nationality => &record.nationality,
            Self::LocationOfBirth => &record.location_of_birth,
            Self::DateOfBirth => &record.date_of_birth,
            Self::Gender => &record.gender,
            Self::Nobility => &record.nobility,
            Self::DocumentType => &record.document_type,
            Self::SpecialStatus => &record.special_status,
            Self::Duplicata => &record.duplicata,
            Self::SpecialOrganization => &record.special_organization,
            Self::MemberOfFamily => &record.member_of_family,
            Self::DateAndCountryOfProtection => &record.date_and_country_of_protection,
            Self::WorkPermitMention => &record.work_permit_mention,
            Self::EmployerVat1 => &record.employer_vat_1,
            Self::EmployerVat2 => &record.employer_vat_2,
            Self::RegionalFileNumber => &record.regional_file_number,
            Self::BrexitMention1 => &record.brexit_mention_1,
            Self::BrexitMention2 => &record.brexit_mention_2,
            Self::AddressStreetAndNumber => &record.address.address_street_and_number,
            Self::AddressZip => &record.address.address_zip,
            Self::AddressMunicipality => &record.address.address_municipality,
        }
    }

    fn slot_mut(self, record: &mut CardIdentityRecord) -> &mut Option<String> {
        match self {
            Self::CardNumber => &mut record.card_number,
            Self::ChipNumber => &mut record.chip_number,
            Self::ValidityBeginDate => &mut record.validity_begin_date,
            Self::ValidityEndDate => &mut record.validity_end_date,
            Self::IssuingMunicipality => &mut record.issuing_municipality,
            Self::NationalNumber => &mut record.national_number,
            Self::Surname => &mut record.surname,
            Self::Firstnames => &mut record.firstnames,
            Self::FirstLetterOfThirdGivenName => &mut record.first_letter_of_third_given_name,
            Self::Nationality => &mut record.nationality,
            Self::LocationOfBirth => &mut record.location_of_birth,
            Self::DateOfBirth => &mut record.date_of_birth,
            Self::Gender => &mut record.gender,
            Self::Nobility => &mut record.nobility,
            Self::DocumentType => &mut record.document_type,
            Self::SpecialStatus => &mut record.special_status,
            Self::Duplicata => &mut record.duplicata,
            Self::SpecialOrganization => &mut record.special_organization,
            Self::MemberOfFamily => &mut record.member_of_family,
            Self::DateAndCountryOfProtection => &mut record.date_and_country_of_protection,
            Self::WorkPermitMention => &mut record.work_permit_mention,
            Self::EmployerVat1 => &mut record.employer_vat_1,
            Self::EmployerVat2 => &mut record.employer_vat_2,
            Self::RegionalFileNumber => &mut record.regional_file_number,
            Self::BrexitMention1 => &mut record.brexit_mention_1,
            Self::BrexitMention2 => &mut record.brexit_mention_2,
            Self::AddressStreetAndNumber => &mut record.address.address_street_and_number,
            Self::AddressZip => &mut record.address.address_zip,
            Self::AddressMunicipality => &mut record.address.address_municipality,
        }
    }
}
