use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every named field of the admission wizard.
///
/// Fields are grouped by the wizard step that edits them. The wire key is the
/// camelCase name used by the portal API and by stored drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    // Step 1: personal
    FirstName,
    MiddleName,
    LastName,
    DateOfBirth,
    Gender,
    BloodGroup,
    Nationality,
    Religion,
    Category,
    AadharNumber,
    MotherTongue,
    MaritalStatus,
    // Step 2: contact and family
    Email,
    Phone,
    AlternatePhone,
    FatherName,
    FatherOccupation,
    FatherPhone,
    MotherName,
    MotherOccupation,
    MotherPhone,
    GuardianName,
    GuardianPhone,
    GuardianRelation,
    AnnualIncome,
    // Step 3: addresses
    PresentAddressLine1,
    PresentAddressLine2,
    PresentCity,
    PresentDistrict,
    PresentState,
    PresentPincode,
    PresentCountry,
    SameAsPresent,
    PermanentAddressLine1,
    PermanentAddressLine2,
    PermanentCity,
    PermanentDistrict,
    PermanentState,
    PermanentPincode,
    PermanentCountry,
    // Step 4: education
    TenthBoard,
    TenthSchool,
    TenthYear,
    TenthPercentage,
    TwelfthBoard,
    TwelfthSchool,
    TwelfthYear,
    TwelfthPercentage,
    TwelfthStream,
    PreviousInstitution,
    GapYears,
    // Step 5: academic
    ProgramLevel,
    Department,
    Course,
    Shift,
    AdmissionYear,
    HostelRequired,
    TransportRequired,
    // Step 6: documents and declaration
    PlaceOfDeclaration,
    DeclarationAccepted,
}

impl FormField {
    pub const ALL: [FormField; 60] = [
        FormField::FirstName,
        FormField::MiddleName,
        FormField::LastName,
        FormField::DateOfBirth,
        FormField::Gender,
        FormField::BloodGroup,
        FormField::Nationality,
        FormField::Religion,
        FormField::Category,
        FormField::AadharNumber,
        FormField::MotherTongue,
        FormField::MaritalStatus,
        FormField::Email,
        FormField::Phone,
        FormField::AlternatePhone,
        FormField::FatherName,
        FormField::FatherOccupation,
        FormField::FatherPhone,
        FormField::MotherName,
        FormField::MotherOccupation,
        FormField::MotherPhone,
        FormField::GuardianName,
        FormField::GuardianPhone,
        FormField::GuardianRelation,
        FormField::AnnualIncome,
        FormField::PresentAddressLine1,
        FormField::PresentAddressLine2,
        FormField::PresentCity,
        FormField::PresentDistrict,
        FormField::PresentState,
        FormField::PresentPincode,
        FormField::PresentCountry,
        FormField::SameAsPresent,
        FormField::PermanentAddressLine1,
        FormField::PermanentAddressLine2,
        FormField::PermanentCity,
        FormField::PermanentDistrict,
        FormField::PermanentState,
        FormField::PermanentPincode,
        FormField::PermanentCountry,
        FormField::TenthBoard,
        FormField::TenthSchool,
        FormField::TenthYear,
        FormField::TenthPercentage,
        FormField::TwelfthBoard,
        FormField::TwelfthSchool,
        FormField::TwelfthYear,
        FormField::TwelfthPercentage,
        FormField::TwelfthStream,
        FormField::PreviousInstitution,
        FormField::GapYears,
        FormField::ProgramLevel,
        FormField::Department,
        FormField::Course,
        FormField::Shift,
        FormField::AdmissionYear,
        FormField::HostelRequired,
        FormField::TransportRequired,
        FormField::PlaceOfDeclaration,
        FormField::DeclarationAccepted,
    ];

    /// Present-address fields paired with their permanent-address counterpart.
    pub const ADDRESS_PAIRS: [(FormField, FormField); 7] = [
        (FormField::PresentAddressLine1, FormField::PermanentAddressLine1),
        (FormField::PresentAddressLine2, FormField::PermanentAddressLine2),
        (FormField::PresentCity, FormField::PermanentCity),
        (FormField::PresentDistrict, FormField::PermanentDistrict),
        (FormField::PresentState, FormField::PermanentState),
        (FormField::PresentPincode, FormField::PermanentPincode),
        (FormField::PresentCountry, FormField::PermanentCountry),
    ];

    pub fn key(self) -> &'static str {
        match self {
            FormField::FirstName => "firstName",
            FormField::MiddleName => "middleName",
            FormField::LastName => "lastName",
            FormField::DateOfBirth => "dateOfBirth",
            FormField::Gender => "gender",
            FormField::BloodGroup => "bloodGroup",
            FormField::Nationality => "nationality",
            FormField::Religion => "religion",
            FormField::Category => "category",
            FormField::AadharNumber => "aadharNumber",
            FormField::MotherTongue => "motherTongue",
            FormField::MaritalStatus => "maritalStatus",
            FormField::Email => "email",
            FormField::Phone => "phone",
            FormField::AlternatePhone => "alternatePhone",
            FormField::FatherName => "fatherName",
            FormField::FatherOccupation => "fatherOccupation",
            FormField::FatherPhone => "fatherPhone",
            FormField::MotherName => "motherName",
            FormField::MotherOccupation => "motherOccupation",
            FormField::MotherPhone => "motherPhone",
            FormField::GuardianName => "guardianName",
            FormField::GuardianPhone => "guardianPhone",
            FormField::GuardianRelation => "guardianRelation",
            FormField::AnnualIncome => "annualIncome",
            FormField::PresentAddressLine1 => "presentAddressLine1",
            FormField::PresentAddressLine2 => "presentAddressLine2",
            FormField::PresentCity => "presentCity",
            FormField::PresentDistrict => "presentDistrict",
            FormField::PresentState => "presentState",
            FormField::PresentPincode => "presentPincode",
            FormField::PresentCountry => "presentCountry",
            FormField::SameAsPresent => "sameAsPresent",
            FormField::PermanentAddressLine1 => "permanentAddressLine1",
            FormField::PermanentAddressLine2 => "permanentAddressLine2",
            FormField::PermanentCity => "permanentCity",
            FormField::PermanentDistrict => "permanentDistrict",
            FormField::PermanentState => "permanentState",
            FormField::PermanentPincode => "permanentPincode",
            FormField::PermanentCountry => "permanentCountry",
            FormField::TenthBoard => "tenthBoard",
            FormField::TenthSchool => "tenthSchool",
            FormField::TenthYear => "tenthYear",
            FormField::TenthPercentage => "tenthPercentage",
            FormField::TwelfthBoard => "twelfthBoard",
            FormField::TwelfthSchool => "twelfthSchool",
            FormField::TwelfthYear => "twelfthYear",
            FormField::TwelfthPercentage => "twelfthPercentage",
            FormField::TwelfthStream => "twelfthStream",
            FormField::PreviousInstitution => "previousInstitution",
            FormField::GapYears => "gapYears",
            FormField::ProgramLevel => "programLevel",
            FormField::Department => "department",
            FormField::Course => "course",
            FormField::Shift => "shift",
            FormField::AdmissionYear => "admissionYear",
            FormField::HostelRequired => "hostelRequired",
            FormField::TransportRequired => "transportRequired",
            FormField::PlaceOfDeclaration => "placeOfDeclaration",
            FormField::DeclarationAccepted => "declarationAccepted",
        }
    }

    pub fn from_key(key: &str) -> Option<FormField> {
        Self::ALL.iter().copied().find(|field| field.key() == key)
    }

    /// The wizard step that edits this field.
    pub fn step(self) -> Step {
        use FormField::*;
        let n = match self {
            FirstName | MiddleName | LastName | DateOfBirth | Gender | BloodGroup
            | Nationality | Religion | Category | AadharNumber | MotherTongue
            | MaritalStatus => 1,
            Email | Phone | AlternatePhone | FatherName | FatherOccupation | FatherPhone
            | MotherName | MotherOccupation | MotherPhone | GuardianName | GuardianPhone
            | GuardianRelation | AnnualIncome => 2,
            PresentAddressLine1 | PresentAddressLine2 | PresentCity | PresentDistrict
            | PresentState | PresentPincode | PresentCountry | SameAsPresent
            | PermanentAddressLine1 | PermanentAddressLine2 | PermanentCity
            | PermanentDistrict | PermanentState | PermanentPincode | PermanentCountry => 3,
            TenthBoard | TenthSchool | TenthYear | TenthPercentage | TwelfthBoard
            | TwelfthSchool | TwelfthYear | TwelfthPercentage | TwelfthStream
            | PreviousInstitution | GapYears => 4,
            ProgramLevel | Department | Course | Shift | AdmissionYear | HostelRequired
            | TransportRequired => 5,
            PlaceOfDeclaration | DeclarationAccepted => 6,
        };
        Step(n)
    }

    /// Whether the field holds a yes/no flag rather than free text.
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            FormField::SameAsPresent
                | FormField::HostelRequired
                | FormField::TransportRequired
                | FormField::DeclarationAccepted
        )
    }

    pub fn on_step(step: Step) -> impl Iterator<Item = FormField> {
        Self::ALL.into_iter().filter(move |field| field.step() == step)
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Value held by a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Flag(_) => None,
        }
    }

    pub fn as_flag(&self) -> bool {
        match self {
            FieldValue::Flag(flag) => *flag,
            FieldValue::Text(text) => matches!(text.as_str(), "true" | "yes" | "1"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Flag(_) => false,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(text) => serde_json::Value::String(text.clone()),
            FieldValue::Flag(flag) => serde_json::Value::Bool(*flag),
        }
    }

    fn from_json(value: serde_json::Value) -> Option<FieldValue> {
        match value {
            serde_json::Value::String(text) => Some(FieldValue::Text(text)),
            serde_json::Value::Bool(flag) => Some(FieldValue::Flag(flag)),
            serde_json::Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Flag(true) => f.write_str("yes"),
            FieldValue::Flag(false) => f.write_str("no"),
        }
    }
}

/// Document attachment slots collected on the last wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentSlot {
    Photo,
    Signature,
    TenthMarksheet,
    TwelfthMarksheet,
    IdProof,
    CategoryCertificate,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 6] = [
        DocumentSlot::Photo,
        DocumentSlot::Signature,
        DocumentSlot::TenthMarksheet,
        DocumentSlot::TwelfthMarksheet,
        DocumentSlot::IdProof,
        DocumentSlot::CategoryCertificate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DocumentSlot::Photo => "photo",
            DocumentSlot::Signature => "signature",
            DocumentSlot::TenthMarksheet => "tenthMarksheet",
            DocumentSlot::TwelfthMarksheet => "twelfthMarksheet",
            DocumentSlot::IdProof => "idProof",
            DocumentSlot::CategoryCertificate => "categoryCertificate",
        }
    }

    pub fn from_key(key: &str) -> Option<DocumentSlot> {
        Self::ALL.iter().copied().find(|slot| slot.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDocument {
    pub file_name: String,
    pub path: PathBuf,
}

impl AttachedDocument {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { file_name, path }
    }
}

/// A wizard step index, always within `[1, 6]`.
///
/// # Examples
///
/// ```
/// use admitsync::domain::Step;
///
/// assert_eq!(Step::normalized(3).get(), 3);
/// assert_eq!(Step::normalized(9).get(), 1);
/// assert_eq!(Step::clamped(9).get(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step(u8);

impl Step {
    pub const FIRST: Step = Step(1);
    pub const LAST: Step = Step(6);

    /// Reads a stored step. Anything out of range is treated as corrupt and
    /// sends the user back to the first step.
    pub fn normalized(raw: i64) -> Step {
        if (1..=6).contains(&raw) {
            Step(raw as u8)
        } else {
            Step::FIRST
        }
    }

    /// Navigational step change: out of range requests stick to the nearest bound.
    pub fn clamped(raw: i64) -> Step {
        Step(raw.clamp(1, 6) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Step {
        Step::clamped(i64::from(self.0) + 1)
    }

    pub fn prev(self) -> Step {
        Step::clamped(i64::from(self.0) - 1)
    }

    pub fn title(self) -> &'static str {
        match self.0 {
            1 => "Personal details",
            2 => "Contact and family",
            3 => "Address",
            4 => "Education",
            5 => "Academic choices",
            _ => "Documents and declaration",
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Step::FIRST
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Step {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let step = match raw {
            serde_json::Value::Number(n) => n.as_i64().map(Step::normalized),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok().map(Step::normalized),
            _ => None,
        };
        Ok(step.unwrap_or(Step::FIRST))
    }
}

/// In-memory contents of the multi-step admission form.
///
/// Serialized as one flat JSON object: field keys map to strings or booleans
/// and document slot keys map to `{fileName, path}` objects. Unknown keys are
/// ignored on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    values: BTreeMap<FormField, FieldValue>,
    documents: BTreeMap<DocumentSlot, AttachedDocument>,
}

impl FormState {
    pub fn get(&self, field: FormField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn text(&self, field: FormField) -> &str {
        self.values
            .get(&field)
            .and_then(FieldValue::as_text)
            .unwrap_or("")
    }

    pub fn flag(&self, field: FormField) -> bool {
        self.values.get(&field).map(FieldValue::as_flag).unwrap_or(false)
    }

    pub fn set(&mut self, field: FormField, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn clear(&mut self, field: FormField) {
        self.values.remove(&field);
    }

    pub fn document(&self, slot: DocumentSlot) -> Option<&AttachedDocument> {
        self.documents.get(&slot)
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocumentSlot, &AttachedDocument)> {
        self.documents.iter().map(|(slot, doc)| (*slot, doc))
    }

    pub fn attach(&mut self, slot: DocumentSlot, document: AttachedDocument) {
        self.documents.insert(slot, document);
    }

    pub fn detach(&mut self, slot: DocumentSlot) {
        self.documents.remove(&slot);
    }

    pub fn is_blank(&self) -> bool {
        self.values.values().all(FieldValue::is_empty) && self.documents.is_empty()
    }

    pub fn filled_fields(&self) -> usize {
        self.values.values().filter(|v| !v.is_empty()).count()
    }
}

impl Serialize for FormState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len() + self.documents.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.key(), &value.to_json())?;
        }
        for (slot, document) in &self.documents {
            map.serialize_entry(slot.key(), document)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FormState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{MapAccess, Visitor};

        struct FormStateVisitor;

        impl<'de> Visitor<'de> for FormStateVisitor {
            type Value = FormState;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of admission form fields")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut state = FormState::default();
                while let Some(key) = map.next_key::<String>()? {
                    let raw = map.next_value::<serde_json::Value>()?;
                    if let Some(field) = FormField::from_key(&key) {
                        if let Some(value) = FieldValue::from_json(raw) {
                            state.values.insert(field, value);
                        }
                    } else if let Some(slot) = DocumentSlot::from_key(&key) {
                        if let Ok(document) = serde_json::from_value::<AttachedDocument>(raw) {
                            state.documents.insert(slot, document);
                        }
                    }
                }
                Ok(state)
            }
        }

        deserializer.deserialize_map(FormStateVisitor)
    }
}

/// The unit persisted both remotely and locally while the user is drafting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    #[serde(default)]
    pub form_data: FormState,
    #[serde(default)]
    pub current_step: Step,
    #[serde(default)]
    pub saved_at: DateTime<Utc>,
}

impl DraftRecord {
    pub fn new(form_data: FormState, current_step: Step, saved_at: DateTime<Utc>) -> Self {
        Self {
            form_data,
            current_step,
            saved_at,
        }
    }
}

/// Terminal marker stating that the user already has an admission on file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub application_id: String,
    pub is_submitted: bool,
}

impl SubmissionRecord {
    pub fn submitted(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            is_submitted: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Draft,
    Submission,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Draft => "admission_draft_",
            Namespace::Submission => "admission_submission_",
        }
    }
}

/// Logical identity of a locally stored record.
///
/// # Examples
///
/// ```
/// use admitsync::domain::{Namespace, StorageKey};
///
/// let key = StorageKey::new(Namespace::Draft, "u-17");
/// assert_eq!(key.to_string(), "admission_draft_u-17");
/// assert_eq!(StorageKey::parse(Namespace::Draft, "admission_draft_u-17"), Some(key));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub namespace: Namespace,
    pub user_id: String,
}

impl StorageKey {
    pub fn new(namespace: Namespace, user_id: impl Into<String>) -> Self {
        Self {
            namespace,
            user_id: user_id.into(),
        }
    }

    pub fn parse(namespace: Namespace, raw: &str) -> Option<StorageKey> {
        let user_id = raw.strip_prefix(namespace.prefix())?;
        if user_id.is_empty() {
            return None;
        }
        Some(StorageKey::new(namespace, user_id))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.namespace.prefix(), self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_keys_are_unique_and_round_trip() {
        let mut seen = std::collections::HashSet::new();
        for field in FormField::ALL {
            assert!(seen.insert(field.key()), "duplicate key {}", field.key());
            assert_eq!(FormField::from_key(field.key()), Some(field));
        }
        assert_eq!(FormField::from_key("nope"), None);
    }

    #[test]
    fn test_every_step_has_fields() {
        for n in 1..=6 {
            assert!(FormField::on_step(Step::normalized(n)).count() > 0);
        }
    }

    #[test]
    fn test_step_normalization() {
        assert_eq!(Step::normalized(0), Step::FIRST);
        assert_eq!(Step::normalized(-4), Step::FIRST);
        assert_eq!(Step::normalized(7), Step::FIRST);
        assert_eq!(Step::normalized(6), Step::LAST);
        assert_eq!(Step::clamped(0), Step::FIRST);
        assert_eq!(Step::clamped(42), Step::LAST);
        assert_eq!(Step::LAST.next(), Step::LAST);
        assert_eq!(Step::FIRST.prev(), Step::FIRST);
    }

    #[test]
    fn test_step_deserializes_leniently() {
        let step: Step = serde_json::from_str("4").unwrap();
        assert_eq!(step.get(), 4);
        let step: Step = serde_json::from_str("\"5\"").unwrap();
        assert_eq!(step.get(), 5);
        let step: Step = serde_json::from_str("99").unwrap();
        assert_eq!(step, Step::FIRST);
        let step: Step = serde_json::from_str("null").unwrap();
        assert_eq!(step, Step::FIRST);
    }

    #[test]
    fn test_form_state_wire_shape() {
        let mut form = FormState::default();
        form.set(FormField::FirstName, FieldValue::Text("Asha".to_string()));
        form.set(FormField::SameAsPresent, FieldValue::Flag(true));
        form.attach(DocumentSlot::Photo, AttachedDocument::from_path("/tmp/me.png"));

        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["firstName"], "Asha");
        assert_eq!(json["sameAsPresent"], true);
        assert_eq!(json["photo"]["fileName"], "me.png");

        let back: FormState = serde_json::from_value(json).unwrap();
        assert_eq!(back, form);
    }

    #[test]
    fn test_form_state_ignores_unknown_keys_and_coerces_numbers() {
        let json = r#"{"firstName":"Ravi","legacyField":"x","tenthYear":2019,"gender":null}"#;
        let form: FormState = serde_json::from_str(json).unwrap();
        assert_eq!(form.text(FormField::FirstName), "Ravi");
        assert_eq!(form.text(FormField::TenthYear), "2019");
        assert!(form.get(FormField::Gender).is_none());
    }

    #[test]
    fn test_draft_record_defaults_missing_parts() {
        let draft: DraftRecord =
            serde_json::from_str(r#"{"formData":{"email":"a@b.c"},"currentStep":12}"#).unwrap();
        assert_eq!(draft.current_step, Step::FIRST);
        assert_eq!(draft.form_data.text(FormField::Email), "a@b.c");
    }

    #[test]
    fn test_storage_key_parse_rejects_other_namespace() {
        assert_eq!(StorageKey::parse(Namespace::Draft, "admission_submission_u1"), None);
        assert_eq!(StorageKey::parse(Namespace::Draft, "admission_draft_"), None);
    }
}
