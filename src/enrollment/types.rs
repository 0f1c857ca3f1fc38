//! Enrollment records and intake DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::state::{EnrollmentStatus, PaymentStatus};
use crate::catalog::Money;
use crate::core_types::{AccountId, Caller, EnrollmentId, ProgramId, normalize_email};
use crate::payment::ProviderKind;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_SOURCE: &str = "website";

/// Guest contact record captured at intake
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(range(min = 3, max = 120))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[validate(email(message = "Valid parent email is required"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ContactInfo {
    /// Trim free text, normalize emails, drop blank optionals
    pub fn normalized(mut self) -> Self {
        fn opt(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.phone = opt(self.phone);
        self.parent_name = opt(self.parent_name);
        self.parent_email = opt(self.parent_email).map(|e| normalize_email(&e));
        self.parent_phone = opt(self.parent_phone);
        self.organization = opt(self.organization);
        self.country = opt(self.country);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Who holds an enrollment. The normalized email is the join key for both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LearnerIdentity {
    Account {
        #[schema(value_type = String, format = Uuid)]
        account_id: AccountId,
        email: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Guest(ContactInfo),
}

impl LearnerIdentity {
    pub fn from_caller(caller: &Caller) -> Self {
        LearnerIdentity::Account {
            account_id: caller.account_id,
            email: caller.email.clone(),
            name: caller.name.clone(),
        }
    }

    pub fn email(&self) -> String {
        match self {
            LearnerIdentity::Account { email, .. } => normalize_email(email),
            LearnerIdentity::Guest(contact) => normalize_email(&contact.email),
        }
    }

    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            LearnerIdentity::Account { account_id, .. } => Some(*account_id),
            LearnerIdentity::Guest(_) => None,
        }
    }

    pub fn display_name(&self) -> Option<String> {
        match self {
            LearnerIdentity::Account { name, .. } => name.clone(),
            LearnerIdentity::Guest(contact) => Some(contact.full_name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentType {
    #[default]
    Individual,
    School,
    Corporate,
}

impl EnrollmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentType::Individual => "individual",
            EnrollmentType::School => "school",
            EnrollmentType::Corporate => "corporate",
        }
    }
}

impl fmt::Display for EnrollmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "individual" => Ok(EnrollmentType::Individual),
            "school" => Ok(EnrollmentType::School),
            "corporate" => Ok(EnrollmentType::Corporate),
            _ => Err(format!("Invalid enrollment type: {}", s)),
        }
    }
}

/// Requested cohort window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Cohort {
    pub fn is_ordered(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

/// Captured payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub provider: ProviderKind,
    /// Idempotence key, unique per provider
    pub reference: String,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// One learner's claim on one program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    #[schema(value_type = String, format = Uuid)]
    pub id: EnrollmentId,
    pub learner: LearnerIdentity,
    /// Normalized; join key across identity kinds
    pub learner_email: String,
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
    pub enrollment_type: EnrollmentType,
    pub participants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<Cohort>,
    pub status: EnrollmentStatus,
    pub payment_status: PaymentStatus,
    /// Price captured at intake (price × participants) or the paid amount
    pub amount_due: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// New `pending/pending` enrollment from intake
    pub fn pending(learner: LearnerIdentity, program_id: ProgramId, amount_due: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            learner_email: learner.email(),
            learner,
            program_id,
            enrollment_type: EnrollmentType::Individual,
            participants: 1,
            cohort: None,
            status: EnrollmentStatus::Pending,
            payment_status: PaymentStatus::Pending,
            amount_due,
            payment: None,
            notes: None,
            source: DEFAULT_SOURCE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// New `confirmed/paid` enrollment from a verified payment
    pub fn paid(learner: LearnerIdentity, program_id: ProgramId, payment: PaymentDetails) -> Self {
        let mut enrollment = Self::pending(learner, program_id, payment.amount.clone());
        enrollment.apply_payment(payment);
        enrollment
    }

    /// Record a verified payment: `confirmed/paid`
    pub fn apply_payment(&mut self, payment: PaymentDetails) {
        self.status = EnrollmentStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
        self.payment = Some(payment);
        self.updated_at = Utc::now();
    }

    pub fn payment_reference(&self) -> Option<(ProviderKind, &str)> {
        self.payment
            .as_ref()
            .map(|p| (p.provider, p.reference.as_str()))
    }

    pub fn belongs_to(&self, caller: &Caller) -> bool {
        self.learner_email == caller.email || self.learner.account_id() == Some(caller.account_id)
    }
}

fn default_participants() -> u32 {
    1
}

/// `POST /enrollments` body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentIntake {
    #[schema(value_type = String, format = Uuid)]
    pub program_id: ProgramId,
    #[validate(nested)]
    pub student_info: ContactInfo,
    #[serde(default)]
    pub cohort_date: Option<Cohort>,
    #[serde(default)]
    pub enrollment_type: EnrollmentType,
    #[validate(range(min = 1, max = 500, message = "Participants must be between 1 and 500"))]
    #[serde(default = "default_participants")]
    pub number_of_participants: u32,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl EnrollmentIntake {
    pub fn normalized(mut self) -> Self {
        self.student_info = self.student_info.normalized();
        self.notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.source = self
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }
}

/// Admin list query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentFilter {
    pub status: Option<EnrollmentStatus>,
    pub program_id: Option<ProgramId>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl EnrollmentFilter {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            status: None,
            program_id: None,
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn matches(&self, e: &Enrollment) -> bool {
        self.status.is_none_or(|s| e.status == s)
            && self.program_id.is_none_or(|p| e.program_id == p)
    }
}

/// One page of a newest-first listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, filter: &EnrollmentFilter) -> Self {
        let limit = u64::from(filter.limit.max(1));
        Self {
            items,
            total,
            page: filter.page,
            pages: total.div_ceil(limit) as u32,
            limit: filter.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactInfo {
        ContactInfo {
            first_name: "  Ada ".into(),
            last_name: "Lovelace".into(),
            email: " Ada@Example.COM ".into(),
            phone: Some("   ".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_contact_normalized() {
        let c = contact().normalized();
        assert_eq!(c.first_name, "Ada");
        assert_eq!(c.email, "ada@example.com");
        assert_eq!(c.phone, None);
        assert_eq!(c.full_name(), "Ada Lovelace");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_intake_validation() {
        let json = serde_json::json!({
            "programId": Uuid::new_v4(),
            "studentInfo": {"firstName": " ", "lastName": "L", "email": "not-an-email"},
            "numberOfParticipants": 0
        });
        let intake: EnrollmentIntake = serde_json::from_value(json).unwrap();
        let errors = intake.normalized().validate().unwrap_err();
        assert!(errors.errors().contains_key("number_of_participants"));
        assert!(errors.errors().contains_key("student_info"));
    }

    #[test]
    fn test_intake_defaults() {
        let json = serde_json::json!({
            "programId": Uuid::new_v4(),
            "studentInfo": {"firstName": "Ada", "lastName": "L", "email": "ada@example.com"}
        });
        let intake: EnrollmentIntake = serde_json::from_value(json).unwrap();
        assert_eq!(intake.number_of_participants, 1);
        assert_eq!(intake.enrollment_type, EnrollmentType::Individual);
        assert!(intake.validate().is_ok());
    }

    #[test]
    fn test_identity_email_is_join_key() {
        let guest = LearnerIdentity::Guest(contact());
        assert_eq!(guest.email(), "ada@example.com");
        assert_eq!(guest.account_id(), None);

        let account = LearnerIdentity::Account {
            account_id: Uuid::new_v4(),
            email: "ADA@example.com".into(),
            name: None,
        };
        assert_eq!(account.email(), guest.email());
    }

    #[test]
    fn test_paid_enrollment() {
        let payment = PaymentDetails {
            provider: ProviderKind::Paystack,
            reference: "PE_123".into(),
            amount: Money::new("349".parse().unwrap(), "USD"),
            paid_at: Utc::now(),
        };
        let e = Enrollment::paid(LearnerIdentity::Guest(contact()), Uuid::new_v4(), payment);
        assert_eq!(e.status, EnrollmentStatus::Confirmed);
        assert_eq!(e.payment_status, PaymentStatus::Paid);
        assert_eq!(e.payment_reference(), Some((ProviderKind::Paystack, "PE_123")));
    }

    #[test]
    fn test_filter_paging() {
        let f = EnrollmentFilter::new(Some(0), Some(1000));
        assert_eq!(f.page, 1);
        assert_eq!(f.limit, MAX_PAGE_SIZE);

        let f = EnrollmentFilter::new(Some(3), None);
        assert_eq!(f.offset(), 40);

        let page: Page<u8> = Page::new(vec![], 41, &f);
        assert_eq!(page.pages, 3);
    }
}
