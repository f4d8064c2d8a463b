use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::serde_helpers;

pub type RecordId = String;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Client {
    #[serde(deserialize_with = "serde_helpers::required_id::deserialize")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contract {
    #[serde(deserialize_with = "serde_helpers::required_id::deserialize")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "serde_helpers::id::deserialize")]
    pub client_id: Option<RecordId>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub contract_number: Option<String>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub total_hours: Option<Decimal>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub hourly_rate: Option<Decimal>,
    /// Устаревшая денормализованная сумма оплат, для сводки не используется
    #[serde(default, with = "serde_helpers::decimal")]
    pub billed_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::date::deserialize")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "serde_helpers::date::deserialize")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub status: Option<String>,
}

impl Contract {
    pub fn hourly_rate(&self) -> Decimal {
        self.hourly_rate.unwrap_or_default()
    }

    pub fn total_hours(&self) -> Decimal {
        self.total_hours.unwrap_or_default()
    }

    pub fn label(&self) -> String {
        self.contract_number
            .clone()
            .unwrap_or_else(|| format!("Contrato {}", self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "serde_helpers::required_id::deserialize")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "serde_helpers::id::deserialize")]
    pub contract_id: Option<RecordId>,
    #[serde(default, deserialize_with = "serde_helpers::id::deserialize")]
    pub client_id: Option<RecordId>,
    #[serde(default, deserialize_with = "serde_helpers::bool_false")]
    pub is_independent: bool,
    #[serde(default, deserialize_with = "serde_helpers::string")]
    pub name: String,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub client_email: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub client_phone: Option<String>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub estimated_hours: Option<Decimal>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub hourly_rate: Option<Decimal>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub total_amount: Option<Decimal>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub paid_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub status: Option<String>,
}

impl Project {
    pub fn hourly_rate(&self) -> Decimal {
        self.hourly_rate.unwrap_or_default()
    }

    pub fn estimated_hours(&self) -> Decimal {
        self.estimated_hours.unwrap_or_default()
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount.unwrap_or_default()
    }

    /// Проект привязан к контракту (а не самостоятельный)
    pub fn is_contracted(&self) -> bool {
        !self.is_independent && self.contract_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Fixed,
    Percentage,
    RecurringSupport,
    ProjectScope,
    SupportEvolutive,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Fixed => "fixed",
            PaymentType::Percentage => "percentage",
            PaymentType::RecurringSupport => "recurring_support",
            PaymentType::ProjectScope => "project_scope",
            PaymentType::SupportEvolutive => "support_evolutive",
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(PaymentType::Fixed),
            "percentage" => Ok(PaymentType::Percentage),
            "recurring_support" => Ok(PaymentType::RecurringSupport),
            "project_scope" => Ok(PaymentType::ProjectScope),
            "support_evolutive" => Ok(PaymentType::SupportEvolutive),
            other => Err(format!("unknown payment type: {other}")),
        }
    }
}

/// Месяц начисления в формате `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }
}

impl Display for BillingMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("billing month must be YYYY-MM, got {s:?}");
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        BillingMonth::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(value: BillingMonth) -> Self {
        value.to_string()
    }
}

/// Кому адресован платёж
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentTarget {
    Contract(RecordId),
    Project(RecordId),
}

impl Display for PaymentTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentTarget::Contract(id) => write!(f, "contract {id}"),
            PaymentTarget::Project(id) => write!(f, "project {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "serde_helpers::required_id::deserialize")]
    pub id: RecordId,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "serde_helpers::id::deserialize"
    )]
    pub contract_id: Option<RecordId>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "serde_helpers::id::deserialize"
    )]
    pub project_id: Option<RecordId>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::string")]
    pub description: String,
    #[serde(default, deserialize_with = "serde_helpers::date::deserialize")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "serde_helpers::parsed")]
    pub payment_type: Option<PaymentType>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "serde_helpers::parsed"
    )]
    pub billing_month: Option<BillingMonth>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_helpers::decimal"
    )]
    pub equivalent_hours: Option<Decimal>,
}

impl Payment {
    pub fn amount(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }

    pub fn belongs_to(&self, target: &PaymentTarget) -> bool {
        match target {
            PaymentTarget::Contract(id) => self.contract_id.as_ref() == Some(id),
            PaymentTarget::Project(id) => self.project_id.as_ref() == Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeEntry {
    #[serde(deserialize_with = "serde_helpers::required_id::deserialize")]
    pub id: RecordId,
    #[serde(default, deserialize_with = "serde_helpers::id::deserialize")]
    pub project_id: Option<RecordId>,
    #[serde(default, deserialize_with = "serde_helpers::id::deserialize")]
    pub contract_id: Option<RecordId>,
    #[serde(default, with = "serde_helpers::decimal")]
    pub hours_used: Option<Decimal>,
    #[serde(default, deserialize_with = "serde_helpers::date::deserialize")]
    pub entry_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "serde_helpers::opt_string")]
    pub description: Option<String>,
}

impl TimeEntry {
    pub fn belongs_to(&self, target: &PaymentTarget) -> bool {
        match target {
            PaymentTarget::Contract(id) => self.contract_id.as_ref() == Some(id),
            PaymentTarget::Project(id) => self.project_id.as_ref() == Some(id),
        }
    }
}

/// Согласованный срез всех записей, прочитанный за один раз
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
}

impl Snapshot {
    pub fn contract(&self, id: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Контракт проекта, если проект не самостоятельный
    pub fn linked_contract(&self, project: &Project) -> Option<&Contract> {
        if project.is_independent {
            return None;
        }
        project
            .contract_id
            .as_deref()
            .and_then(|id| self.contract(id))
    }
}

#[cfg(test)]
mod test_records {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn billing_month_parse() {
        assert_eq!(
            "2024-07".parse::<BillingMonth>(),
            Ok(BillingMonth::new(2024, 7).unwrap())
        );
        assert!("2024-13".parse::<BillingMonth>().is_err());
        assert!("2024-7".parse::<BillingMonth>().is_err());
        assert!("july".parse::<BillingMonth>().is_err());
        assert_eq!(BillingMonth::new(2024, 7).unwrap().to_string(), "2024-07");
    }

    #[test]
    fn payment_type_roundtrip_names() {
        for t in [
            PaymentType::Fixed,
            PaymentType::Percentage,
            PaymentType::RecurringSupport,
            PaymentType::ProjectScope,
            PaymentType::SupportEvolutive,
        ] {
            assert_eq!(t.as_str().parse::<PaymentType>(), Ok(t));
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                serde_json::Value::String(t.as_str().to_string())
            );
        }
    }

    #[test]
    fn malformed_project_loads() {
        let project: Project = serde_json::from_str(
            r#"{"id": 7, "name": null, "hourly_rate": "", "estimated_hours": "12",
                "is_independent": null, "contract_id": 3}"#,
        )
        .unwrap();
        assert_eq!(project.id, "7");
        assert_eq!(project.name, "");
        assert_eq!(project.hourly_rate, None);
        assert_eq!(project.estimated_hours(), dec!(12));
        assert!(project.is_contracted());
    }

    #[test]
    fn unknown_payment_type_is_dropped() {
        let payment: Payment = serde_json::from_str(
            r#"{"id": "p1", "contract_id": "c1", "amount": 100, "payment_type": "barter",
                "billing_month": "2024-02"}"#,
        )
        .unwrap();
        assert_eq!(payment.payment_type, None);
        assert_eq!(payment.billing_month, BillingMonth::new(2024, 2));
        assert!(payment.belongs_to(&PaymentTarget::Contract("c1".to_string())));
    }

    #[test]
    fn linked_contract_ignores_independent_projects() {
        let snapshot = Snapshot {
            contracts: vec![Contract {
                id: "c1".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut project = Project {
            id: "p1".to_string(),
            contract_id: Some("c1".to_string()),
            ..Default::default()
        };
        assert!(snapshot.linked_contract(&project).is_some());
        project.is_independent = true;
        assert!(snapshot.linked_contract(&project).is_none());
    }
}
