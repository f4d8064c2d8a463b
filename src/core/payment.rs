use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use thiserror::Error;
use tracing::debug;

use crate::core::finance::{AmountError, Money, Percentage, validate_field};
use crate::core::records::{BillingMonth, Payment, PaymentTarget, PaymentType, Project, RecordId, Snapshot};
use crate::core::total::{Billed, project_total, resolve_total};

const FIXED_LABEL: &str = "Pago fijo";
const EVOLUTIVE_LABEL: &str = "Soporte y evolutivos";
const RECURRING_LABEL: &str = "Soporte fijo";
const PERCENTAGE_LABEL: &str = "Pago porcentual";
const PROJECT_SCOPE_LABEL: &str = "Proyecto de alcance fijo";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    #[error("{source} ({context})")]
    Amount { source: AmountError, context: String },
    #[error("percentage must be greater than 0 and at most 100, got {value}")]
    InvalidPercentage { value: f64 },
    #[error(
        "project {name:?} has no billable total: total amount {total_amount}, hourly rate {hourly_rate}, estimated hours {estimated_hours}"
    )]
    NoProjectTotal {
        name: String,
        total_amount: Decimal,
        hourly_rate: Decimal,
        estimated_hours: Decimal,
    },
    #[error("a project must be selected for a project scope payment")]
    MissingProjectSelection,
    #[error("project {id} is not available for this payment")]
    ProjectOutOfScope { id: RecordId },
}

impl PaymentError {
    fn amount(source: AmountError, context: impl Into<String>) -> Self {
        PaymentError::Amount {
            source,
            context: context.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectScopeKind {
    Fixed { amount: f64 },
    Percentage { percentage: f64 },
}

/// Данные формы платежа, по варианту на каждый тип
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentInput {
    Fixed {
        amount: f64,
        note: Option<String>,
    },
    SupportEvolutive {
        amount: f64,
        note: Option<String>,
    },
    RecurringSupport {
        amount: f64,
        billing_month: BillingMonth,
        note: Option<String>,
    },
    Percentage {
        percentage: f64,
        note: Option<String>,
    },
    ProjectScope {
        selected_project_id: Option<RecordId>,
        kind: ProjectScopeKind,
        note: Option<String>,
    },
}

impl PaymentInput {
    pub fn payment_type(&self) -> PaymentType {
        match self {
            PaymentInput::Fixed { .. } => PaymentType::Fixed,
            PaymentInput::SupportEvolutive { .. } => PaymentType::SupportEvolutive,
            PaymentInput::RecurringSupport { .. } => PaymentType::RecurringSupport,
            PaymentInput::Percentage { .. } => PaymentType::Percentage,
            PaymentInput::ProjectScope { .. } => PaymentType::ProjectScope,
        }
    }
}

/// Всё, что нужно калькулятору: оплачиваемая сущность и срез записей
#[derive(Debug, Clone, Copy)]
pub struct PaymentContext<'a> {
    pub billed: Billed<'a>,
    pub snapshot: &'a Snapshot,
}

impl<'a> PaymentContext<'a> {
    pub fn new(billed: Billed<'a>, snapshot: &'a Snapshot) -> Self {
        Self { billed, snapshot }
    }

    fn total_value(&self) -> Result<Money, AmountError> {
        resolve_total(self.billed, self.billed.linked_contract(self.snapshot))
    }

    /// Проекты, на которые можно разнести платёж по объёму
    ///
    /// - контракт видит свои проекты
    /// - проект контракта видит проекты того же контракта
    /// - самостоятельный проект видит остальные самостоятельные
    pub fn scoped_projects(&self) -> impl Iterator<Item = &'a Project> {
        let billed = self.billed;
        self.snapshot.projects.iter().filter(move |p| match billed {
            Billed::Contract(c) => !p.is_independent && p.contract_id.as_ref() == Some(&c.id),
            Billed::Project(own) if own.is_independent => p.is_independent && p.id != own.id,
            Billed::Project(own) => {
                !p.is_independent && own.contract_id.is_some() && p.contract_id == own.contract_id
            }
        })
    }
}

/// Результат расчёта, готовый к сохранению вызывающей стороной
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedPayment {
    pub amount: Money,
    pub description: String,
    pub payment_type: PaymentType,
    pub billing_month: Option<BillingMonth>,
}

impl ComputedPayment {
    /// Запись платежа в том виде, в котором она хранится
    pub fn into_payment(
        self,
        id: RecordId,
        target: &PaymentTarget,
        payment_date: NaiveDate,
        equivalent_hours: Option<Decimal>,
    ) -> Payment {
        let (contract_id, project_id) = match target {
            PaymentTarget::Contract(id) => (Some(id.clone()), None),
            PaymentTarget::Project(id) => (None, Some(id.clone())),
        };
        Payment {
            id,
            contract_id,
            project_id,
            amount: Some(self.amount.value()),
            description: self.description,
            payment_date: Some(payment_date),
            payment_type: Some(self.payment_type),
            billing_month: self.billing_month,
            equivalent_hours,
        }
    }
}

fn with_note(base: String, note: Option<&str>) -> String {
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("{base} - {note}"),
        None => base,
    }
}

fn percentage(value: f64) -> Result<Percentage, PaymentError> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(PaymentError::InvalidPercentage { value });
    }
    Decimal::from_f64(value)
        .map(Percentage::from)
        .ok_or(PaymentError::InvalidPercentage { value })
}

fn entered_amount(amount: f64) -> Result<Money, PaymentError> {
    validate_field(amount, "amount").map_err(|e| PaymentError::amount(e, format!("entered amount {amount}")))
}

fn share_of(total: Money, p: Percentage, context: impl Fn() -> String) -> Result<Money, PaymentError> {
    let raw = p
        .apply_to(total.value())
        .ok_or_else(|| PaymentError::amount(AmountError::overflow("amount"), context()))?;
    Money::try_new(raw, "amount").map_err(|e| PaymentError::amount(e, context()))
}

fn project_scope(
    ctx: &PaymentContext<'_>,
    selected_project_id: Option<&RecordId>,
    kind: &ProjectScopeKind,
) -> Result<(Money, String), PaymentError> {
    let id = selected_project_id.ok_or(PaymentError::MissingProjectSelection)?;
    let project = ctx
        .scoped_projects()
        .find(|p| &p.id == id)
        .ok_or_else(|| PaymentError::ProjectOutOfScope { id: id.clone() })?;
    let label = format!("{PROJECT_SCOPE_LABEL} - {}", project.name);

    match kind {
        ProjectScopeKind::Fixed { amount } => Ok((entered_amount(*amount)?, label)),
        ProjectScopeKind::Percentage { percentage: raw } => {
            let p = percentage(*raw)?;
            let linked = ctx.snapshot.linked_contract(project);
            let describe = || {
                format!(
                    "{p} of project {:?}: total amount {}, hourly rate {}, estimated hours {}, contract hourly rate {}",
                    project.name,
                    project.total_amount(),
                    project.hourly_rate(),
                    project.estimated_hours(),
                    linked.map(|c| c.hourly_rate()).unwrap_or_default(),
                )
            };
            let total = project_total(project, linked).map_err(|e| PaymentError::amount(e, describe()))?;
            if total.is_zero() {
                return Err(PaymentError::NoProjectTotal {
                    name: project.name.clone(),
                    total_amount: project.total_amount(),
                    hourly_rate: project.hourly_rate(),
                    estimated_hours: project.estimated_hours(),
                });
            }
            let amount = share_of(total, p, describe)?;
            Ok((amount, format!("{label} ({p})")))
        }
    }
}

/// Считает сумму и описание платежа по данным формы
///
/// # Arguments
///
/// * `input`: Тип платежа и введённые значения
/// * `ctx`: Оплачиваемая сущность и срез записей
///
/// # Errors
/// - `Amount` - сумма не прошла проверку, в контексте перечислены исходные значения
/// - `InvalidPercentage` - процент вне (0, 100]
/// - `NoProjectTotal` - у выбранного проекта нулевая стоимость
/// - `MissingProjectSelection` - не выбран проект для платежа по объёму
/// - `ProjectOutOfScope` - выбранный проект недоступен для этой сущности
///
/// returns: Result<ComputedPayment, PaymentError>
///
pub fn compute_payment(
    input: &PaymentInput,
    ctx: &PaymentContext<'_>,
) -> Result<ComputedPayment, PaymentError> {
    let mut billing_month = None;
    let (amount, description) = match input {
        PaymentInput::Fixed { amount, note } => (
            entered_amount(*amount)?,
            with_note(FIXED_LABEL.to_string(), note.as_deref()),
        ),
        PaymentInput::SupportEvolutive { amount, note } => (
            entered_amount(*amount)?,
            with_note(EVOLUTIVE_LABEL.to_string(), note.as_deref()),
        ),
        PaymentInput::RecurringSupport {
            amount,
            billing_month: month,
            note,
        } => {
            billing_month = Some(*month);
            (
                entered_amount(*amount)?,
                with_note(format!("{RECURRING_LABEL} - {month}"), note.as_deref()),
            )
        }
        PaymentInput::Percentage {
            percentage: raw,
            note,
        } => {
            let p = percentage(*raw)?;
            let total = ctx
                .total_value()
                .map_err(|e| PaymentError::amount(e, format!("{p} of {}", ctx.billed.id())))?;
            let amount = share_of(total, p, || format!("{p} of total value {total}"))?;
            (
                amount,
                with_note(format!("{PERCENTAGE_LABEL} ({p})"), note.as_deref()),
            )
        }
        PaymentInput::ProjectScope {
            selected_project_id,
            kind,
            note,
        } => {
            let (amount, label) = project_scope(ctx, selected_project_id.as_ref(), kind)?;
            (amount, with_note(label, note.as_deref()))
        }
    };

    let computed = ComputedPayment {
        amount,
        description,
        payment_type: input.payment_type(),
        billing_month,
    };
    debug!(billed = ctx.billed.id(), ?computed, "платёж рассчитан");
    Ok(computed)
}

/// Правка сохранённого платежа: сумма берётся как есть, без пересчёта от процента
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentEdit {
    pub amount: f64,
    pub description: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub equivalent_hours: Option<Decimal>,
}

/// Применяет правку к платежу, тип и месяц начисления не меняются
///
/// # Errors
/// `Amount` - новая сумма не прошла проверку
pub fn apply_edit(payment: &Payment, edit: &PaymentEdit) -> Result<Payment, PaymentError> {
    let amount = entered_amount(edit.amount)?;
    let mut edited = payment.clone();
    edited.amount = Some(amount.value());
    if let Some(description) = edit.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        edited.description = description.to_string();
    }
    if let Some(date) = edit.payment_date {
        edited.payment_date = Some(date);
    }
    if edit.equivalent_hours.is_some() {
        edited.equivalent_hours = edit.equivalent_hours;
    }
    Ok(edited)
}
