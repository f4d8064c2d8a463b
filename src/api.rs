use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::billing::{BillingGroup, PaymentHistory, payment_history as core_history, sorted_billing_groups};
use crate::core::hours::{HoursError, HoursSummary, ensure_deletable, hours_summary as core_hours};
use crate::core::payment::{PaymentContext, PaymentEdit, PaymentError, PaymentInput, apply_edit, compute_payment};
use crate::core::records::{Client, Contract, Payment, PaymentTarget, Project, RecordId, Snapshot, TimeEntry};
use crate::core::total::Billed;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cant read storage")]
    CantRead,
    #[error("cant save storage")]
    CantSave,
    #[error("{0} not found")]
    UnknownTarget(PaymentTarget),
    #[error("payment {0} not found")]
    UnknownPayment(RecordId),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Hours(#[from] HoursError),
}

pub trait ClientRepository {
    fn clients(&self) -> Result<Vec<Client>, Error>;
}

pub trait ContractRepository {
    fn contracts(&self) -> Result<Vec<Contract>, Error>;
}

pub trait ProjectRepository {
    fn projects(&self) -> Result<Vec<Project>, Error>;
    fn delete_project(&self, id: &RecordId) -> Result<(), Error>;
}

pub trait PaymentRepository {
    fn payments(&self) -> Result<Vec<Payment>, Error>;
    fn insert_payment(&self, payment: Payment) -> Result<RecordId, Error>;
    fn update_payment(&self, payment: Payment) -> Result<(), Error>;
    fn delete_payment(&self, id: &RecordId) -> Result<(), Error>;

    fn payments_by_contract(&self, id: &RecordId) -> Result<Vec<Payment>, Error> {
        let target = PaymentTarget::Contract(id.clone());
        Ok(self.payments()?.into_iter().filter(|p| p.belongs_to(&target)).collect())
    }

    fn payments_by_project(&self, id: &RecordId) -> Result<Vec<Payment>, Error> {
        let target = PaymentTarget::Project(id.clone());
        Ok(self.payments()?.into_iter().filter(|p| p.belongs_to(&target)).collect())
    }
}

pub trait TimeEntryRepository {
    fn time_entries(&self) -> Result<Vec<TimeEntry>, Error>;
}

pub trait BillingRepo:
    ClientRepository + ContractRepository + ProjectRepository + PaymentRepository + TimeEntryRepository
{
    fn location(&self) -> &str;

    /// Все записи за один проход. Реализации с общим файлом могут читать его один раз.
    fn snapshot(&self) -> Result<Snapshot, Error> {
        Ok(Snapshot {
            clients: self.clients()?,
            contracts: self.contracts()?,
            projects: self.projects()?,
            payments: self.payments()?,
            time_entries: self.time_entries()?,
        })
    }
}

fn billed<'a>(snapshot: &'a Snapshot, target: &PaymentTarget) -> Result<Billed<'a>, Error> {
    Billed::find(snapshot, target).ok_or_else(|| Error::UnknownTarget(target.clone()))
}

/// Сводка по клиентам, упорядоченная по имени
pub fn billing_overview<R: BillingRepo>(repo: &R) -> Result<Vec<BillingGroup>, Error> {
    let s = repo.snapshot()?;
    let groups = sorted_billing_groups(&s.contracts, &s.projects, &s.payments, &s.clients);
    debug!(groups = groups.len(), "сводка собрана");
    Ok(groups)
}

/// Рассчитывает и сохраняет платёж
///
/// # Arguments
///
/// * `repo`: Хранилище
/// * `target`: Контракт или проект, за который платят
/// * `input`: Данные формы
/// * `payment_date`: Дата платежа
/// * `equivalent_hours`: Эквивалент в часах, если указан
///
/// # Errors
/// - `UnknownTarget` - нет такого контракта или проекта
/// - `Payment` - расчёт не прошёл проверки
/// - `CantRead`/`CantSave` - проблемы хранилища
///
/// returns: Result<Payment, Error>
///
pub fn register_payment<R: BillingRepo>(
    repo: &R,
    target: &PaymentTarget,
    input: &PaymentInput,
    payment_date: NaiveDate,
    equivalent_hours: Option<Decimal>,
) -> Result<Payment, Error> {
    let s = repo.snapshot()?;
    let billed = billed(&s, target)?;
    let computed = compute_payment(input, &PaymentContext::new(billed, &s))?;
    let payment = computed.into_payment(
        Uuid::now_v7().to_string(),
        target,
        payment_date,
        equivalent_hours,
    );
    repo.insert_payment(payment.clone())?;
    info!(id = %payment.id, %target, amount = %payment.amount(), "платёж записан");
    Ok(payment)
}

/// Правит сумму и описание платежа, сумма не пересчитывается от процента
pub fn edit_payment<R: BillingRepo>(repo: &R, id: &RecordId, edit: &PaymentEdit) -> Result<Payment, Error> {
    let current = repo
        .payments()?
        .into_iter()
        .find(|p| &p.id == id)
        .ok_or_else(|| Error::UnknownPayment(id.clone()))?;
    let edited = apply_edit(&current, edit)?;
    repo.update_payment(edited.clone())?;
    info!(%id, amount = %edited.amount(), "платёж изменён");
    Ok(edited)
}

pub fn delete_payment<R: BillingRepo>(repo: &R, id: &RecordId) -> Result<(), Error> {
    repo.delete_payment(id)?;
    info!(%id, "платёж удалён");
    Ok(())
}

pub fn payment_history<R: BillingRepo>(repo: &R, target: &PaymentTarget) -> Result<PaymentHistory, Error> {
    let s = repo.snapshot()?;
    let billed = billed(&s, target)?;
    Ok(core_history(billed, billed.linked_contract(&s), &s.projects, &s.payments))
}

pub fn hours_summary<R: BillingRepo>(repo: &R, target: &PaymentTarget) -> Result<HoursSummary, Error> {
    let s = repo.snapshot()?;
    let billed = billed(&s, target)?;
    Ok(core_hours(billed, &s.time_entries))
}

/// Удаляет проект, если на него не списано время
pub fn delete_project<R: BillingRepo>(repo: &R, id: &RecordId) -> Result<(), Error> {
    let s = repo.snapshot()?;
    let target = PaymentTarget::Project(id.clone());
    let project = s.project(id).ok_or(Error::UnknownTarget(target))?;
    ensure_deletable(project, &s.time_entries)?;
    repo.delete_project(id)?;
    info!(%id, "проект удалён");
    Ok(())
}
