use rust_decimal::Decimal;

use crate::core::finance::{AmountError, CEILING, Money};
use crate::core::records::{Contract, PaymentTarget, Project, Snapshot};

/// Сущность, у которой есть оплачиваемая стоимость
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Billed<'a> {
    Contract(&'a Contract),
    Project(&'a Project),
}

impl<'a> Billed<'a> {
    pub fn find(snapshot: &'a Snapshot, target: &PaymentTarget) -> Option<Self> {
        match target {
            PaymentTarget::Contract(id) => snapshot.contract(id).map(Billed::Contract),
            PaymentTarget::Project(id) => snapshot.project(id).map(Billed::Project),
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            Billed::Contract(c) => &c.id,
            Billed::Project(p) => &p.id,
        }
    }

    pub fn target(&self) -> PaymentTarget {
        match self {
            Billed::Contract(c) => PaymentTarget::Contract(c.id.clone()),
            Billed::Project(p) => PaymentTarget::Project(p.id.clone()),
        }
    }

    /// Контракт, от которого проект может унаследовать ставку
    pub fn linked_contract(&self, snapshot: &'a Snapshot) -> Option<&'a Contract> {
        match self {
            Billed::Contract(_) => None,
            Billed::Project(p) => snapshot.linked_contract(p),
        }
    }
}

fn bounded(value: Decimal, field: &'static str) -> Result<Decimal, AmountError> {
    if value > CEILING {
        return Err(AmountError::TooLarge { field, value });
    }
    Ok(value)
}

/// `rate * hours`, если оба положительны
fn product(rate: Decimal, hours: Decimal, field: &'static str) -> Result<Option<Decimal>, AmountError> {
    if rate <= Decimal::ZERO || hours <= Decimal::ZERO {
        return Ok(None);
    }
    let value = rate
        .checked_mul(hours)
        .ok_or(AmountError::overflow(field))?;
    bounded(value, field).map(Some)
}

/// Стоимость контракта: часы * ставка
///
/// # Errors
/// `TooLarge` - произведение больше `CEILING`
pub fn contract_total(contract: &Contract) -> Result<Money, AmountError> {
    let total = product(
        contract.hourly_rate(),
        contract.total_hours(),
        "contract total",
    )?;
    Ok(Money::new(total.unwrap_or_default()))
}

/// Стоимость проекта, первое ненулевое из:
/// 1. явная `total_amount`
/// 2. собственная ставка * оценка часов
/// 3. ставка связанного контракта * оценка часов, если своей ставки нет
///
/// # Errors
/// `TooLarge` - сумма или произведение больше `CEILING`
pub fn project_total(
    project: &Project,
    linked_contract: Option<&Contract>,
) -> Result<Money, AmountError> {
    let explicit = project.total_amount();
    if explicit > Decimal::ZERO {
        return bounded(explicit, "project total amount").map(Money::new);
    }

    let hours = project.estimated_hours();
    let own_rate = project.hourly_rate();
    if let Some(total) = product(own_rate, hours, "project total")? {
        return Ok(Money::new(total));
    }

    if project.is_contracted() && own_rate <= Decimal::ZERO {
        if let Some(contract) = linked_contract {
            if let Some(total) = product(contract.hourly_rate(), hours, "project total")? {
                return Ok(Money::new(total));
            }
        }
    }

    Ok(Money::ZERO)
}

/// Полная стоимость контракта или проекта, ноль если её не из чего вывести
pub fn resolve_total(entity: Billed<'_>, linked_contract: Option<&Contract>) -> Result<Money, AmountError> {
    match entity {
        Billed::Contract(contract) => contract_total(contract),
        Billed::Project(project) => project_total(project, linked_contract),
    }
}
