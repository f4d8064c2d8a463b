use std::fmt::{Display, Formatter};

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Верхняя граница любой суммы, которую можно записать как платёж
pub const CEILING: Decimal = dec!(999_999_999_999);

const DECIMAL_PLACES: u32 = 2;

/// Округление до копеек: 0.005 -> 0.01
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be greater than zero, got {value}")]
    NonPositive { field: &'static str, value: Decimal },
    #[error("{field} exceeds the maximum allowed ({CEILING}), got {value}")]
    TooLarge { field: &'static str, value: Decimal },
}

impl AmountError {
    /// Переполнение самого `Decimal` тоже считаем превышением потолка
    pub fn overflow(field: &'static str) -> Self {
        AmountError::TooLarge {
            field,
            value: Decimal::MAX,
        }
    }
}

/// Проверяет сумму, введённую в форме
///
/// # Arguments
///
/// * `x`: Сырое значение из формы
///
/// # Errors
/// - `NotFinite` - NaN или бесконечность
/// - `NonPositive` - ноль или меньше, в том числе после округления до копеек
/// - `TooLarge` - больше `CEILING`
///
/// returns: Result<Money, AmountError>
///
pub fn validate_amount(x: f64) -> Result<Money, AmountError> {
    validate_field(x, "amount")
}

pub(crate) fn validate_field(x: f64, field: &'static str) -> Result<Money, AmountError> {
    if !x.is_finite() {
        return Err(AmountError::NotFinite { field });
    }
    let value = Decimal::from_f64(x).ok_or(AmountError::overflow(field))?;
    Money::try_new(value, field)
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Copy, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    #[must_use]
    pub fn new(value: Decimal) -> Self {
        Self(round_money(value))
    }

    /// Создаёт сумму платежа: строго больше нуля и не больше `CEILING`
    pub fn try_new(value: Decimal, field: &'static str) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NonPositive { field, value });
        }
        if value > CEILING {
            return Err(AmountError::TooLarge { field, value });
        }
        let rounded = round_money(value);
        if rounded.is_zero() {
            return Err(AmountError::NonPositive { field, value });
        }
        Ok(Self(rounded))
    }

    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Сложение без паники: `None`, если сумма вышла за пределы `Decimal`
    #[must_use]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Остаток к оплате никогда не уходит в минус
    #[must_use]
    pub fn pending(total: Money, paid: Money) -> Money {
        Money(total.0.checked_sub(paid.0).unwrap_or_default().max(Decimal::ZERO))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(Decimal);

impl Percentage {
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);

    #[must_use]
    pub fn from(v: Decimal) -> Self {
        Self(v)
    }

    #[must_use]
    pub fn from_int(d: i64) -> Self {
        Percentage::from(Decimal::new(d, 0))
    }

    /// Какую долю `value` составляет от `on`. От нуля - ноль процентов.
    #[must_use]
    pub fn of(value: Decimal, on: Decimal) -> Self {
        if on.is_zero() {
            return Percentage::ZERO;
        }
        match value.checked_div(on).and_then(|ratio| ratio.checked_mul(dec!(100))) {
            Some(p) => Percentage::from(round_money(p)),
            None => Percentage::ZERO,
        }
    }

    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// `d * p / 100`, `None` при переполнении
    pub fn apply_to(&self, d: Decimal) -> Option<Decimal> {
        d.checked_mul(self.0).map(|v| v / dec!(100))
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}
