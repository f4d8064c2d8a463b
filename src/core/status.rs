use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::core::finance::{Money, Percentage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NoValue,
    Paid,
    Partial,
    Pending,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PaymentStatus::NoValue => "no_value",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Pending => "pending",
        };
        write!(f, "{label}")
    }
}

/// Статус оплаты по оплаченной и полной сумме.
/// Сравниваем суммы, а не округлённый процент: 99.999% ещё не оплачено.
pub fn classify(paid_amount: Money, total_value: Money) -> PaymentStatus {
    if total_value <= Money::ZERO {
        PaymentStatus::NoValue
    } else if paid_amount >= total_value {
        PaymentStatus::Paid
    } else if paid_amount > Money::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

pub fn payment_percentage(paid_amount: Money, total_value: Money) -> Percentage {
    if total_value <= Money::ZERO {
        return Percentage::ZERO;
    }
    Percentage::of(paid_amount.value(), total_value.value())
}
