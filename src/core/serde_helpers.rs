//! Снисходительное чтение записей из JSON-хранилища
//!
//! Формы фронтенда сохраняют числа то числами, то строками, иногда пустыми.
//! Всё, что не удалось разобрать, превращается в `None`, а не в ошибку.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

fn decimal_from_value(value: Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        _ => None,
    }
}

/// Числовое поле: число, строка с числом, пустая строка или null
pub mod decimal {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Value>::deserialize(deserializer).map(|opt| opt.and_then(decimal_from_value))
    }

    /// Пишет числом, если `f64` хранит значение без потерь, иначе строкой
    pub fn serialize<S>(value: &Option<Decimal>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let Some(d) = value else {
            return s.serialize_none();
        };
        match d.to_f64() {
            Some(f) if Decimal::from_str(&f.to_string()).is_ok_and(|back| back == *d) => {
                s.serialize_f64(f)
            }
            _ => s.serialize_str(&d.normalize().to_string()),
        }
    }
}

/// Идентификатор: строка или число, пустая строка считается отсутствием
pub mod id {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Value>::deserialize(deserializer).map(|opt| match opt {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// Идентификатор сырой записи хранилища, по тем же правилам, что и `id`
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Обязательный идентификатор записи
pub mod required_id {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        id::deserialize(deserializer)?
            .ok_or_else(|| serde::de::Error::custom("record id is missing"))
    }
}

/// Дата `YYYY-MM-DD`, допускается полный timestamp
pub mod date {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Value>::deserialize(deserializer).map(|opt| match opt {
            Some(Value::String(s)) => s
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            _ => None,
        })
    }
}

/// null считается `false`
pub fn bool_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(|opt| match opt {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s == "true",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    })
}

/// Текст, null превращается в пустую строку
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(|opt| match opt {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// Необязательный текст, пустые строки отбрасываются
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    string(deserializer).map(|s| Some(s).filter(|s| !s.trim().is_empty()))
}

/// Значение, которое разбирается через `FromStr`; мусор становится `None`
pub fn parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    Option::<Value>::deserialize(deserializer).map(|opt| match opt {
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod test_serde_helpers {
    use rust_decimal_macros::dec;
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, with = "decimal")]
        rate: Option<Decimal>,
        #[serde(default, deserialize_with = "id::deserialize")]
        owner: Option<String>,
        #[serde(default, deserialize_with = "date::deserialize")]
        day: Option<NaiveDate>,
        #[serde(default, deserialize_with = "bool_false")]
        flag: bool,
    }

    fn row(json: &str) -> Row {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn decimal_accepts_numbers_and_strings() {
        assert_eq!(row(r#"{"rate": 50000}"#).rate, Some(dec!(50000)));
        assert_eq!(row(r#"{"rate": "80000.5"}"#).rate, Some(dec!(80000.5)));
        assert_eq!(row(r#"{"rate": 12.25}"#).rate, Some(dec!(12.25)));
    }

    #[test]
    fn decimal_degrades_to_none() {
        assert_eq!(row(r#"{"rate": ""}"#).rate, None);
        assert_eq!(row(r#"{"rate": null}"#).rate, None);
        assert_eq!(row(r#"{"rate": "abc"}"#).rate, None);
        assert_eq!(row(r#"{}"#).rate, None);
    }

    #[derive(serde::Serialize)]
    struct Out {
        #[serde(with = "decimal")]
        rate: Option<Decimal>,
    }

    #[test]
    fn decimal_written_without_loss() {
        let write = |rate| serde_json::to_value(Out { rate }).unwrap()["rate"].clone();
        assert_eq!(write(Some(dec!(1234.5))), serde_json::json!(1234.5));
        assert_eq!(
            write(Some(dec!(0.1234567890123456789012345678))),
            serde_json::json!("0.1234567890123456789012345678")
        );
        assert_eq!(write(None), Value::Null);
    }

    #[test]
    fn numeric_ids_become_strings() {
        assert_eq!(row(r#"{"owner": 17}"#).owner, Some("17".to_string()));
        assert_eq!(row(r#"{"owner": ""}"#).owner, None);
        assert_eq!(record_id(&serde_json::json!({"id": 17})), Some("17".to_string()));
        assert_eq!(record_id(&serde_json::json!({"name": "x"})), None);
    }

    #[test]
    fn dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(row(r#"{"day": "2024-03-05"}"#).day, expected);
        assert_eq!(row(r#"{"day": "2024-03-05T10:00:00.000Z"}"#).day, expected);
        assert_eq!(row(r#"{"day": "yesterday"}"#).day, None);
    }

    #[test]
    fn flags() {
        assert!(row(r#"{"flag": true}"#).flag);
        assert!(!row(r#"{"flag": null}"#).flag);
        assert!(row(r#"{"flag": 1}"#).flag);
    }
}
