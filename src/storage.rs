use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::{
    self, BillingRepo, ClientRepository, ContractRepository, PaymentRepository, ProjectRepository,
    TimeEntryRepository,
};
use crate::core::records::{Client, Contract, Payment, PaymentTarget, Project, RecordId, Snapshot, TimeEntry};
use crate::core::serde_helpers::record_id;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cant read storage file")]
    CantRead,
    #[error("cant parse storage file")]
    CantParse,
    #[error("cant write storage file")]
    CantWrite,
    #[error("cant init storage: {0}")]
    CantInit(String),
}

impl From<Error> for api::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::CantWrite | Error::CantInit(_) => api::Error::CantSave,
            Error::CantRead | Error::CantParse => api::Error::CantRead,
        }
    }
}

/// Документ хранилища как есть: чужие коллекции и поля переживают запись
type Document = Map<String, Value>;

const COLLECTIONS: [&str; 5] = ["clients", "contracts", "projects", "payments", "time_entries"];

/// Разбирает коллекцию по одной записи: битая запись пропускается, а не валит загрузку
fn collection<T: DeserializeOwned>(root: &Document, name: &str) -> Vec<T> {
    let Some(Value::Array(items)) = root.get(name) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            serde_json::from_value(item.clone())
                .map_err(|e| warn!("[billing_ledger] WARNING: пропускаю {name}[{i}]: {e}"))
                .ok()
        })
        .collect()
}

/// Коллекция для правки. Если на её месте не массив, он заменяется пустым.
fn records_mut<'a>(root: &'a mut Document, name: &str) -> Result<&'a mut Vec<Value>, Error> {
    let slot = root
        .entry(name.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        warn!("[billing_ledger] WARNING: {name} не массив, заменяю пустым");
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut().ok_or(Error::CantWrite)
}

fn record_to_value<T: Serialize>(record: &T) -> Result<Value, Error> {
    serde_json::to_value(record).map_err(|e| {
        error!("Невозможно сериализовать запись: {e}");
        Error::CantWrite
    })
}

/// Удаляет записи с данным id, возвращает сколько удалено
fn remove_by_id(records: &mut Vec<Value>, id: &str) -> usize {
    let before = records.len();
    records.retain(|r| record_id(r).as_deref() != Some(id));
    before - records.len()
}

fn read_document(path: &Path) -> Result<Document, Error> {
    let json_data = fs::read_to_string(path).map_err(|e| {
        error!("Невозможно прочитать файл: {e}");
        Error::CantRead
    })?;
    let value: Value = serde_json::from_str(&json_data).map_err(|e| {
        error!("Невозможно спарсить JSON файл {:?}: {e}", path.file_name());
        Error::CantParse
    })?;
    let Value::Object(root) = value else {
        error!("Хранилище {:?} должно быть JSON-объектом", path.file_name());
        return Err(Error::CantParse);
    };
    Ok(root)
}

fn write_document(path: &Path, root: &Document) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(root).map_err(|e| {
        error!("Невозможно сериализовать хранилище: {e}");
        Error::CantWrite
    })?;
    fs::write(path, json).map_err(|e| {
        error!("Невозможно записать файл {}: {e}", path.display());
        Error::CantWrite
    })
}

/// Читает JSON-хранилище в срез записей
///
/// # Arguments
///
/// * `path`: Путь к `db.json`
///
/// returns: Snapshot
///
/// # Errors
/// - `CantRead` - Проблема чтения файла
/// - `CantParse` - Файл не является JSON-объектом
///
pub fn snapshot_from_json(path: &Path) -> Result<Snapshot, Error> {
    let root = read_document(path)?;
    Ok(Snapshot {
        clients: collection(&root, "clients"),
        contracts: collection(&root, "contracts"),
        projects: collection(&root, "projects"),
        payments: collection(&root, "payments"),
        time_entries: collection(&root, "time_entries"),
    })
}

#[derive(Debug)]
pub struct FileSystem {
    root_dir: PathBuf,
    db_path: PathBuf,
}

impl FileSystem {
    const DB_FILE: &'static str = "db.json";

    fn root(&self) -> &PathBuf {
        &self.root_dir
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Подготавливает структуру хранилища (директория, пустой `db.json`)
    fn prepare_storage(&self) -> Result<(), Error> {
        info!("Хранилище не найдено, инициализирую: {}", self.root_dir.display());
        fs::create_dir_all(&self.root_dir)
            .map_err(|e| Error::CantInit(format!("Ошибка создания директории: {e}")))?;
        if !self.db_path.exists() {
            let empty: Document = COLLECTIONS
                .iter()
                .map(|name| (name.to_string(), Value::Array(Vec::new())))
                .collect();
            write_document(&self.db_path, &empty)?;
            info!("Создан файл хранилища: {}", self.db_path.display());
        }
        info!("Хранилище инициализировано: {}", self.root_dir.display());
        Ok(())
    }

    /// Инициализирует хранилище, если оно не инициализировано, и возвращает FileSystem
    pub fn init<P: AsRef<Path>>(root_dir: P) -> Result<Self, Error> {
        let root_dir = root_dir.as_ref().to_path_buf();
        let fs = Self {
            db_path: root_dir.join(Self::DB_FILE),
            root_dir,
        };
        if fs.root_dir.exists() && fs.db_path.exists() {
            return Ok(fs);
        }
        fs.prepare_storage()?;
        info!(fs = ?fs);
        Ok(fs)
    }

    fn load(&self) -> Result<Snapshot, api::Error> {
        Ok(snapshot_from_json(&self.db_path)?)
    }

    /// Читает, меняет и записывает документ. Трогаются только записи, которые меняет `change`.
    fn modify<T>(&self, change: impl FnOnce(&mut Document) -> Result<T, api::Error>) -> Result<T, api::Error> {
        let mut root = read_document(&self.db_path)?;
        let result = change(&mut root)?;
        write_document(&self.db_path, &root)?;
        info!("Записано в {:?}", self.db_path);
        Ok(result)
    }
}

impl ClientRepository for FileSystem {
    fn clients(&self) -> Result<Vec<Client>, api::Error> {
        Ok(self.load()?.clients)
    }
}

impl ContractRepository for FileSystem {
    fn contracts(&self) -> Result<Vec<Contract>, api::Error> {
        Ok(self.load()?.contracts)
    }
}

impl ProjectRepository for FileSystem {
    fn projects(&self) -> Result<Vec<Project>, api::Error> {
        Ok(self.load()?.projects)
    }

    fn delete_project(&self, id: &RecordId) -> Result<(), api::Error> {
        self.modify(|root| {
            if remove_by_id(records_mut(root, "projects")?, id) == 0 {
                return Err(api::Error::UnknownTarget(PaymentTarget::Project(id.clone())));
            }
            Ok(())
        })
    }
}

impl PaymentRepository for FileSystem {
    fn payments(&self) -> Result<Vec<Payment>, api::Error> {
        Ok(self.load()?.payments)
    }

    fn insert_payment(&self, payment: Payment) -> Result<RecordId, api::Error> {
        let value = record_to_value(&payment)?;
        self.modify(|root| {
            records_mut(root, "payments")?.push(value);
            Ok(payment.id)
        })
    }

    /// Поля платежа перекрывают сохранённые, остальные поля записи не трогаются
    fn update_payment(&self, payment: Payment) -> Result<(), api::Error> {
        let Value::Object(fields) = record_to_value(&payment)? else {
            return Err(Error::CantWrite.into());
        };
        self.modify(|root| {
            let slot = records_mut(root, "payments")?
                .iter_mut()
                .find(|r| record_id(r).as_deref() == Some(payment.id.as_str()))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| api::Error::UnknownPayment(payment.id.clone()))?;
            slot.extend(fields);
            Ok(())
        })
    }

    fn delete_payment(&self, id: &RecordId) -> Result<(), api::Error> {
        self.modify(|root| {
            if remove_by_id(records_mut(root, "payments")?, id) == 0 {
                return Err(api::Error::UnknownPayment(id.clone()));
            }
            Ok(())
        })
    }
}

impl TimeEntryRepository for FileSystem {
    fn time_entries(&self) -> Result<Vec<TimeEntry>, api::Error> {
        Ok(self.load()?.time_entries)
    }
}

impl BillingRepo for FileSystem {
    fn location(&self) -> &str {
        self.root().to_str().unwrap_or_default()
    }

    fn snapshot(&self) -> Result<Snapshot, api::Error> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn init_creates_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ledger");
        let fs = FileSystem::init(&root).unwrap();
        assert!(fs.db_path().exists());
        assert_eq!(fs.snapshot().unwrap(), Snapshot::default());

        // повторная инициализация не трогает данные
        fs.insert_payment(Payment {
            id: "p".to_string(),
            contract_id: Some("c".to_string()),
            amount: Some(dec!(1)),
            ..Default::default()
        })
        .unwrap();
        let again = FileSystem::init(&root).unwrap();
        assert_eq!(again.payments().unwrap().len(), 1);
    }

    #[test]
    fn broken_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{
                "clients": [{"id": 1, "name": "Acme"}, {"name": "sin id"}],
                "contracts": [{"id": "c1", "client_id": 1, "hourly_rate": "50000", "total_hours": ""}],
                "payments": "nope"
            }"#,
        )
        .unwrap();
        let snapshot = snapshot_from_json(&path).unwrap();
        assert_eq!(snapshot.clients.len(), 1);
        assert_eq!(snapshot.contracts[0].client_id.as_deref(), Some("1"));
        assert_eq!(snapshot.contracts[0].hourly_rate, Some(dec!(50000)));
        assert_eq!(snapshot.contracts[0].total_hours, None);
        assert!(snapshot.payments.is_empty());
        assert!(snapshot.projects.is_empty());
    }

    #[test]
    fn not_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(snapshot_from_json(&path), Err(Error::CantParse)));
        assert!(matches!(
            snapshot_from_json(&dir.path().join("missing.json")),
            Err(Error::CantRead)
        ));
    }

    #[test]
    fn writes_keep_foreign_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("db.json"),
            r#"{
                "clients": [{"id": "cl1", "name": "Acme", "address": "Calle 1"}],
                "contracts": [{"id": "c1", "client_id": "cl1", "hourly_rate": "12.3456789012345678901234"}],
                "projects": [{"id": "p1", "contract_id": "c1"}, {"name": "sin id"}],
                "payments": [{"id": "pay1", "contract_id": "c1", "amount": 10, "receipt": "r-1"}],
                "team_members": [{"id": "m1", "name": "Ana"}]
            }"#,
        )
        .unwrap();
        let fs = FileSystem::init(dir.path()).unwrap();

        fs.insert_payment(Payment {
            id: "pay2".to_string(),
            contract_id: Some("c1".to_string()),
            amount: Some(dec!(20)),
            ..Default::default()
        })
        .unwrap();
        let mut edited = fs.payments().unwrap()[0].clone();
        edited.amount = Some(dec!(15));
        fs.update_payment(edited).unwrap();
        fs.delete_project(&"p1".to_string()).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(fs.db_path()).unwrap()).unwrap();
        assert_eq!(raw["clients"][0]["address"], "Calle 1");
        assert_eq!(raw["team_members"][0]["name"], "Ana");
        assert_eq!(raw["projects"], serde_json::json!([{"name": "sin id"}]));
        assert_eq!(raw["contracts"][0]["hourly_rate"], "12.3456789012345678901234");
        assert_eq!(raw["payments"][0]["receipt"], "r-1");
        assert_eq!(raw["payments"][0]["amount"], 15.0);
        assert_eq!(raw["payments"][1]["id"], "pay2");
    }

    #[test]
    fn delete_missing_payment() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystem::init(dir.path()).unwrap();
        assert!(matches!(
            fs.delete_payment(&"ghost".to_string()),
            Err(api::Error::UnknownPayment(_))
        ));
    }
}
