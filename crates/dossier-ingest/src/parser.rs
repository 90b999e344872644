//! Ingestion parser for plain-text dossiers.
//!
//! A document is split into `=== name ===` sections with line-oriented
//! `key: value` bodies. The reserved "общая сводка" section may hold
//! several records separated by `---` divider lines; every other section
//! is one record.

use chrono::NaiveDate;
use dossier_core::{EntityId, Repository};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};

static SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"=== (.*?) ===").unwrap());

/// Two or three capitalized Cyrillic tokens: surname, given name and an
/// optional patronymic.
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[А-ЯЁ][а-яё]+\s+[А-ЯЁ][а-яё]+(?:\s+[А-ЯЁ][а-яё]+)?").unwrap());

static DATE_DMY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}").unwrap());
static DATE_ISO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d\(\)\+\- ]{7,}").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w\.-]+@[\w\.-]+").unwrap());
static CAR_PLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[А-ЯЁа-яё]\d{3}[А-ЯЁа-яё]{2}\d{2,3}").unwrap());

/// Fields tried, in priority order, when resolving a record's name.
const NAME_FIELDS: [&str; 6] = [
    "фио",
    "имя клиента",
    "наименование клиента",
    "фам",
    "ф.и.о.",
    "личности",
];

const DATE_FIELDS: [&str; 4] = ["день рождения", "дата рождения", "birth_date", "дата"];

/// The section whose body holds multiple records.
const MULTI_RECORD_SECTION: &str = "общая сводка";

type Record = BTreeMap<String, String>;

/// Outcome of ingesting one document.
#[derive(Debug)]
pub struct IngestReport {
    pub source_file: String,
    /// Entities mentioned in this document, in first-mention order.
    /// This is the working set for the intra-document linking pass.
    pub entities: Vec<EntityId>,
    /// Records parsed into an entity.
    pub records: usize,
    /// Records discarded because no name could be resolved.
    pub skipped: usize,
}

/// Parses one document and populates the repository from it.
///
/// Never fails: unparseable records are counted in the report and the
/// rest of the document continues.
pub fn ingest_document(repo: &mut Repository, text: &str, source_file: &str) -> IngestReport {
    let mut report = IngestReport {
        source_file: source_file.to_string(),
        entities: Vec::new(),
        records: 0,
        skipped: 0,
    };

    for (name, body) in split_sections(text) {
        if name.to_lowercase().starts_with(MULTI_RECORD_SECTION) {
            for record in split_records(&body) {
                process_record(repo, &record, source_file, &mut report);
            }
        } else {
            let record = parse_record(body.lines());
            process_record(repo, &record, source_file, &mut report);
        }
    }

    info!(
        source_file,
        records = report.records,
        skipped = report.skipped,
        "ingested document"
    );
    report
}

/// Splits a document on `=== name ===` markers. Sections with an empty
/// name or body are dropped.
fn split_sections(text: &str) -> Vec<(String, String)> {
    let headers: Vec<(usize, usize, String)> = SECTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().trim().to_string();
            Some((whole.start(), whole.end(), name))
        })
        .collect();

    let mut sections = Vec::new();
    for (i, (_, body_start, name)) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
        let body = text[*body_start..body_end].trim().to_string();
        if !name.is_empty() && !body.is_empty() {
            sections.push((name.clone(), body));
        }
    }
    sections
}

/// Splits a multi-record body on `---` divider lines.
fn split_records(body: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("---") {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
        } else if let Some((key, value)) = line.split_once(':') {
            current.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    if !current.is_empty() {
        records.push(current);
    }
    records
}

/// Collects `key: value` lines into a field map.
fn parse_record<'a>(lines: impl Iterator<Item = &'a str>) -> Record {
    let mut record = Record::new();
    for line in lines.map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((key, value)) = line.split_once(':') {
            record.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    record
}

/// Resolves a record into an entity and populates its attributes.
fn process_record(
    repo: &mut Repository,
    record: &Record,
    source_file: &str,
    report: &mut IngestReport,
) {
    let (full_name, mut birth_date) = match resolve_name(record) {
        Some(resolved) => resolved,
        None => {
            debug!(source_file, "record without a resolvable name skipped");
            report.skipped += 1;
            return;
        }
    };

    if birth_date.is_none() {
        birth_date = resolve_birth_date(record);
    }

    let id = repo.get_or_create(&full_name, birth_date.as_deref());
    if let Some(entity) = repo.get_mut(id) {
        entity.source_files.insert(source_file.to_string());
        populate_attributes(entity, record);
    }

    if !report.entities.contains(&id) {
        report.entities.push(id);
    }
    report.records += 1;
}

/// Tries the name fields in priority order. First a name-shaped
/// substring; failing that, a trailing-date form like
/// "Коваль Павел Павлович 05.08.1990".
fn resolve_name(record: &Record) -> Option<(String, Option<String>)> {
    for field in NAME_FIELDS {
        let value = match record.get(field) {
            Some(v) => v,
            None => continue,
        };

        if let Some(found) = NAME_RE.find(value) {
            return Some((found.as_str().to_string(), None));
        }

        let parts: Vec<&str> = value.split_whitespace().collect();
        if parts.len() >= 4 && DATE_DMY_RE.is_match(parts[parts.len() - 1]) {
            return Some((
                parts[..3].join(" "),
                Some(parts[parts.len() - 1].to_string()),
            ));
        }
    }
    None
}

/// Accepts `DD.MM.YYYY` as-is, converts `YYYY-MM-DD`. Absence or a
/// malformed value is not an error.
fn resolve_birth_date(record: &Record) -> Option<String> {
    for field in DATE_FIELDS {
        let value = match record.get(field) {
            Some(v) => v,
            None => continue,
        };
        if DATE_DMY_RE.is_match(value) {
            return Some(value.clone());
        }
        if DATE_ISO_RE.is_match(value) {
            if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                return Some(date.format("%d.%m.%Y").to_string());
            }
        }
    }
    None
}

/// Populates attribute sets from the remaining fields. Each heuristic is
/// independent: a value that fails its shape check is not recorded.
fn populate_attributes(entity: &mut dossier_core::Entity, record: &Record) {
    if let Some(value) = record.get("телефон") {
        for group in PHONE_RE.find_iter(value) {
            let digits: String = group.as_str().chars().filter(char::is_ascii_digit).collect();
            if digits.len() >= 10 {
                entity.phones.insert(digits);
            }
        }
    }

    if let Some(value) = record.get("email") {
        for email in EMAIL_RE.find_iter(value) {
            entity.emails.insert(email.as_str().to_string());
        }
    }

    if let Some(value) = record.get("адрес") {
        if value.chars().count() > 5 {
            entity.addresses.insert(value.clone());
        }
    }

    if let Some(value) = record.get("паспорт") {
        if value.chars().count() >= 6 {
            entity.passports.insert(value.clone());
        }
    }

    if let Some(value) = record.get("автомобили") {
        for plate in CAR_PLATE_RE.find_iter(value) {
            entity.cars.insert(plate.as_str().to_string());
        }
    }

    if let Some(value) = record.get("снилс") {
        if value.chars().count() >= 11 {
            entity.snils = Some(value.clone());
        }
    }

    if let Some(value) = record.get("инн") {
        if value.chars().count() >= 10 {
            entity.inn = Some(value.clone());
        }
    }

    if let Some(value) = record.get("водительское удостоверение") {
        if value.chars().count() >= 6 {
            entity.driver_license = Some(value.clone());
        }
    }

    if let Some(value) = record.get("место работы") {
        entity.jobs.insert(value.clone());
    }

    if let Some(value) = record.get("ссылка") {
        if value.contains("vk.com") {
            entity
                .social_media
                .entry("vk".to_string())
                .or_default()
                .insert(value.clone());
        } else if value.contains("ok.ru") {
            entity
                .social_media
                .entry("ok".to_string())
                .or_default()
                .insert(value.clone());
        }
    }

    if record.contains_key("банк") || record.contains_key("счет") {
        let bank = record.get("банк").map(String::as_str).unwrap_or("");
        let account = record.get("счет").map(String::as_str).unwrap_or("");
        let joined = format!("{} {}", bank, account).trim().to_string();
        if !joined.is_empty() {
            entity.bank_accounts.insert(joined);
        }
    }
}
