//! Consolidated medical report for one visit record.
//!
//! [`ReportAssembler::build_report`] resolves the record, reads its
//! prescriptions, vaccinations and lab results concurrently and produces a
//! [`MedicalReport`]; [`pdf::render`] turns that model into PDF bytes.
//!
//! Children are read without any coordination with deletes. A report built
//! while the record is being deleted shows whichever children still existed
//! when each collection was read.

pub mod pdf;

use axum::http::HeaderMap;
use axum::http::header::HOST;
use url::Url;
use vetcare_core::{LabResult, Prescription, Record, ResourceRef, Timestamp, Vaccination, now_utc};

use crate::entity_store::EntityStores;
use crate::error::LifecycleError;

pub const EMPTY_SECTION_PLACEHOLDER: &str = "— None —";
pub const REPORT_TITLE: &str = "Veterinary Medical Record";

/// One rendered line, optionally clickable.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub text: String,
    pub link: Option<Url>,
}

impl ReportLine {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub title: &'static str,
    pub lines: Vec<ReportLine>,
}

impl ReportSection {
    /// Builds a section; an empty item list renders the placeholder line.
    fn new(title: &'static str, lines: Vec<ReportLine>) -> Self {
        let lines = if lines.is_empty() {
            vec![ReportLine::text(EMPTY_SECTION_PLACEHOLDER)]
        } else {
            lines
        };
        Self { title, lines }
    }

    pub fn is_placeholder(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].text == EMPTY_SECTION_PLACEHOLDER
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MedicalReport {
    pub title: String,
    pub record_id: u64,
    pub generated_at: Timestamp,
    /// Visit summary as label/value pairs.
    pub summary: Vec<(&'static str, String)>,
    pub prescriptions: ReportSection,
    pub vaccinations: ReportSection,
    pub lab_results: ReportSection,
}

impl MedicalReport {
    pub fn sections(&self) -> [&ReportSection; 3] {
        [&self.prescriptions, &self.vaccinations, &self.lab_results]
    }

    /// Download name, `MedicalRecord_<RecordId>.pdf`.
    pub fn file_name(&self) -> String {
        format!("MedicalRecord_{}.pdf", self.record_id)
    }
}

/// Builds reports from the entity stores.
#[derive(Clone)]
pub struct ReportAssembler {
    stores: EntityStores,
    public_base_url: Option<Url>,
}

impl ReportAssembler {
    /// `public_base_url`, when set, overrides the request origin for file links.
    pub fn new(stores: EntityStores, public_base_url: Option<Url>) -> Self {
        Self {
            stores,
            public_base_url: public_base_url.map(with_trailing_slash),
        }
    }

    /// Assembles the report for a record given by storage id or `RecordId`.
    ///
    /// `request_origin` is used to absolutize relative lab file paths when no
    /// public base URL is configured.
    pub async fn build_report(
        &self,
        reference: &ResourceRef,
        request_origin: Option<&Url>,
    ) -> Result<MedicalReport, LifecycleError> {
        let record = self.stores.records.require(reference).await?;
        let record_id = record.record_id;

        let (prescriptions, vaccinations, lab_results) = tokio::try_join!(
            self.stores.prescriptions.list_by_record(record_id),
            self.stores.vaccinations.list_by_record(record_id),
            self.stores.lab_results.list_by_record(record_id),
        )?;

        let base = self.public_base_url.as_ref().or(request_origin);
        let lab_lines = lab_results
            .iter()
            .map(|lab| lab_line(lab, base))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            record_id,
            prescriptions = prescriptions.len(),
            vaccinations = vaccinations.len(),
            lab_results = lab_results.len(),
            "assembled medical report"
        );

        Ok(MedicalReport {
            title: REPORT_TITLE.to_string(),
            record_id,
            generated_at: now_utc(),
            summary: summary(&record),
            prescriptions: ReportSection::new(
                "Prescriptions",
                prescriptions.iter().map(prescription_line).collect(),
            ),
            vaccinations: ReportSection::new(
                "Vaccinations",
                vaccinations.iter().map(vaccination_line).collect(),
            ),
            lab_results: ReportSection::new("Lab Results", lab_lines),
        })
    }
}

fn summary(record: &Record) -> Vec<(&'static str, String)> {
    vec![
        ("Record ID", record.record_id.to_string()),
        ("Pet ID", record.pet_id.clone()),
        ("Vet ID", record.vet_id.clone()),
        ("Visit Date", record.visit_date.date_string()),
        ("Diagnosis", record.diagnosis.clone()),
        ("Treatment", record.treatment.clone()),
        ("Notes", record.notes.clone().unwrap_or_else(|| "-".into())),
    ]
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

fn prescription_line(p: &Prescription) -> ReportLine {
    let mut text = format!(
        "#{} {} | Dosage: {} | Frequency: {} | Duration: {} | Cost: {:.2}",
        p.prescription_id,
        p.medication,
        p.dosage,
        or_dash(p.frequency.as_deref()),
        p.duration,
        p.cost
    );
    if let Some(instructions) = p.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
        text.push_str(&format!(" | Instructions: {instructions}"));
    }
    ReportLine::text(text)
}

fn vaccination_line(v: &Vaccination) -> ReportLine {
    let next_due = v.next_due_date.map(|d| d.date_string());
    ReportLine::text(format!(
        "#{} {} | Administered: {} | Next due: {} | Batch: {} | Cost: {:.2}",
        v.vaccination_id,
        v.vaccine_name,
        v.date_administered.date_string(),
        or_dash(next_due.as_deref()),
        or_dash(v.batch_number.as_deref()),
        v.cost
    ))
}

fn lab_line(lab: &LabResult, base: Option<&Url>) -> Result<ReportLine, LifecycleError> {
    let test_date = lab.test_date.map(|d| d.date_string());
    let mut text = format!(
        "#{} {} | Date: {} | Result: {} | Cost: {:.2}",
        lab.lab_result_id,
        lab.test_type,
        or_dash(test_date.as_deref()),
        or_dash(lab.result.as_deref()),
        lab.cost
    );
    let link = match lab.file_url.as_deref() {
        Some(raw) => resolve_file_url(raw, base).inspect_err(|e| {
            tracing::error!(
                lab_result_id = lab.lab_result_id,
                file_url = raw,
                error = %e,
                "unusable lab file link"
            );
        })?,
        None => None,
    };
    if let Some(ref url) = link {
        text.push_str(&format!(" | File: {url}"));
    }
    Ok(ReportLine { text, link })
}

/// Turns a stored file URL into an absolute link.
///
/// Absolute http(s) URLs are kept; relative paths are joined onto `base`.
/// A blank value has no link.
pub fn resolve_file_url(raw: &str, base: Option<&Url>) -> Result<Option<Url>, LifecycleError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                LifecycleError::report(format!("no base URL to resolve file link '{raw}'"))
            })?;
            base.join(raw)
                .map_err(|e| LifecycleError::report(format!("invalid file link '{raw}': {e}")))?
        }
        Err(e) => {
            return Err(LifecycleError::report(format!(
                "invalid file link '{raw}': {e}"
            )));
        }
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LifecycleError::report(format!(
            "file link '{raw}' must use http or https"
        )));
    }
    Ok(Some(url))
}

/// Origin of the current request, e.g. `https://clinic.example.com/`.
///
/// Forwarded headers are only read when `trust_forwarded` is set.
pub fn request_origin(headers: &HeaderMap, trust_forwarded: bool) -> Option<Url> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let forwarded_host = trust_forwarded.then(|| header("x-forwarded-host")).flatten();
    let host = forwarded_host.or_else(|| header(HOST.as_str()))?;
    let scheme = trust_forwarded
        .then(|| header("x-forwarded-proto"))
        .flatten()
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or("http");

    Url::parse(&format!("{scheme}://{host}/")).ok()
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
