use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::RecordError;
use crate::models::{AttendanceInput, AttendanceRecord, AttendanceStatus, Student};
use crate::store::{self, RecordStore};

#[derive(Debug, Clone, PartialEq)]
pub struct SheetEntry {
    pub student_id: Uuid,
    /// Roll number when the entry came from a roster, otherwise the id.
    pub label: String,
    pub is_present: bool,
}

impl SheetEntry {
    pub fn status(&self) -> AttendanceStatus {
        AttendanceStatus::from(self.is_present)
    }
}

/// A full student -> present/absent mapping for one date, edited in place
/// before it is submitted.
#[derive(Debug, Clone)]
pub struct AttendanceSheet {
    date: NaiveDate,
    entries: Vec<SheetEntry>,
}

impl AttendanceSheet {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    /// Every student on the roster starts out present.
    pub fn for_roster(date: NaiveDate, roster: &[Student]) -> Self {
        let entries = roster
            .iter()
            .map(|student| SheetEntry {
                student_id: student.id,
                label: student.roll_no.clone(),
                is_present: true,
            })
            .collect();
        Self { date, entries }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn entries(&self) -> &[SheetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets one student's mark, adding the student if the sheet lacks them.
    pub fn set(&mut self, student_id: Uuid, is_present: bool) {
        self.put(SheetEntry {
            student_id,
            label: student_id.to_string(),
            is_present,
        });
    }

    fn put(&mut self, entry: SheetEntry) {
        let existing = self
            .entries
            .iter()
            .position(|e| e.student_id == entry.student_id);
        match existing {
            Some(index) => self.entries[index].is_present = entry.is_present,
            None => self.entries.push(entry),
        }
    }

    /// Flips one student's mark. Returns false when they are not on the sheet.
    pub fn toggle(&mut self, student_id: Uuid) -> bool {
        match self.entry_mut(student_id) {
            Some(entry) => {
                entry.is_present = !entry.is_present;
                true
            }
            None => false,
        }
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) {
        for entry in &mut self.entries {
            entry.is_present = status.is_present();
        }
    }

    fn entry_mut(&mut self, student_id: Uuid) -> Option<&mut SheetEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.student_id == student_id)
    }
}

#[derive(Debug)]
pub struct EntryOutcome {
    pub entry: SheetEntry,
    pub result: Result<AttendanceRecord, RecordError>,
}

/// Per-student results of one submission, in sheet order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub date: NaiveDate,
    pub results: Vec<EntryOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.results.iter().filter(|o| o.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|o| o.result.is_ok())
    }

    /// A sheet holding only the entries that failed, for resubmission.
    pub fn retry_sheet(&self) -> AttendanceSheet {
        AttendanceSheet {
            date: self.date,
            entries: self.failures().map(|o| o.entry.clone()).collect(),
        }
    }
}

/// Groups raw attendance writes into one sheet per date, oldest first.
/// Inputs naming an unknown student or carrying no usable status come back
/// with their position instead. A later input for the same student and date
/// wins.
pub async fn sheets_from_inputs<S: RecordStore>(
    store: &S,
    inputs: &[AttendanceInput],
) -> (Vec<AttendanceSheet>, Vec<(usize, RecordError)>) {
    let mut sheets: BTreeMap<NaiveDate, AttendanceSheet> = BTreeMap::new();
    let mut rejected = Vec::new();

    for (index, input) in inputs.iter().enumerate() {
        let is_present = match input.presence() {
            Ok(flag) => flag,
            Err(err) => {
                rejected.push((index, err));
                continue;
            }
        };
        let student = match store::resolve_student(store, &input.student).await {
            Ok(student) => student,
            Err(err) => {
                rejected.push((index, err));
                continue;
            }
        };

        sheets
            .entry(input.date)
            .or_insert_with(|| AttendanceSheet::new(input.date))
            .put(SheetEntry {
                student_id: student.id,
                label: student.roll_no,
                is_present,
            });
    }

    (sheets.into_values().collect(), rejected)
}

/// Writes every entry as its own task. One student's failure never stops
/// the others; the outcome carries each result.
pub async fn submit<S: RecordStore>(store: &S, sheet: &AttendanceSheet) -> BatchOutcome {
    let date = sheet.date;
    let pending: Vec<_> = sheet
        .entries
        .iter()
        .map(|entry| {
            let store = store.clone();
            let (student_id, is_present) = (entry.student_id, entry.is_present);
            let handle = tokio::spawn(async move {
                store.upsert_attendance(student_id, date, is_present).await
            });
            (entry.clone(), handle)
        })
        .collect();

    let mut results = Vec::with_capacity(pending.len());
    for (entry, handle) in pending {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(RecordError::TaskAborted {
                student_id: entry.student_id,
                reason: err.to_string(),
            }),
        };
        if let Err(err) = &result {
            tracing::warn!(student = %entry.label, %date, error = %err, "attendance write failed");
        }
        results.push(EntryOutcome { entry, result });
    }

    let outcome = BatchOutcome { date, results };
    tracing::info!(
        %date,
        submitted = outcome.results.len(),
        succeeded = outcome.succeeded(),
        "attendance sheet submitted"
    );
    outcome
}
