use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::store::{Record, RecordFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Course,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDialog {
    pub open: bool,
    pub status: UploadStatus,
}

impl UploadDialog {
    pub fn message(&self) -> &'static str {
        match self.status {
            UploadStatus::Idle => "",
            UploadStatus::Succeeded => "File uploaded successfully",
            UploadStatus::Failed => "Failed to upload file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub id: String,
    pub fields: RecordFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheckbox {
    Unchecked,
    Indeterminate,
    Checked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FetchSucceeded(Vec<Record>),
    FilterChanged(String),
    SelectAll(bool),
    ToggleOne(String),
    DeleteSucceeded(String),
    DeleteSelectedSucceeded,
    OpenUpload,
    CloseUpload,
    UploadFinished(bool),
    OpenEditor(String),
    EditField(Field, String),
    CloseEditor,
    UpdateSucceeded(Record),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub records: Vec<Record>,
    pub selected: BTreeSet<String>,
    pub filter: String,
    pub upload: UploadDialog,
    pub editor: Option<EditForm>,
}

impl Default for TableState {
    fn default() -> Self {
        TableState {
            records: Vec::new(),
            selected: BTreeSet::new(),
            filter: String::new(),
            upload: UploadDialog {
                open: false,
                status: UploadStatus::Idle,
            },
            editor: None,
        }
    }
}

impl TableState {
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::FetchSucceeded(records) => {
                self.selected
                    .retain(|id| records.iter().any(|r| &r.id == id));
                self.records = records;
            }
            Action::FilterChanged(filter) => {
                self.selected.clear();
                self.filter = filter;
            }
            Action::SelectAll(true) => {
                self.selected = self.records.iter().map(|r| r.id.clone()).collect();
            }
            Action::SelectAll(false) => self.selected.clear(),
            Action::ToggleOne(id) => {
                if !self.selected.remove(&id) {
                    self.selected.insert(id);
                }
            }
            Action::DeleteSucceeded(id) => {
                self.records.retain(|r| r.id != id);
                self.selected.remove(&id);
            }
            Action::DeleteSelectedSucceeded => {
                let selected = std::mem::take(&mut self.selected);
                self.records.retain(|r| !selected.contains(&r.id));
            }
            Action::OpenUpload => {
                self.upload = UploadDialog {
                    open: true,
                    status: UploadStatus::Idle,
                };
            }
            Action::CloseUpload => {
                self.upload = UploadDialog {
                    open: false,
                    status: UploadStatus::Idle,
                };
            }
            Action::UploadFinished(ok) => {
                self.upload.status = if ok {
                    UploadStatus::Succeeded
                } else {
                    UploadStatus::Failed
                };
            }
            Action::OpenEditor(id) => {
                self.editor = self.records.iter().find(|r| r.id == id).map(|r| EditForm {
                    id: r.id.clone(),
                    fields: RecordFields {
                        name: r.name.clone(),
                        email: r.email.clone(),
                        course: r.course.clone(),
                    },
                });
            }
            Action::EditField(field, value) => {
                if let Some(form) = self.editor.as_mut() {
                    let slot = match field {
                        Field::Name => &mut form.fields.name,
                        Field::Email => &mut form.fields.email,
                        Field::Course => &mut form.fields.course,
                    };
                    *slot = Some(value);
                }
            }
            Action::CloseEditor => self.editor = None,
            Action::UpdateSucceeded(record) => {
                if let Some(slot) = self.records.iter_mut().find(|r| r.id == record.id) {
                    *slot = record;
                }
                self.editor = None;
            }
        }
    }

    // Case-insensitive match on name.
    pub fn visible(&self) -> Vec<&Record> {
        let needle = self.filter.trim().to_lowercase();
        self.records
            .iter()
            .filter(|r| {
                needle.is_empty()
                    || r.name
                        .as_deref()
                        .map(|n| n.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .collect()
    }

    pub fn header_checkbox(&self) -> HeaderCheckbox {
        let n = self.selected.len();
        if n > 0 && n == self.records.len() {
            HeaderCheckbox::Checked
        } else if n > 0 {
            HeaderCheckbox::Indeterminate
        } else {
            HeaderCheckbox::Unchecked
        }
    }

    pub fn can_delete_selected(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn delete_selected_body(&self) -> Value {
        json!({ "userIds": self.selected.iter().collect::<Vec<_>>() })
    }

    /// Target id and body for `PUT /update/{id}`. Always the full triple.
    pub fn update_body(&self) -> Option<(String, Value)> {
        let form = self.editor.as_ref()?;
        Some((
            form.id.clone(),
            json!({
                "name": form.fields.name.clone().unwrap_or_default(),
                "email": form.fields.email.clone().unwrap_or_default(),
                "course": form.fields.course.clone().unwrap_or_default(),
            }),
        ))
    }
}
