//! Point editor
//!
//! Form state for adding and editing points. The editor only opens for a
//! signed-in admin and hands submissions to [`PointSync`]. A failed submit
//! keeps the form open with the error attached.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::SessionGate;
use crate::clock::Clock;
use crate::points::{Coordinates, JourneyId, Point, PointId};
use crate::sync::{PointDraft, PointSync, SyncError, UpdateDraft};

/// `datetime-local` input format
pub const TIMESTAMP_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Sign in to add or edit points")]
    NotSignedIn,

    #[error("Editor is closed")]
    NotOpen,

    #[error("Incomplete form: {0}")]
    Incomplete(String),

    #[error(transparent)]
    Submit(#[from] SyncError),
}

/// Render a timestamp for the time input
pub fn format_timestamp_input(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_INPUT_FORMAT).to_string()
}

/// Parse the time input, taking it as UTC
pub fn parse_timestamp_input(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_INPUT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorMode {
    /// New point at a picked location
    Add { coordinates: Coordinates },
    Edit { point: Point },
}

/// An open form
#[derive(Debug, Clone, PartialEq)]
pub struct PointForm {
    pub mode: EditorMode,
    pub title: String,
    pub url: String,
    /// Cover image URL. Only sent when adding, edits keep the stored cover.
    pub cover: String,
    /// Raw `datetime-local` value
    pub timestamp: String,
    /// Last submit failure, shown inline
    pub error: Option<String>,
}

impl PointForm {
    pub fn is_add(&self) -> bool {
        matches!(self.mode, EditorMode::Add { .. })
    }

    pub fn dialog_title(&self) -> &'static str {
        if self.is_add() {
            "Add New Point"
        } else {
            "Edit Point"
        }
    }

    pub fn submit_label(&self, loading: bool) -> &'static str {
        match (self.is_add(), loading) {
            (true, true) => "Adding Point...",
            (true, false) => "Add Point",
            (false, true) => "Updating Point...",
            (false, false) => "Update Point",
        }
    }

    /// Read-only location line
    pub fn location(&self) -> String {
        match &self.mode {
            EditorMode::Add { coordinates } => coordinates.to_string(),
            EditorMode::Edit { point } => point.coordinates.to_string(),
        }
    }

    /// Submit is possible once a time is entered
    pub fn is_valid(&self) -> bool {
        parse_timestamp_input(&self.timestamp).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Closed,
    Open(PointForm),
}

/// Add/edit dialog logic for one journey
pub struct PointEditor {
    sync: Arc<PointSync>,
    gate: Arc<SessionGate>,
    clock: Arc<dyn Clock>,
    journey: JourneyId,
    state: EditorState,
}

impl PointEditor {
    pub fn new(
        sync: Arc<PointSync>,
        gate: Arc<SessionGate>,
        clock: Arc<dyn Clock>,
        journey: JourneyId,
    ) -> Self {
        Self {
            sync,
            gate,
            clock,
            journey,
            state: EditorState::Closed,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn form(&self) -> Option<&PointForm> {
        match &self.state {
            EditorState::Open(form) => Some(form),
            EditorState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.form().is_some()
    }

    /// Submit button label, reflecting an in-flight write
    pub fn submit_label(&self) -> Option<&'static str> {
        let loading = self.sync.state().loading;
        self.form().map(|form| form.submit_label(loading))
    }

    /// Start a new point at a picked location. The form starts empty.
    pub fn open_add(&mut self, coordinates: Coordinates) -> Result<(), EditorError> {
        self.require_admin()?;
        self.state = EditorState::Open(PointForm {
            mode: EditorMode::Add { coordinates },
            title: String::new(),
            url: String::new(),
            cover: String::new(),
            timestamp: String::new(),
            error: None,
        });
        Ok(())
    }

    /// Edit an existing point, prefilled from it
    pub fn open_edit(&mut self, point: Point) -> Result<(), EditorError> {
        self.require_admin()?;
        self.state = EditorState::Open(PointForm {
            title: point.title.clone(),
            url: point.url.clone().unwrap_or_default(),
            cover: point.cover.clone().unwrap_or_default(),
            timestamp: format_timestamp_input(point.timestamp),
            error: None,
            mode: EditorMode::Edit { point },
        });
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        if let EditorState::Open(form) = &mut self.state {
            form.title = title.into();
        }
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        if let EditorState::Open(form) = &mut self.state {
            form.url = url.into();
        }
    }

    pub fn set_cover(&mut self, cover: impl Into<String>) {
        if let EditorState::Open(form) = &mut self.state {
            form.cover = cover.into();
        }
    }

    pub fn set_timestamp(&mut self, value: impl Into<String>) {
        if let EditorState::Open(form) = &mut self.state {
            form.timestamp = value.into();
        }
    }

    pub fn close(&mut self) {
        self.state = EditorState::Closed;
    }

    /// Send the form. On success the editor closes and returns the point id.
    pub async fn submit(&mut self) -> Result<PointId, EditorError> {
        let EditorState::Open(form) = &self.state else {
            return Err(EditorError::NotOpen);
        };
        let timestamp = parse_timestamp_input(&form.timestamp)
            .ok_or_else(|| EditorError::Incomplete("a time is required".to_string()))?;

        let result = match &form.mode {
            EditorMode::Add { coordinates } => {
                let draft = PointDraft {
                    title: form.title.clone(),
                    coordinates: Some(*coordinates),
                    cover: form.cover.clone(),
                    timestamp: Some(timestamp),
                    url: form.url.clone(),
                };
                self.sync.add_point(&self.journey, draft).await
            }
            EditorMode::Edit { point } => {
                let draft = UpdateDraft {
                    title: form.title.clone(),
                    url: form.url.clone(),
                    timestamp: Some(timestamp),
                };
                let id = point.id.clone();
                self.sync
                    .update_point(&self.journey, &id, draft)
                    .await
                    .map(|_| id)
            }
        };

        match result {
            Ok(id) => {
                self.close();
                Ok(id)
            }
            Err(e) => {
                if let EditorState::Open(form) = &mut self.state {
                    form.error = Some(e.to_string());
                }
                Err(EditorError::Submit(e))
            }
        }
    }

    fn require_admin(&self) -> Result<(), EditorError> {
        if self.gate.is_signed_in_at(self.clock.now()) {
            Ok(())
        } else {
            Err(EditorError::NotSignedIn)
        }
    }
}
