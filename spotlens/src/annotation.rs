//! Point annotation
//!
//! Labels positions of one coordinate set with class names. Every operation
//! except [`PointAnnotation::start`] needs a started annotation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use spotlens_core::constants::VALUE_COLUMN;
use spotlens_core::DataType;

use crate::coords::{Coord, CoordinateSet};
use crate::data::{FeatureData, RetrievedData, Row, Value};
use crate::{Error, Result};

/// Annotation in progress
#[derive(Debug, Clone)]
pub struct ActiveDraw {
    coords: CoordinateSet,
    positions: Arc<Vec<Coord>>,
    /// Class per `idx`
    labels: BTreeMap<usize, String>,
}

#[derive(Debug, Clone, Default)]
pub enum DrawState {
    #[default]
    NotStarted,
    Started(ActiveDraw),
}

/// Class labels assigned to positions
#[derive(Debug, Clone, Default)]
pub struct PointAnnotation {
    name: String,
    state: DrawState,
}

impl PointAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: DrawState::NotStarted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, DrawState::Started(_))
    }

    /// Begin annotating the hydrated set `coords`, dropping earlier labels
    pub fn start(&mut self, coords: &CoordinateSet) -> Result<()> {
        let positions = coords.all_positions()?;
        self.state = DrawState::Started(ActiveDraw {
            coords: coords.clone(),
            positions,
            labels: BTreeMap::new(),
        });
        Ok(())
    }

    fn active(&self) -> Result<&ActiveDraw> {
        match &self.state {
            DrawState::Started(active) => Ok(active),
            DrawState::NotStarted => Err(Error::AnnotationNotStarted),
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveDraw> {
        match &mut self.state {
            DrawState::Started(active) => Ok(active),
            DrawState::NotStarted => Err(Error::AnnotationNotStarted),
        }
    }

    /// Assign `class` to positions by `idx`; unknown positions are skipped
    ///
    /// Returns how many positions were labelled.
    pub fn label(&mut self, idxs: impl IntoIterator<Item = usize>, class: &str) -> Result<usize> {
        let active = self.active_mut()?;
        let len = active.positions.len();
        let mut labelled = 0;
        for idx in idxs.into_iter().filter(|&idx| idx < len) {
            active.labels.insert(idx, class.to_string());
            labelled += 1;
        }
        Ok(labelled)
    }

    /// Remove labels from positions, returning how many were removed
    pub fn clear(&mut self, idxs: impl IntoIterator<Item = usize>) -> Result<usize> {
        let active = self.active_mut()?;
        Ok(idxs
            .into_iter()
            .filter(|idx| active.labels.remove(idx).is_some())
            .count())
    }

    pub fn labels(&self) -> Result<&BTreeMap<usize, String>> {
        Ok(&self.active()?.labels)
    }

    pub fn classes(&self) -> Result<BTreeSet<&str>> {
        Ok(self.active()?.labels.values().map(String::as_str).collect())
    }

    /// Stop annotating and hand back the labels
    pub fn finish(&mut self) -> Result<BTreeMap<usize, String>> {
        match std::mem::take(&mut self.state) {
            DrawState::Started(active) => Ok(active.labels),
            DrawState::NotStarted => Err(Error::AnnotationNotStarted),
        }
    }

    /// Labelled positions as a categorical feature with its own positions
    pub fn to_retrieved(&self) -> Result<RetrievedData> {
        let active = self.active()?;
        let rows = active
            .labels
            .iter()
            .filter_map(|(&idx, class)| {
                let coord = active.positions.get(idx)?;
                let mut row = Row::new();
                row.insert("x".into(), Value::Number(coord.x));
                row.insert("y".into(), Value::Number(coord.y));
                if let Some(id) = &coord.id {
                    row.insert("id".into(), Value::Text(id.to_string()));
                }
                row.insert(VALUE_COLUMN.into(), Value::Text(class.clone()));
                Some(row)
            })
            .collect();

        Ok(RetrievedData::new(DataType::Categorical, FeatureData::Rows(rows))
            .with_scale(active.coords.m_per_px(), active.coords.size()))
    }
}
