//! Display collections that keep their order across reloads.
//!
//! A [`SortStableCollection`] owns the rows of one tab. Every reload
//! recomputes the side table, then re-applies either the user's pinned
//! column or the kind's default order, so the view never falls back to
//! arrival order.

pub mod columns;

use crate::resource::{Resource, ResourceKind};
use columns::{table, Column, KindTable};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A comparable value extracted from a resource for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Lowercased text.
    Text(String),
    /// Numeric value; `None` for missing or non-numeric data.
    Number(Option<f64>),
}

impl SortKey {
    /// Case-insensitive text key.
    #[must_use]
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_lowercase())
    }

    /// Numeric key from an optional integer.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn number(n: Option<i64>) -> Self {
        Self::Number(n.map(|v| v as f64))
    }

    /// Compares in the given direction. Missing numbers sort after every
    /// valid value in both directions.
    #[must_use]
    pub fn compare(&self, other: &Self, direction: SortDirection) -> Ordering {
        match (self, other) {
            (Self::Number(Some(a)), Self::Number(Some(b))) => direction.apply(a.total_cmp(b)),
            (Self::Number(Some(_)), Self::Number(None)) => Ordering::Less,
            (Self::Number(None), Self::Number(Some(_))) => Ordering::Greater,
            (Self::Number(None), Self::Number(None)) => Ordering::Equal,
            (Self::Text(a), Self::Text(b)) => direction.apply(a.cmp(b)),
            // A column never mixes key types.
            (Self::Text(_), Self::Number(_)) | (Self::Number(_), Self::Text(_)) => Ordering::Equal,
        }
    }

    /// Ascending comparison.
    #[must_use]
    pub fn cmp_asc(&self, other: &Self) -> Ordering {
        self.compare(other, SortDirection::Ascending)
    }

    /// Descending comparison.
    #[must_use]
    pub fn cmp_desc(&self, other: &Self) -> Ordering {
        self.compare(other, SortDirection::Descending)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Header arrow.
    #[must_use]
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Ascending => "▲",
            Self::Descending => "▼",
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// The active sort of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    /// True once the user has pinned a column.
    pub explicit: bool,
    /// Pinned column index; meaningful only when `explicit`.
    pub column: usize,
    /// Pinned direction; meaningful only when `explicit`.
    pub direction: SortDirection,
}

/// Ok/warning/critical check counts for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    /// Status 0.
    pub ok: u32,
    /// Status 1.
    pub warning: u32,
    /// Status 2.
    pub critical: u32,
}

impl CheckCounts {
    /// The worst status present, if any check was counted.
    #[must_use]
    pub fn worst(&self) -> Option<i64> {
        if self.critical > 0 {
            Some(2)
        } else if self.warning > 0 {
            Some(1)
        } else if self.ok > 0 {
            Some(0)
        } else {
            None
        }
    }
}

/// Derived per-item metrics, keyed by `(item name, connection name)`.
///
/// Preprocessing writes here and never into the resources themselves.
#[derive(Debug, Clone, Default)]
pub struct SideTable {
    check_counts: HashMap<(String, String), CheckCounts>,
}

impl SideTable {
    /// Check counts for an entity.
    #[must_use]
    pub fn check_counts(&self, entity: &str, connection: &str) -> Option<&CheckCounts> {
        self.check_counts.get(&(entity.to_string(), connection.to_string()))
    }

    pub(crate) fn clear_check_counts(&mut self) {
        self.check_counts.clear();
    }

    pub(crate) fn ensure_check_counts(&mut self, entity: &str, connection: &str) {
        self.check_counts
            .entry((entity.to_string(), connection.to_string()))
            .or_default();
    }

    /// Counts one check result. Statuses other than 0, 1 and 2 are ignored.
    pub(crate) fn record_check(&mut self, entity: &str, connection: &str, status: i64) {
        let counts = self
            .check_counts
            .entry((entity.to_string(), connection.to_string()))
            .or_default();
        match status {
            0 => counts.ok += 1,
            1 => counts.warning += 1,
            2 => counts.critical += 1,
            _ => {}
        }
    }
}

/// Inputs to the preprocessing hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreprocessParams<'a> {
    /// Current events, used to count checks per entity. `None` keeps the
    /// counts from the previous reload.
    pub events: Option<&'a [Resource]>,
}

/// Ordered rows of one resource kind plus the user's sort choice.
#[derive(Debug)]
pub struct SortStableCollection {
    table: &'static KindTable,
    resources: Vec<Resource>,
    side: SideTable,
    sort: SortState,
}

impl SortStableCollection {
    /// Creates an empty collection in default order.
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            table: table(kind),
            resources: Vec::new(),
            side: SideTable::default(),
            sort: SortState::default(),
        }
    }

    /// Replaces the rows, runs preprocessing and re-applies the active sort.
    pub fn reload(&mut self, resources: Vec<Resource>, params: &PreprocessParams<'_>) {
        (self.table.preprocess)(&resources, params, &mut self.side);
        self.resources = resources;
        self.apply_sort();
    }

    /// Re-runs preprocessing over the current rows, e.g. after the sibling
    /// collection it derives metrics from has changed.
    pub fn reprocess(&mut self, params: &PreprocessParams<'_>) {
        (self.table.preprocess)(&self.resources, params, &mut self.side);
        self.apply_sort();
    }

    /// Sorts by `column`. Selecting the pinned column again flips its
    /// direction; any other column is pinned ascending. Returns false for
    /// an out-of-range column.
    pub fn user_sort(&mut self, column: usize) -> bool {
        if column >= self.table.columns.len() {
            return false;
        }
        if self.sort.explicit && self.sort.column == column {
            self.sort.direction = self.sort.direction.flip();
        } else {
            self.sort = SortState {
                explicit: true,
                column,
                direction: SortDirection::Ascending,
            };
        }
        self.apply_sort();
        true
    }

    /// Drops the pinned column and returns to the default order.
    pub fn clear_sort(&mut self) {
        self.sort = SortState::default();
        self.apply_sort();
    }

    fn apply_sort(&mut self) {
        let table = self.table;
        let side = &self.side;

        if self.sort.explicit {
            let column = &table.columns[self.sort.column];
            let direction = self.sort.direction;
            let mut keyed: Vec<(_, Resource)> = self
                .resources
                .drain(..)
                .map(|r| ((column.key)(&r, side), r))
                .collect();
            keyed.sort_by(|(ka, a), (kb, b)| {
                ka.compare(kb, direction)
                    .then_with(|| (table.default_order)(a, b, side))
            });
            self.resources = keyed.into_iter().map(|(_, r)| r).collect();
        } else {
            self.resources.sort_by(|a, b| (table.default_order)(a, b, side));
        }
    }

    /// The resource kind shown.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.table.kind
    }

    /// Rows in display order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Column definitions.
    #[must_use]
    pub fn columns(&self) -> &'static [Column] {
        self.table.columns
    }

    /// Rendered cells in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.resources
            .iter()
            .map(|r| self.table.columns.iter().map(|c| (c.cell)(r, &self.side)).collect())
            .collect()
    }

    /// Severity of one row for styling.
    #[must_use]
    pub fn severity(&self, resource: &Resource) -> Option<i64> {
        (self.table.severity)(resource, &self.side)
    }

    /// The active sort.
    #[must_use]
    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    /// Derived metrics from the last reload.
    #[must_use]
    pub fn side_table(&self) -> &SideTable {
        &self.side
    }
}
