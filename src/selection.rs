// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers for the data-selection syntax understood by the external toolkit.
//!
//! A selection is a comma-separated list of elements. Each element is an ID
//! (`5`), an inclusive ID range (`0~3`) or a name, which may contain `*`
//! wildcards (`J1331*`). Spectral-window selections may carry a channel part
//! (`3:10~20`); only the window part matters here. An empty selection selects
//! everything.

use itertools::Itertools;
use regex::Regex;
use thiserror::Error;

/// Something that can be picked out of a measurement set with a selection
/// string.
pub trait Selectable {
    fn id(&self) -> usize;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Id(usize),
    Range(usize, usize),
    Name(String),
}

impl Element {
    fn parse(s: &str) -> Result<Element, SelectionError> {
        // Drop any channel selection.
        let s = s.split(':').next().unwrap_or("").trim();
        if s.is_empty() {
            return Err(SelectionError::EmptyElement);
        }

        if let Some((start, end)) = s.split_once('~') {
            if let (Ok(start), Ok(end)) = (start.trim().parse(), end.trim().parse()) {
                if start > end {
                    return Err(SelectionError::BackwardsRange {
                        element: s.to_string(),
                    });
                }
                return Ok(Element::Range(start, end));
            }
        }

        match s.parse() {
            Ok(id) => Ok(Element::Id(id)),
            Err(_) => Ok(Element::Name(s.to_string())),
        }
    }

    fn matches<T: Selectable>(&self, item: &T) -> Result<bool, SelectionError> {
        let is_match = match self {
            Element::Id(id) => item.id() == *id,
            Element::Range(start, end) => (*start..=*end).contains(&item.id()),
            Element::Name(name) if name.contains('*') => wildcard_regex(name)?.is_match(item.name()),
            Element::Name(name) => item.name() == name,
        };
        Ok(is_match)
    }
}

fn wildcard_regex(pattern: &str) -> Result<Regex, SelectionError> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$")).map_err(|e| SelectionError::Pattern {
        pattern: pattern.to_string(),
        err: e.to_string(),
    })
}

/// Select items with a selection string. The result is in the order of
/// `items` and contains no duplicates. An element that matches nothing is an
/// error.
pub fn select<'a, T: Selectable>(items: &'a [T], selection: &str) -> Result<Vec<&'a T>, SelectionError> {
    if selection.trim().is_empty() {
        return Ok(items.iter().collect());
    }

    let elements: Vec<Element> = selection.split(',').map(Element::parse).try_collect()?;
    let mut selected = vec![false; items.len()];
    for (element, raw) in elements.iter().zip(selection.split(',')) {
        let mut found = false;
        for (item, flag) in items.iter().zip(selected.iter_mut()) {
            if element.matches(item)? {
                *flag = true;
                found = true;
            }
        }
        if !found {
            return Err(SelectionError::NoMatch {
                element: raw.trim().to_string(),
            });
        }
    }

    Ok(items
        .iter()
        .zip(selected)
        .filter_map(|(item, s)| if s { Some(item) } else { None })
        .collect())
}

/// Compress a comma-separated list of integers into ranges, e.g. "0,1,2,3,5"
/// becomes "0~3,5". Anything that isn't a plain list of integers (names,
/// existing ranges, channel selections) is returned unchanged.
pub fn find_ranges(s: &str) -> String {
    if s.trim().is_empty() || s.contains(':') {
        return s.to_string();
    }
    let ids: Result<Vec<i64>, _> = s.split(',').map(|e| e.trim().parse::<i64>()).collect();
    let mut ids = match ids {
        Ok(ids) => ids,
        Err(_) => return s.to_string(),
    };
    ids.sort_unstable();
    ids.dedup();

    let mut runs: Vec<(i64, i64)> = vec![];
    for id in ids {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == id => *end = id,
            _ => runs.push((id, id)),
        }
    }
    runs.into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}~{end}")
            }
        })
        .join(",")
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Selection contains an empty element")]
    EmptyElement,

    #[error("Selection range '{element}' goes backwards")]
    BackwardsRange { element: String },

    #[error("Selection element '{element}' did not match anything")]
    NoMatch { element: String },

    #[error("Couldn't turn '{pattern}' into a pattern: {err}")]
    Pattern { pattern: String, err: String },
}
