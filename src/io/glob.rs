// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::PathBuf;

use glob::glob;
use log::debug;
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem.
pub fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

/// Expand each of the patterns, keeping the order of the patterns. Strings
/// without glob characters are passed through, whether they exist or not; a
/// pattern that matches nothing is an error. Duplicates are dropped.
pub fn expand_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>, GlobError> {
    let mut paths: Vec<PathBuf> = vec![];
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matches = if pattern.contains(['*', '?', '[']) {
            let matches = get_all_matches_from_glob(pattern)?;
            if matches.is_empty() {
                return Err(GlobError::NoMatches {
                    glob: pattern.to_string(),
                });
            }
            debug!("{pattern} matched {} file(s)", matches.len());
            matches
        } else {
            vec![PathBuf::from(pattern)]
        };
        for m in matches {
            if !paths.contains(&m) {
                paths.push(m);
            }
        }
    }
    Ok(paths)
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error("No glob matches were found for {glob}")]
    NoMatches { glob: String },

    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}
