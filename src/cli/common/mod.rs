// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Things shared by `calpipe` subcommands: reading arguments files and
//! printing summaries.

mod printers;

pub(super) use printers::{display_warnings, InfoPrinter, Warn};

use std::path::PathBuf;

use itertools::Itertools;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::CalpipeError;
use crate::tasks::TaskArgs;

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(CalpipeError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(CalpipeError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(CalpipeError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

/// Consolidate the arguments given on the command line with those in an
/// arguments file, preferring the command line.
///
/// This function should only ever merge arguments, and not try to make sense
/// of them; that happens when they're resolved against the context.
pub(super) fn merge_args<A>(cli_args: A, args_file: Option<PathBuf>) -> Result<A, CalpipeError>
where
    A: TaskArgs + DeserializeOwned,
{
    match args_file {
        Some(arg_file) => {
            debug!("Merging command-line arguments with the argument file");
            let file_args: A = unpack_arg_file!(arg_file);
            Ok(cli_args.merge(file_args))
        }
        None => Ok(cli_args),
    }
}

/// Write arguments into a TOML file that can be given back as an arguments
/// file.
pub(super) fn write_toml<A: Serialize>(args: &A, file: &std::path::Path) -> Result<(), CalpipeError> {
    use std::{
        fs::File,
        io::{BufWriter, Write},
    };

    let toml_str = toml::to_string(args)
        .map_err(|e| CalpipeError::ArgFile(format!("Couldn't serialise arguments to toml: {e}")))?;
    let mut f = BufWriter::new(File::create(file)?);
    f.write_all(toml_str.as_bytes())?;
    debug!("Wrote arguments to {}", file.display());
    Ok(())
}
