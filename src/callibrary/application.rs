// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{fmt, path::Path};

use log::trace;
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use super::{CalFrom, CalLibraryError, CalTo, CalType};
use crate::executor::{ArgValue, JobRequest};

/// Which task made a calibration, and with what inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalAppOrigin {
    pub task: String,
    pub inputs: serde_json::Value,
}

/// Caltables (in application order) mapped to the data they apply to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalApplication {
    pub calto: CalTo,
    pub calfrom: Vec1<CalFrom>,

    #[serde(default)]
    pub origin: Option<CalAppOrigin>,
}

impl CalApplication {
    pub fn new(calto: CalTo, calfrom: Vec1<CalFrom>) -> CalApplication {
        CalApplication {
            calto,
            calfrom,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: CalAppOrigin) -> CalApplication {
        self.origin = Some(origin);
        self
    }

    /// Whether every caltable of this application exists on disk.
    pub fn exists(&self) -> bool {
        self.calfrom
            .iter()
            .all(|cf| Path::new(cf.gaintable()).exists())
    }

    pub fn gaintables(&self) -> Vec<&str> {
        self.calfrom.iter().map(|cf| cf.gaintable()).collect()
    }

    /// This application as an `applycal` job. Application parameters are
    /// scalars when there's only one caltable.
    pub fn as_job(&self) -> JobRequest {
        fn scalar_or_list<T, F>(calfroms: &Vec1<CalFrom>, f: F) -> ArgValue
        where
            F: Fn(&CalFrom) -> T,
            T: Into<ArgValue>,
        {
            let mut values: Vec<ArgValue> = calfroms.iter().map(|cf| f(cf).into()).collect();
            if values.len() == 1 {
                values.remove(0)
            } else {
                ArgValue::List(values)
            }
        }

        JobRequest::new("applycal")
            .arg("vis", self.calto.vis())
            .arg("field", self.calto.field())
            .arg("intent", self.calto.intent())
            .arg("spw", self.calto.spw())
            .arg("antenna", self.calto.antenna())
            .arg("gaintable", scalar_or_list(&self.calfrom, |cf| cf.gaintable().to_string()))
            .arg("gainfield", scalar_or_list(&self.calfrom, |cf| cf.gainfield().to_string()))
            .arg("spwmap", scalar_or_list(&self.calfrom, |cf| cf.spwmap().to_vec()))
            .arg("interp", scalar_or_list(&self.calfrom, |cf| cf.interp().to_string()))
            .arg("calwt", scalar_or_list(&self.calfrom, |cf| cf.calwt()))
    }

    /// This application as an `applycal(...)` call string.
    pub fn as_applycal(&self) -> String {
        self.as_job().to_string()
    }

    /// Read an application back from an `applycal(...)` call string. Caltypes
    /// aren't part of the call, so they're inferred from the caltable names.
    pub fn from_export(line: &str) -> Result<CalApplication, CalLibraryError> {
        let bad = |err: String| CalLibraryError::BadExport {
            line: line.trim().to_string(),
            err,
        };
        let job: JobRequest = line.trim().parse().map_err(|e: crate::executor::CallParseError| bad(e.to_string()))?;
        if job.fn_name != "applycal" {
            return Err(bad(format!("expected an applycal call, got '{}'", job.fn_name)));
        }

        let get_str = |key: &str| -> Result<Option<String>, CalLibraryError> {
            match job.get(key) {
                None => Ok(None),
                Some(ArgValue::Str(s)) => Ok(Some(s.clone())),
                Some(other) => Err(bad(format!("'{key}' should be a string, got {other}"))),
            }
        };
        let vis = get_str("vis")?.ok_or_else(|| bad("no 'vis'".to_string()))?;
        let calto = CalTo::from_parts(
            &vis,
            get_str("field")?.as_deref(),
            get_str("spw")?.as_deref(),
            get_str("antenna")?.as_deref(),
            get_str("intent")?.as_deref(),
        );

        // Single values are wrapped in a list, e.g. 'm31' -> ['m31'].
        let listify = |key: &str| -> Vec<ArgValue> {
            match job.get(key) {
                None => vec![],
                Some(ArgValue::List(l)) => l.clone(),
                Some(v) => vec![v.clone()],
            }
        };
        let gaintables = listify("gaintable");
        if gaintables.is_empty() {
            return Err(bad("no 'gaintable'".to_string()));
        }
        let n = gaintables.len();

        let strings = |key: &str, default: &str| -> Result<Vec<String>, CalLibraryError> {
            let values = listify(key);
            if values.is_empty() {
                return Ok(vec![default.to_string(); n]);
            }
            if values.len() != n {
                return Err(bad(format!("'{key}' has {} values but there are {n} gaintables", values.len())));
            }
            values
                .into_iter()
                .map(|v| match v {
                    ArgValue::Str(s) => Ok(s),
                    other => Err(bad(format!("'{key}' values should be strings, got {other}"))),
                })
                .collect()
        };
        let gaintables = strings("gaintable", "")?;
        let gainfields = strings("gainfield", "")?;
        let interps = strings("interp", crate::constants::DEFAULT_INTERP)?;

        let calwts: Vec<bool> = match listify("calwt") {
            v if v.is_empty() => vec![true; n],
            v if v.len() == n => v
                .into_iter()
                .map(|v| v.as_bool().ok_or_else(|| bad(format!("calwt values should be booleans, got {v}"))))
                .collect::<Result<_, _>>()?,
            v => return Err(bad(format!("'calwt' has {} values but there are {n} gaintables", v.len()))),
        };

        // A single spwmap is a (possibly empty) list of ints; several are a
        // list of lists.
        let spwmaps: Vec<ArgValue> = match job.get("spwmap") {
            None => vec![ArgValue::List(vec![]); n],
            Some(ArgValue::List(l)) if matches!(l.first(), Some(ArgValue::List(_))) => l.clone(),
            Some(v) => vec![v.clone()],
        };
        if spwmaps.len() != n {
            return Err(bad(format!("'spwmap' has {} values but there are {n} gaintables", spwmaps.len())));
        }
        let spwmaps: Vec<Vec<i32>> = spwmaps
            .into_iter()
            .map(|m| match m {
                ArgValue::List(l) => l
                    .iter()
                    .map(|i| {
                        i.as_int()
                            .and_then(|i| i32::try_from(i).ok())
                            .ok_or_else(|| bad(format!("bad spwmap value {i}")))
                    })
                    .collect(),
                other => Err(bad(format!("bad spwmap {other}"))),
            })
            .collect::<Result<_, _>>()?;

        let mut calfroms = vec![];
        for ((((gaintable, gainfield), interp), spwmap), calwt) in gaintables
            .into_iter()
            .zip(gainfields)
            .zip(interps)
            .zip(spwmaps)
            .zip(calwts)
        {
            let caltype = CalType::from_caltable_name(&gaintable);
            trace!("Marking caltable '{gaintable}' as caltype '{caltype}'");
            calfroms.push(
                CalFrom::new(gaintable)?
                    .with_gainfield(gainfield)
                    .with_interp(interp)
                    .with_spwmap(spwmap)
                    .with_calwt(calwt)
                    .with_caltype(caltype),
            );
        }
        let calfrom = Vec1::try_from_vec(calfroms).map_err(|_| bad("no caltables".to_string()))?;

        Ok(CalApplication::new(calto, calfrom))
    }
}

impl fmt::Display for CalApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_applycal())
    }
}
