// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

/// The interpolation applied to a caltable unless a task says otherwise.
pub const DEFAULT_INTERP: &str = "linear,linear";

/// The name of the context when the user doesn't give one.
pub const DEFAULT_CONTEXT_NAME: &str = "pipeline";

/// The extension of saved contexts.
pub const CONTEXT_EXTENSION: &str = "context";

/// The extension of exported calibration states.
pub const CALSTATE_EXTENSION: &str = "calstate";

/// The file (inside the report directory) listing every toolkit job that was
/// really executed.
pub const CASA_COMMANDS_LOG: &str = "casa_commands.log";

/// The file (inside the report directory) containing the equivalent pipeline
/// script of all accepted stages.
pub const PIPELINE_SCRIPT: &str = "casa_pipescript.py";

/// The name of the product manifest.
pub const MANIFEST_NAME: &str = "pipeline_manifest.xml";

/// Lines in the commands log are wrapped at this many columns.
pub const COMMANDS_LOG_WIDTH: usize = 80;

/// The commands-log prologue is wrapped at this many columns.
pub const PROLOGUE_WIDTH: usize = 78;

/// Spectral windows with this many channels or fewer are treated as
/// non-science (e.g. WVR or square-law detector) windows.
pub const MAX_NON_SCIENCE_CHANNELS: usize = 4;

/// Antennas whose flagged-solution fraction is above this value are flagged by
/// `lowgainflag`.
pub const DEFAULT_LOWGAIN_FRACTION: f64 = 0.5;

/// The dish diameter assumed when a metadata file doesn't have one [metres].
pub const DEFAULT_DISH_DIAMETER: f64 = 12.0;

/// The OUS identifier used when the project doesn't have one.
pub const UNKNOWN_OUS: &str = "unknown";
