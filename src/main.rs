// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The calpipe binary.

use clap::Parser;

fn main() {
    // Run calpipe, only returning an error when something goes wrong; the
    // error message is printed here.
    if let Err(e) = calpipe::Calpipe::parse().run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
